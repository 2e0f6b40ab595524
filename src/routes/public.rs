use super::route_both;
use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials: every read of articles and authors, the
/// health probe, and the sign-up and token exchange that let a client get credentials.
pub fn public_routes() -> Router<AppState> {
    let router = Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }));

    // POST /register
    // Creates a reader account together with its author record.
    let router = route_both(router, "/register", post(handlers::register_user));
    // POST /token
    // Exchanges username + password for a bearer token.
    let router = route_both(router, "/token", post(handlers::obtain_token));
    // GET /articles?tags=a,b&page=n
    // Paginated listing, newest first, optionally filtered by tag names.
    let router = route_both(router, "/articles", get(handlers::list_articles));
    // GET /articles/{id}
    // Full article with author, tags and comments.
    let router = route_both(router, "/articles/{id}", get(handlers::get_article));
    // GET /users, GET /users/{id}
    // Author display records.
    let router = route_both(router, "/users", get(handlers::list_authors));
    route_both(router, "/users/{id}", get(handlers::get_author))
}
