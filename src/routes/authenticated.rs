use super::route_both;
use crate::{AppState, auth::AuthUser, error::ApiError, handlers, permissions};
use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{MethodRouter, get, post, put},
};

/// authenticated_or_read_only
///
/// Request-layer baseline for the write routes: safe methods pass untouched, anything else
/// needs a resolved identity or is turned away with 403. The resolved `AuthUser` is stored
/// in the request extensions so the handler's extractor does not look it up again.
async fn authenticated_or_read_only(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let caller = AuthUser::resolve(&parts, &state.repo, &state.config).await?;
    permissions::ensure(
        permissions::authenticated_or_read_only(&parts.method, caller.as_ref()),
        caller.as_ref(),
    )?;

    let mut request = Request::from_parts(parts, body);
    if let Some(caller) = caller {
        request.extensions_mut().insert(caller);
    }
    Ok(next.run(request).await)
}

/// Authenticated Router Module
///
/// Every state-changing endpoint. Each method router carries the authenticated-or-read-only
/// layer, so anonymous writes are turned away with 403 before a handler runs while verbs a
/// path does not serve still answer 405. The handlers then apply the redaction and
/// ownership predicates themselves.
pub fn authenticated_routes(state: AppState) -> Router<AppState> {
    let guard = |method_router: MethodRouter<AppState>| {
        method_router.route_layer(middleware::from_fn_with_state(
            state.clone(),
            authenticated_or_read_only,
        ))
    };
    let router = Router::<AppState>::new();

    // POST /articles
    // Publishes an article. Redaction privilege or superuser.
    let router = route_both(router, "/articles", guard(post(handlers::create_article)));
    // PUT/PATCH/DELETE /articles/{id}
    // Owner (or superuser) edits or removes an article. Tags are only ever added.
    let router = route_both(
        router,
        "/articles/{id}",
        guard(
            put(handlers::update_article)
                .patch(handlers::update_article)
                .delete(handlers::delete_article),
        ),
    );
    // POST /articles/{id}/comment
    // Any authenticated user may comment.
    let router = route_both(
        router,
        "/articles/{id}/comment",
        guard(post(handlers::add_comment)),
    );
    // PUT/DELETE /comments/{id}
    // Owner (or superuser) edits or removes a comment.
    let router = route_both(
        router,
        "/comments/{id}",
        guard(put(handlers::update_comment).delete(handlers::delete_comment)),
    );
    // GET /me, PUT /me/author
    // The caller's own account and display fields.
    let router = route_both(router, "/me", guard(get(handlers::get_me)));
    route_both(router, "/me/author", guard(put(handlers::update_my_author)))
}
