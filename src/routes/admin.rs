use super::route_both;
use crate::{AppState, handlers};
use axum::{Router, routing::put};

/// Admin Router Module
///
/// Role management for superusers. Identity is resolved by the `AuthUser` extractor and
/// the superuser check happens inside each handler.
pub fn admin_routes() -> Router<AppState> {
    // PUT /admin/users/{id}/redaction
    // Grants (`true`) or revokes (`false`) the publishing privilege.
    route_both(
        Router::new(),
        "/users/{id}/redaction",
        put(handlers::set_redaction),
    )
}
