use axum::{Router, routing::MethodRouter};

/// Router Module Index
///
/// Routes are split by who may reach them. Access control is layered on at the module
/// level, so an endpoint cannot be exposed by accident.

/// Reads plus the sign-up and token gateway. No identity required.
pub mod public;

/// Writes and account endpoints. Guarded by the authenticated-or-read-only layer.
pub mod authenticated;

/// Superuser-only role management, nested under `/admin`.
pub mod admin;

/// Registers `path` with and without a trailing slash, which the API treats as equivalent.
pub(crate) fn route_both<S>(router: Router<S>, path: &str, method_router: MethodRouter<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route(path, method_router.clone())
        .route(&format!("{path}/"), method_router)
}
