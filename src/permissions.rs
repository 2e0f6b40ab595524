//! Write-access predicates.
//!
//! Every predicate lets safe methods through and only judges writes. Controllers AND the
//! predicates they need; `ensure` turns a denial into the right 403 flavour.

use axum::http::Method;

use crate::{auth::AuthUser, error::ApiError};

/// GET, HEAD and OPTIONS never change state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Writes need some identity.
pub fn authenticated_or_read_only(method: &Method, caller: Option<&AuthUser>) -> bool {
    is_safe_method(method) || caller.is_some()
}

/// Writes need the publishing privilege (or a superuser).
pub fn redaction_or_read_only(method: &Method, caller: Option<&AuthUser>) -> bool {
    if is_safe_method(method) {
        return true;
    }
    caller.is_some_and(|user| user.is_redaction || user.is_superuser)
}

/// Writes need the caller to be the user behind the target's author, or a superuser.
///
/// `owner_user_id` is `None` when the target's author no longer exists; only a superuser
/// may write such a target.
pub fn author_or_read_only(
    method: &Method,
    caller: Option<&AuthUser>,
    owner_user_id: Option<i64>,
) -> bool {
    if is_safe_method(method) {
        return true;
    }
    caller.is_some_and(|user| user.is_superuser || owner_user_id == Some(user.id))
}

/// Turns a predicate result into `Ok` or the matching 403.
pub fn ensure(granted: bool, caller: Option<&AuthUser>) -> Result<(), ApiError> {
    match (granted, caller) {
        (true, _) => Ok(()),
        (false, None) => Err(ApiError::NotAuthenticated),
        (false, Some(user)) => {
            tracing::debug!(user_id = user.id, "permission denied");
            Err(ApiError::Forbidden)
        }
    }
}
