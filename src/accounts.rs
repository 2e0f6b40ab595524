use crate::{
    auth::{hash_password, verify_password},
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{Author, NewUser, User},
    repository::RepositoryState,
    representation::RegisterUserRequest,
};

/// Role flags granted at account creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privileges {
    pub is_redaction: bool,
    pub is_superuser: bool,
}

impl Privileges {
    pub const READER: Privileges = Privileges {
        is_redaction: false,
        is_superuser: false,
    };
    pub const SUPERUSER: Privileges = Privileges {
        is_redaction: true,
        is_superuser: true,
    };
}

/// create_account
///
/// Validates the sign-up payload, hashes the password and stores the user together with
/// its default author.
pub async fn create_account(
    repo: &RepositoryState,
    request: RegisterUserRequest,
    privileges: Privileges,
) -> ApiResult<(User, Author)> {
    request.validate()?;

    let new_user = NewUser {
        username: request.username,
        email: request.email,
        password_hash: hash_password(&request.password)?,
        is_redaction: privileges.is_redaction,
        is_superuser: privileges.is_superuser,
    };

    let (user, author) = repo.create_user(new_user).await?;
    tracing::info!(user_id = user.id, author_id = author.id, "account created");
    Ok((user, author))
}

/// Checks a username/password pair. Unknown users and wrong passwords look the same.
pub async fn authenticate(repo: &RepositoryState, username: &str, password: &str) -> ApiResult<User> {
    let invalid = || ApiError::BadRequest("Unable to log in with provided credentials.".to_string());

    let user = repo.get_user_by_username(username).await?.ok_or_else(invalid)?;
    if verify_password(password, &user.password_hash) {
        Ok(user)
    } else {
        Err(invalid())
    }
}

/// ensure_superuser
///
/// Creates the configured bootstrap superuser if it does not exist yet. Returns the new
/// user, or `None` when nothing was configured or the account already exists.
pub async fn ensure_superuser(repo: &RepositoryState, config: &AppConfig) -> ApiResult<Option<User>> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(None);
    };

    if repo.get_user_by_username(username).await?.is_some() {
        tracing::debug!(%username, "bootstrap superuser already present");
        return Ok(None);
    }

    let request = RegisterUserRequest {
        username: username.clone(),
        email: String::new(),
        password: password.clone(),
    };
    let (user, _) = create_account(repo, request, Privileges::SUPERUSER).await?;
    Ok(Some(user))
}
