use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The login identity stored in the `users` table. The two role flags drive every
/// write permission in the API: `is_redaction` grants publishing, `is_superuser`
/// overrides ownership checks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    // Argon2 PHC string. Never leaves the process.
    #[serde(skip)]
    pub password_hash: String,
    pub is_redaction: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

/// Author
///
/// Display profile attached 1:1 to a `User`. Created in the same transaction as the user,
/// so every user has exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
}

impl Author {
    /// Display defaults for a freshly created user.
    pub const DEFAULT_FIRST_NAME: &'static str = "Anonymous";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Article
///
/// Row from the `articles` table. `author_id` is a plain reference: if the author row
/// disappears the article stays and renders without an author.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub publication_date: DateTime<Utc>,
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub author_id: i64,
    pub article_id: i64,
    pub content: String,
    pub publication_date: DateTime<Utc>,
}

// --- Repository Inputs ---

/// Everything needed to insert a user. The matching author row is derived, not supplied.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_redaction: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub publication_date: DateTime<Utc>,
    pub rating: i32,
}

/// Overwrites applied by an article update. `rating` is only `Some` when ratings are writable.
#[derive(Debug, Clone)]
pub struct ArticleChanges {
    pub title: String,
    pub content: String,
    pub rating: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: i64,
    pub author_id: i64,
    pub content: String,
    pub publication_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorUpdate {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
}

/// ArticleQuery
///
/// Listing criteria: an optional tag-name filter (match any) plus the page window.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub tags: Option<Vec<String>>,
    pub limit: i64,
    pub offset: i64,
}
