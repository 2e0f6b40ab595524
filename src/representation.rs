use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, FieldErrors},
    models::{Article, Author, AuthorUpdate, Comment, Tag, User},
};

pub const TITLE_MAX_CHARS: usize = 255;
pub const TAG_MAX_CHARS: usize = 32;
pub const AUTHOR_FIELD_MAX_CHARS: usize = 64;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 0..=5;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

// --- Shape Selection ---

/// Which side of the exchange a shape describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Request body.
    Parse,
    /// Response body.
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleShape {
    Detail,
    Write,
    Written,
}

/// Picks the article shape for a verb and phase. `None` means no body.
pub fn article_shape(method: &Method, phase: Phase) -> Option<ArticleShape> {
    match (method.as_str(), phase) {
        ("GET" | "HEAD", Phase::Render) => Some(ArticleShape::Detail),
        ("POST" | "PUT" | "PATCH", Phase::Parse) => Some(ArticleShape::Write),
        ("POST" | "PUT" | "PATCH", Phase::Render) => Some(ArticleShape::Written),
        _ => None,
    }
}

/// ArticleRepresentation
///
/// The rendered forms of an article. Serialized without a tag, so the JSON is exactly the
/// inner shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ArticleRepresentation {
    Detail(ArticleDetail),
    Written(ArticleWritten),
}

// --- Response Schemas (Output) ---

/// Author display fields as nested inside articles and comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct AuthorView {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
}

impl From<&Author> for AuthorView {
    fn from(author: &Author) -> Self {
        Self {
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
            nickname: author.nickname.clone(),
        }
    }
}

/// AuthorRecord
///
/// Standalone author listing entry (`/users/`). Carries the id the nested view omits.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct AuthorRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
}

impl From<Author> for AuthorRecord {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            first_name: author.first_name,
            last_name: author.last_name,
            nickname: author.nickname,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct TagView {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentView {
    pub id: i64,
    pub author: Option<AuthorView>,
    pub content: String,
    #[ts(type = "string")]
    pub publication_date: DateTime<Utc>,
}

/// ArticleDetail
///
/// The read shape: everything about an article including its tags and comment thread.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleDetail {
    pub id: i64,
    pub title: String,
    /// `null` when the author record no longer exists.
    pub author: Option<AuthorView>,
    pub tags: Vec<TagView>,
    pub content: String,
    pub comments: Vec<CommentView>,
    #[ts(type = "string")]
    pub publication_date: DateTime<Utc>,
    pub rating: i32,
}

impl ArticleDetail {
    pub fn build(
        article: Article,
        author: Option<&Author>,
        tags: Vec<Tag>,
        comments: Vec<(Comment, Option<Author>)>,
    ) -> Self {
        Self {
            id: article.id,
            title: article.title,
            author: author.map(AuthorView::from),
            tags: tags.into_iter().map(|t| TagView { name: t.name }).collect(),
            content: article.content,
            comments: comments
                .into_iter()
                .map(|(comment, author)| CommentView {
                    id: comment.id,
                    author: author.as_ref().map(AuthorView::from),
                    content: comment.content,
                    publication_date: comment.publication_date,
                })
                .collect(),
            publication_date: article.publication_date,
            rating: article.rating,
        }
    }
}

/// ArticleWritten
///
/// Echo of a create or update: the stored fields plus the full tag-name list.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleWritten {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    #[ts(type = "string")]
    pub publication_date: DateTime<Utc>,
    pub rating: i32,
}

impl ArticleWritten {
    pub fn build(article: Article, tags: Vec<Tag>) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            tags: tags.into_iter().map(|t| t.name).collect(),
            publication_date: article.publication_date,
            rating: article.rating,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentWritten {
    pub id: i64,
    pub article_id: i64,
    pub author: Option<AuthorView>,
    pub content: String,
    #[ts(type = "string")]
    pub publication_date: DateTime<Utc>,
}

impl CommentWritten {
    pub fn build(comment: Comment, author: Option<&Author>) -> Self {
        Self {
            id: comment.id,
            article_id: comment.article_id,
            author: author.map(AuthorView::from),
            content: comment.content,
            publication_date: comment.publication_date,
        }
    }
}

/// UserProfile
///
/// The caller's own account view (`/me`, `/register`, role changes).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_redaction: bool,
    pub is_superuser: bool,
    pub author: Option<AuthorRecord>,
}

impl UserProfile {
    pub fn build(user: User, author: Option<Author>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_redaction: user.is_redaction,
            is_superuser: user.is_superuser,
            author: author.map(AuthorRecord::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

// --- Request Payloads (Input Schemas) ---

/// ArticleWriteRequest
///
/// Body of article create and update. Every field is optional at the JSON level so that
/// missing fields come back as field errors instead of a parse failure. Client-sent
/// `author` or `publication_date` keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ArticleWriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Plain tag names, e.g. `["rust", "web"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Only honoured when ratings are configured writable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

/// A validated article write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleWrite {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub rating: Option<i32>,
}

impl ArticleWriteRequest {
    /// validate
    ///
    /// Collects every field error before failing, so the client sees them all at once.
    /// `rating` is dropped silently unless `rating_writable` is set.
    pub fn validate(self, rating_writable: bool) -> Result<ArticleWrite, ApiError> {
        let mut errors = FieldErrors::new();

        let title = required_text(&mut errors, "title", self.title);
        if let Some(title) = &title {
            if title.chars().count() > TITLE_MAX_CHARS {
                push(
                    &mut errors,
                    "title",
                    format!("Ensure this field has no more than {TITLE_MAX_CHARS} characters."),
                );
            }
        }
        let content = required_text(&mut errors, "content", self.content);

        let tags = match normalize_tags(self.tags.unwrap_or_default()) {
            Ok(tags) => tags,
            Err(messages) => {
                errors
                    .entry("tags".to_string())
                    .or_default()
                    .extend(messages);
                Vec::new()
            }
        };

        let rating = if rating_writable { self.rating } else { None };
        if let Some(rating) = rating {
            if !RATING_RANGE.contains(&rating) {
                push(&mut errors, "rating", "Rating must be in range 0 to 5");
            }
        }

        match (title, content) {
            (Some(title), Some(content)) if errors.is_empty() => Ok(ArticleWrite {
                title,
                content,
                tags,
                rating,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// normalize_tags
///
/// Trims every name, rejects blank and over-long names, and drops repeats while keeping
/// first-seen order. Names are compared case-sensitively.
pub fn normalize_tags(raw: Vec<String>) -> Result<Vec<String>, Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for name in raw {
        let name = name.trim();
        if name.is_empty() {
            errors.push("Tag names may not be blank.".to_string());
        } else if name.chars().count() > TAG_MAX_CHARS {
            errors.push(format!(
                "Tag \"{name}\" is longer than {TAG_MAX_CHARS} characters."
            ));
        } else if !names.iter().any(|seen| seen == name) {
            names.push(name.to_string());
        }
    }

    if errors.is_empty() {
        Ok(names)
    } else {
        errors.dedup();
        Err(errors)
    }
}

/// Splits the `?tags=a,b` query value. Blank parts are skipped; `None` means "no filter".
pub fn parse_tag_filter(raw: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() { None } else { Some(names) }
}

/// CommentWriteRequest
///
/// Only `content` is writable. Blank content is allowed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentWriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// RegisterUserRequest
///
/// Public sign-up. New accounts never carry privileges.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        validate_username(&mut errors, &self.username);
        if self.password.chars().count() < PASSWORD_MIN_CHARS {
            push(
                &mut errors,
                "password",
                format!("This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."),
            );
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            push(&mut errors, "email", "Enter a valid email address.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// UpdateAuthorRequest
///
/// Full replacement of the caller's display fields; omitted fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAuthorRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl UpdateAuthorRequest {
    pub fn validate(self) -> Result<AuthorUpdate, ApiError> {
        let update = AuthorUpdate {
            first_name: self
                .first_name
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| Author::DEFAULT_FIRST_NAME.to_string()),
            last_name: self.last_name.map(|v| v.trim().to_string()).unwrap_or_default(),
            nickname: self.nickname.map(|v| v.trim().to_string()).unwrap_or_default(),
        };

        let mut errors = FieldErrors::new();
        for (field, value) in [
            ("first_name", &update.first_name),
            ("last_name", &update.last_name),
            ("nickname", &update.nickname),
        ] {
            if value.chars().count() > AUTHOR_FIELD_MAX_CHARS {
                push(
                    &mut errors,
                    field,
                    format!("Ensure this field has no more than {AUTHOR_FIELD_MAX_CHARS} characters."),
                );
            }
        }

        if errors.is_empty() {
            Ok(update)
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

// --- Validation Helpers ---

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Trimmed, non-blank text or a recorded field error.
fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        None => {
            push(errors, field, REQUIRED);
            None
        }
        Some(v) if v.is_empty() => {
            push(errors, field, BLANK);
            None
        }
        Some(v) => Some(v),
    }
}

fn validate_username(errors: &mut FieldErrors, username: &str) {
    if username.is_empty() {
        push(errors, "username", REQUIRED);
    } else if username.chars().count() > USERNAME_MAX_CHARS {
        push(
            errors,
            "username",
            format!("Ensure this field has no more than {USERNAME_MAX_CHARS} characters."),
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        push(
            errors,
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
}
