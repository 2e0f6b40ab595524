use crate::{
    AppState,
    accounts::{self, Privileges},
    auth::{AuthUser, issue_token},
    error::{ApiError, ApiResult},
    extract::{IdPath, Payload},
    models::{Article, ArticleChanges, ArticleQuery, Author, NewArticle, NewComment},
    pagination::{ArticleListParams, ArticlePage, PageRequest},
    permissions::{self, author_or_read_only, redaction_or_read_only},
    repository::RepositoryState,
    representation::{
        ArticleDetail, ArticleRepresentation, ArticleShape, ArticleWriteRequest, ArticleWritten,
        AuthorRecord, CommentWriteRequest, CommentWritten, Phase, RegisterUserRequest,
        TokenRequest, TokenResponse, UpdateAuthorRequest, UserProfile, article_shape,
        parse_tag_filter,
    },
};
use axum::{
    Json,
    extract::{Query, State},
    http::{Method, StatusCode},
};
use chrono::Utc;
use std::collections::HashMap;

// --- Rendering Helpers ---

/// Loads everything the detail shape shows: author, tags and the comment thread.
async fn load_detail(repo: &RepositoryState, article: Article) -> ApiResult<ArticleDetail> {
    let author = repo.get_author(article.author_id).await?;
    let tags = repo.tags_for_article(article.id).await?;

    let mut authors: HashMap<i64, Option<Author>> = HashMap::new();
    if let Some(author) = &author {
        authors.insert(author.id, Some(author.clone()));
    }

    let mut comments = Vec::new();
    for comment in repo.comments_for_article(article.id).await? {
        let comment_author = match authors.get(&comment.author_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = repo.get_author(comment.author_id).await?;
                authors.insert(comment.author_id, fetched.clone());
                fetched
            }
        };
        comments.push((comment, comment_author));
    }

    Ok(ArticleDetail::build(article, author.as_ref(), tags, comments))
}

/// Renders an article in the shape `article_shape` picks for the request's verb: the
/// written echo after POST/PUT/PATCH, the full detail otherwise.
async fn render_article(
    repo: &RepositoryState,
    method: &Method,
    article: Article,
) -> ApiResult<ArticleRepresentation> {
    if article_shape(method, Phase::Render) == Some(ArticleShape::Written) {
        let tags = repo.tags_for_article(article.id).await?;
        return Ok(ArticleRepresentation::Written(ArticleWritten::build(
            article, tags,
        )));
    }
    Ok(ArticleRepresentation::Detail(
        load_detail(repo, article).await?,
    ))
}

/// The user id behind an author reference, `None` when the author row is gone.
async fn owner_of(repo: &RepositoryState, author_id: i64) -> ApiResult<Option<i64>> {
    Ok(repo.get_author(author_id).await?.map(|author| author.user_id))
}

async fn require_article(repo: &RepositoryState, id: i64) -> ApiResult<Article> {
    repo.get_article(id).await?.ok_or_else(ApiError::not_found)
}

// --- Article Handlers ---

/// list_articles
///
/// [Public Route] Lists articles newest first, one page at a time. `tags=a,b` keeps the
/// articles carrying at least one of the named tags.
#[utoipa::path(
    get,
    path = "/articles/",
    params(ArticleListParams),
    responses(
        (status = 200, description = "One page of articles", body = ArticlePage),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ArticleListParams>,
) -> ApiResult<Json<ArticlePage>> {
    let page = PageRequest::parse(params.page.as_deref(), state.config.page_size)?;
    let query = ArticleQuery {
        tags: parse_tag_filter(params.tags.as_deref()),
        limit: page.size,
        offset: page.offset(),
    };

    let (count, articles) = state.repo.list_articles(&query).await?;
    page.check_bounds(count)?;

    let mut results = Vec::with_capacity(articles.len());
    for article in articles {
        results.push(load_detail(&state.repo, article).await?);
    }

    Ok(Json(ArticlePage::build(
        page,
        count,
        params.tags.as_deref(),
        results,
    )))
}

/// get_article
///
/// [Public Route] Retrieves one article with its author, tags and comments.
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = ArticleDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_article(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<ArticleRepresentation>> {
    let article = require_article(&state.repo, id).await?;
    let body = render_article(&state.repo, &Method::GET, article).await?;
    Ok(Json(body))
}

/// create_article
///
/// [Authenticated Route] Publishes a new article. Requires the redaction privilege or a
/// superuser. The author and publication date are stamped by the server; tags are
/// get-or-created and attached after the insert.
#[utoipa::path(
    post,
    path = "/articles/",
    request_body = ArticleWriteRequest,
    responses(
        (status = 201, description = "Created", body = ArticleWritten),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not a redactor")
    )
)]
pub async fn create_article(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Payload<ArticleWriteRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<ArticleRepresentation>)> {
    let method = Method::POST;
    permissions::ensure(redaction_or_read_only(&method, Some(&caller)), Some(&caller))?;

    // The body is only looked at once the caller may publish.
    let Payload(payload) = payload?;
    let write = payload.validate(state.config.rating_writable)?;
    let author = state
        .repo
        .get_author_for_user(caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User doesn't have author data associated".to_string()))?;

    let article = state
        .repo
        .create_article(NewArticle {
            title: write.title,
            content: write.content,
            author_id: author.id,
            publication_date: Utc::now(),
            rating: write.rating.unwrap_or(0),
        })
        .await?;
    state.repo.attach_tags(article.id, &write.tags).await?;

    tracing::info!(article_id = article.id, author_id = author.id, "article created");

    let body = render_article(&state.repo, &method, article).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// update_article
///
/// [Authenticated Route] Overwrites title and content (both required, for PUT and PATCH
/// alike) and attaches any supplied tags. Existing tags are never removed.
///
/// *Authorization*: redaction privilege first, then the 404 lookup, then ownership. The
/// body is parsed last.
#[utoipa::path(
    put,
    path = "/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    request_body = ArticleWriteRequest,
    responses(
        (status = 200, description = "Updated", body = ArticleWritten),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_article(
    method: Method,
    caller: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Payload<ArticleWriteRequest>, ApiError>,
) -> ApiResult<Json<ArticleRepresentation>> {
    permissions::ensure(redaction_or_read_only(&method, Some(&caller)), Some(&caller))?;

    let article = require_article(&state.repo, id).await?;
    let owner = owner_of(&state.repo, article.author_id).await?;
    permissions::ensure(author_or_read_only(&method, Some(&caller), owner), Some(&caller))?;

    let Payload(payload) = payload?;
    let write = payload.validate(state.config.rating_writable)?;
    let updated = state
        .repo
        .update_article(
            id,
            ArticleChanges {
                title: write.title,
                content: write.content,
                rating: write.rating,
            },
        )
        .await?
        .ok_or_else(ApiError::not_found)?;
    state.repo.attach_tags(id, &write.tags).await?;

    tracing::info!(article_id = id, user_id = caller.id, "article updated");

    let body = render_article(&state.repo, &method, updated).await?;
    Ok(Json(body))
}

/// delete_article
///
/// [Authenticated Route] Removes an article and its comments. Tags stay.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_article(
    caller: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<StatusCode> {
    let method = Method::DELETE;
    permissions::ensure(redaction_or_read_only(&method, Some(&caller)), Some(&caller))?;

    let article = require_article(&state.repo, id).await?;
    let owner = owner_of(&state.repo, article.author_id).await?;
    permissions::ensure(author_or_read_only(&method, Some(&caller), owner), Some(&caller))?;

    if state.repo.delete_article(id).await? {
        tracing::info!(article_id = id, user_id = caller.id, "article deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

// --- Comment Handlers ---

/// add_comment
///
/// [Authenticated Route] Posts a comment on an article. Article, author and timestamp are
/// stamped by the server; only `content` comes from the body.
#[utoipa::path(
    post,
    path = "/articles/{id}/comment",
    params(("id" = i64, Path, description = "Article ID")),
    request_body = CommentWriteRequest,
    responses(
        (status = 201, description = "Comment Added", body = CommentWritten),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not authenticated"),
        (status = 404, description = "Article or author data not found")
    )
)]
pub async fn add_comment(
    caller: AuthUser,
    State(state): State<AppState>,
    IdPath(article_id): IdPath<i64>,
    Payload(payload): Payload<CommentWriteRequest>,
) -> ApiResult<(StatusCode, Json<CommentWritten>)> {
    let article = require_article(&state.repo, article_id).await?;
    let author = state
        .repo
        .get_author_for_user(caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User doesn't have author data associated".to_string()))?;

    let comment = state
        .repo
        .create_comment(NewComment {
            article_id: article.id,
            author_id: author.id,
            content: payload.content.unwrap_or_default().trim().to_string(),
            publication_date: Utc::now(),
        })
        .await?;

    tracing::info!(comment_id = comment.id, article_id, "comment added");
    Ok((
        StatusCode::CREATED,
        Json(CommentWritten::build(comment, Some(&author))),
    ))
}

/// update_comment
///
/// [Authenticated Route] Replaces a comment's content. Owner or superuser only.
#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = CommentWriteRequest,
    responses(
        (status = 200, description = "Updated", body = CommentWritten),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    caller: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    Payload(payload): Payload<CommentWriteRequest>,
) -> ApiResult<Json<CommentWritten>> {
    let comment = state.repo.get_comment(id).await?.ok_or_else(ApiError::not_found)?;
    let author = state.repo.get_author(comment.author_id).await?;
    let owner = author.as_ref().map(|a| a.user_id);
    permissions::ensure(author_or_read_only(&Method::PUT, Some(&caller), owner), Some(&caller))?;

    // An omitted content leaves the comment as it was.
    let content = match payload.content {
        Some(content) => content.trim().to_string(),
        None => comment.content,
    };
    let updated = state
        .repo
        .update_comment(id, content)
        .await?
        .ok_or_else(ApiError::not_found)?;

    tracing::info!(comment_id = id, user_id = caller.id, "comment updated");
    Ok(Json(CommentWritten::build(updated, author.as_ref())))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment. Owner or superuser only; 204 with no body.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    caller: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<StatusCode> {
    let comment = state.repo.get_comment(id).await?.ok_or_else(ApiError::not_found)?;
    let owner = owner_of(&state.repo, comment.author_id).await?;
    permissions::ensure(author_or_read_only(&Method::DELETE, Some(&caller), owner), Some(&caller))?;

    if state.repo.delete_comment(id).await? {
        tracing::info!(comment_id = id, user_id = caller.id, "comment deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

// --- Author Handlers ---

/// list_authors
///
/// [Public Route] Lists every author's display record.
#[utoipa::path(
    get,
    path = "/users/",
    responses((status = 200, description = "Authors", body = [AuthorRecord]))
)]
pub async fn list_authors(State(state): State<AppState>) -> ApiResult<Json<Vec<AuthorRecord>>> {
    let authors = state.repo.list_authors().await?;
    Ok(Json(authors.into_iter().map(AuthorRecord::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Found", body = AuthorRecord),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_author(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<AuthorRecord>> {
    let author = state.repo.get_author(id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(author.into()))
}

// --- Account Handlers ---

/// register_user
///
/// [Public Route] Creates a reader account and its author record in one step.
/// Privileges are never granted here.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid or duplicate username")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let (user, author) = accounts::create_account(&state.repo, payload, Privileges::READER).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserProfile::build(user, Some(author))),
    ))
}

/// obtain_token
///
/// [Public Route] Exchanges a username and password for a bearer token.
#[utoipa::path(
    post,
    path = "/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Bad credentials")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    Payload(payload): Payload<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = accounts::authenticate(&state.repo, &payload.username, &payload.password).await?;
    let access_token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_secs)?;

    tracing::info!(user_id = user.id, "token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.token_ttl_secs,
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's account and author record.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 403, description = "Not authenticated")
    )
)]
pub async fn get_me(caller: AuthUser, State(state): State<AppState>) -> ApiResult<Json<UserProfile>> {
    let user = state.repo.get_user(caller.id).await?.ok_or_else(ApiError::not_found)?;
    let author = state.repo.get_author_for_user(caller.id).await?;
    Ok(Json(UserProfile::build(user, author)))
}

/// update_my_author
///
/// [Authenticated Route] Replaces the caller's display fields.
#[utoipa::path(
    put,
    path = "/me/author",
    request_body = UpdateAuthorRequest,
    responses(
        (status = 200, description = "Updated", body = AuthorRecord),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not authenticated")
    )
)]
pub async fn update_my_author(
    caller: AuthUser,
    State(state): State<AppState>,
    Payload(payload): Payload<UpdateAuthorRequest>,
) -> ApiResult<Json<AuthorRecord>> {
    let update = payload.validate()?;
    let author = state
        .repo
        .get_author_for_user(caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User doesn't have author data associated".to_string()))?;

    let updated = state
        .repo
        .update_author(author.id, update)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(updated.into()))
}

// --- Admin Handlers ---

/// set_redaction
///
/// [Admin Route] Grants or revokes a user's publishing privilege.
///
/// *RBAC*: superusers only.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/redaction",
    params(("id" = i64, Path, description = "User ID")),
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 403, description = "Not a superuser"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_redaction(
    caller: AuthUser,
    State(state): State<AppState>,
    IdPath(user_id): IdPath<i64>,
    Payload(is_redaction): Payload<bool>,
) -> ApiResult<Json<UserProfile>> {
    if !caller.is_superuser {
        return Err(ApiError::Forbidden);
    }

    let user = state
        .repo
        .set_redaction(user_id, is_redaction)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let author = state.repo.get_author_for_user(user.id).await?;

    tracing::info!(user_id, is_redaction, by = caller.id, "redaction privilege changed");
    Ok(Json(UserProfile::build(user, author)))
}
