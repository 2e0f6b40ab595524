use crate::models::{
    Article, ArticleChanges, ArticleQuery, Author, AuthorUpdate, Comment, NewArticle, NewComment,
    NewUser, Tag, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Handlers translate these into `ApiError`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint rejected the write. Carries the offending field name.
    #[error("a record with this {0} already exists")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are interchangeable.
///
/// **Send + Sync + async_trait** are required to share the trait object across Axum's
/// asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Authors ---
    /// Inserts the user and its default author as one atomic unit.
    async fn create_user(&self, user: NewUser) -> RepoResult<(User, Author)>;
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn set_redaction(&self, user_id: i64, is_redaction: bool) -> RepoResult<Option<User>>;

    async fn get_author(&self, id: i64) -> RepoResult<Option<Author>>;
    async fn get_author_for_user(&self, user_id: i64) -> RepoResult<Option<Author>>;
    async fn list_authors(&self) -> RepoResult<Vec<Author>>;
    async fn update_author(&self, id: i64, update: AuthorUpdate) -> RepoResult<Option<Author>>;

    // --- Articles ---
    /// Returns the total number of matches and the requested window, newest first.
    async fn list_articles(&self, query: &ArticleQuery) -> RepoResult<(i64, Vec<Article>)>;
    async fn get_article(&self, id: i64) -> RepoResult<Option<Article>>;
    async fn create_article(&self, article: NewArticle) -> RepoResult<Article>;
    async fn update_article(&self, id: i64, changes: ArticleChanges) -> RepoResult<Option<Article>>;
    /// Removes the article and, by cascade, its comments and tag links. Tags survive.
    async fn delete_article(&self, id: i64) -> RepoResult<bool>;

    // --- Tags ---
    /// Get-or-create each name and link it to the article. Already linked tags are skipped.
    /// Returns the tags for `names`, not the article's full set.
    async fn attach_tags(&self, article_id: i64, names: &[String]) -> RepoResult<Vec<Tag>>;
    /// Tags of an article in attachment order.
    async fn tags_for_article(&self, article_id: i64) -> RepoResult<Vec<Tag>>;

    // --- Comments ---
    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    /// Comments of an article, oldest first.
    async fn comments_for_article(&self, article_id: i64) -> RepoResult<Vec<Comment>>;
    async fn update_comment(&self, id: i64, content: String) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_redaction, is_superuser, date_joined";
const AUTHOR_COLUMNS: &str = "id, user_id, first_name, last_name, nickname";
const ARTICLE_COLUMNS: &str = "id, title, content, author_id, publication_date, rating";
const COMMENT_COLUMNS: &str = "id, author_id, article_id, content, publication_date";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime (`query_as` + binds) so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation onto `Conflict`, everything else onto `Database`.
fn conflict_on(field: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return RepositoryError::Conflict(field);
            }
        }
        RepositoryError::Database(e)
    }
}

/// Appends the "has any of these tags" predicate used by both the count and the page query.
fn push_tag_filter(builder: &mut QueryBuilder<'_, sqlx::Postgres>, tags: &Option<Vec<String>>) {
    if let Some(names) = tags {
        builder.push(
            " WHERE EXISTS (SELECT 1 FROM article_tags at JOIN tags t ON t.id = at.tag_id \
             WHERE at.article_id = a.id AND t.name = ANY(",
        );
        builder.push_bind(names.clone());
        builder.push("))");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Inserts the `users` row and its `authors` row inside one transaction, so a user can
    /// never be observed without an author.
    async fn create_user(&self, user: NewUser) -> RepoResult<(User, Author)> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, is_redaction, is_superuser, date_joined) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_redaction)
        .bind(user.is_superuser)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on("username"))?;

        let author = sqlx::query_as::<_, Author>(&format!(
            "INSERT INTO authors (user_id, first_name, last_name, nickname) \
             VALUES ($1, $2, '', '') RETURNING {AUTHOR_COLUMNS}"
        ))
        .bind(created.id)
        .bind(Author::DEFAULT_FIRST_NAME)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((created, author))
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_redaction(&self, user_id: i64, is_redaction: bool) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_redaction = $1 WHERE id = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(is_redaction)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_author(&self, id: i64) -> RepoResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(author)
    }

    async fn get_author_for_user(&self, user_id: i64) -> RepoResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(author)
    }

    async fn list_authors(&self) -> RepoResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn update_author(&self, id: i64, update: AuthorUpdate) -> RepoResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>(&format!(
            "UPDATE authors SET first_name = $1, last_name = $2, nickname = $3 \
             WHERE id = $4 RETURNING {AUTHOR_COLUMNS}"
        ))
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.nickname)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(author)
    }

    /// list_articles
    ///
    /// Builds the count and page queries with `QueryBuilder` so the tag list is always bound,
    /// never interpolated. `EXISTS` keeps an article matching several tags from appearing twice.
    async fn list_articles(&self, query: &ArticleQuery) -> RepoResult<(i64, Vec<Article>)> {
        let mut count: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles a");
        push_tag_filter(&mut count, &query.tags);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT a.id, a.title, a.content, a.author_id, a.publication_date, a.rating FROM articles a",
        );
        push_tag_filter(&mut page, &query.tags);
        page.push(" ORDER BY a.publication_date DESC, a.id DESC LIMIT ");
        page.push_bind(query.limit);
        page.push(" OFFSET ");
        page.push_bind(query.offset);

        let articles = page.build_query_as::<Article>().fetch_all(&self.pool).await?;
        Ok((total, articles))
    }

    async fn get_article(&self, id: i64) -> RepoResult<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn create_article(&self, article: NewArticle) -> RepoResult<Article> {
        let created = sqlx::query_as::<_, Article>(&format!(
            "INSERT INTO articles (title, content, author_id, publication_date, rating) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(article.title)
        .bind(article.content)
        .bind(article.author_id)
        .bind(article.publication_date)
        .bind(article.rating)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// update_article
    ///
    /// Title and content are always overwritten; rating only when the caller supplies one.
    async fn update_article(&self, id: i64, changes: ArticleChanges) -> RepoResult<Option<Article>> {
        let updated = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles SET title = $1, content = $2, rating = COALESCE($3, rating) \
             WHERE id = $4 RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.rating)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_article(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// attach_tags
    ///
    /// One upsert per name resolves get-or-create atomically, then the link insert ignores
    /// links that already exist. Each statement commits on its own.
    async fn attach_tags(&self, article_id: i64, names: &[String]) -> RepoResult<Vec<Tag>> {
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let tag = sqlx::query_as::<_, Tag>(
                "INSERT INTO tags (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id, name",
            )
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

            sqlx::query(
                "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(article_id)
            .bind(tag.id)
            .execute(&self.pool)
            .await?;

            tags.push(tag);
        }
        Ok(tags)
    }

    async fn tags_for_article(&self, article_id: i64) -> RepoResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.name FROM tags t JOIN article_tags at ON at.tag_id = t.id \
             WHERE at.article_id = $1 ORDER BY at.id",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let created = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (author_id, article_id, content, publication_date) \
             VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.author_id)
        .bind(comment.article_id)
        .bind(comment.content)
        .bind(comment.publication_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn comments_for_article(&self, article_id: i64) -> RepoResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE article_id = $1 ORDER BY publication_date, id"
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn update_comment(&self, id: i64, content: String) -> RepoResult<Option<Comment>> {
        let updated = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET content = $1 WHERE id = $2 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
