use articles_api::{
    MemoryRepository, PostgresRepository,
    models::{ArticleChanges, ArticleQuery, AuthorUpdate, NewArticle, NewComment, NewUser},
    repository::{Repository, RepositoryError},
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for the Postgres runs. These need a live `DATABASE_URL`.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        DbTestContext { pool }
    }

    async fn repository(&self) -> PostgresRepository {
        let repo = PostgresRepository::new(self.pool.clone());
        repo.migrate().await.expect("Failed to run database migrations.");
        repo
    }
}

// --- Test Data Helpers ---

/// Unique per call, so runs against a shared database never collide.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        password_hash: String::new(),
        is_redaction: true,
        is_superuser: false,
    }
}

async fn publish(repo: &dyn Repository, author_id: i64, title: &str, age_minutes: i64) -> i64 {
    repo.create_article(NewArticle {
        title: title.to_string(),
        content: format!("{title} content"),
        author_id,
        publication_date: Utc::now() - Duration::minutes(age_minutes),
        rating: 0,
    })
    .await
    .unwrap()
    .id
}

// --- Shared Contract ---
// Both stores must behave identically; each check runs against the in-memory store and,
// when a database is available, against Postgres.

async fn user_gets_default_author(repo: &dyn Repository) {
    let username = unique("ada");
    let (user, author) = repo.create_user(new_user(&username)).await.unwrap();

    assert_eq!(author.user_id, user.id);
    assert_eq!(author.first_name, "Anonymous");
    assert_eq!(author.last_name, "");
    assert_eq!(author.nickname, "");

    let found = repo.get_author_for_user(user.id).await.unwrap().unwrap();
    assert_eq!(found, author);
    let by_name = repo.get_user_by_username(&username).await.unwrap().unwrap();
    assert_eq!(by_name.id, user.id);
}

async fn duplicate_username_conflicts(repo: &dyn Repository) {
    let username = unique("dup");
    repo.create_user(new_user(&username)).await.unwrap();

    let result = repo.create_user(new_user(&username)).await;
    assert!(matches!(result, Err(RepositoryError::Conflict("username"))));
}

async fn tags_are_get_or_create(repo: &dyn Repository) {
    let (_, author) = repo.create_user(new_user(&unique("tagger"))).await.unwrap();
    let shared = unique("shared");
    let extra = unique("extra");

    let first = publish(repo, author.id, "first", 0).await;
    let second = publish(repo, author.id, "second", 0).await;

    let tags_a = repo.attach_tags(first, &[shared.clone()]).await.unwrap();
    let tags_b = repo
        .attach_tags(second, &[shared.clone(), extra.clone()])
        .await
        .unwrap();
    // One tag row per name.
    assert_eq!(tags_a[0].id, tags_b[0].id);

    // Attaching again is a no-op; attachment order is kept.
    let again = repo.attach_tags(second, &[extra.clone()]).await.unwrap();
    assert_eq!(again.len(), 1);
    let linked = repo.tags_for_article(second).await.unwrap();
    let names: Vec<String> = linked.into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec![shared, extra]);
}

async fn listing_filters_and_orders(repo: &dyn Repository) {
    let (_, author) = repo.create_user(new_user(&unique("lister"))).await.unwrap();
    let red = unique("red");
    let blue = unique("blue");

    let old = publish(repo, author.id, "old", 30).await;
    let new = publish(repo, author.id, "new", 1).await;
    let untagged = publish(repo, author.id, "untagged", 0).await;
    repo.attach_tags(old, &[red.clone()]).await.unwrap();
    repo.attach_tags(new, &[red.clone(), blue.clone()]).await.unwrap();

    let query = ArticleQuery {
        tags: Some(vec![red.clone(), blue.clone()]),
        limit: 10,
        offset: 0,
    };
    let (count, articles) = repo.list_articles(&query).await.unwrap();
    let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
    assert_eq!(count, 2);
    assert_eq!(ids, vec![new, old]);
    assert!(!ids.contains(&untagged));

    let second_page = ArticleQuery {
        offset: 1,
        limit: 1,
        ..query
    };
    let (count, articles) = repo.list_articles(&second_page).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].id, old);
}

async fn delete_article_cascades(repo: &dyn Repository) {
    let (_, author) = repo.create_user(new_user(&unique("owner"))).await.unwrap();
    let tag = unique("lasting");
    let id = publish(repo, author.id, "doomed", 0).await;
    repo.attach_tags(id, &[tag.clone()]).await.unwrap();
    let comment = repo
        .create_comment(NewComment {
            article_id: id,
            author_id: author.id,
            content: "bye".to_string(),
            publication_date: Utc::now(),
        })
        .await
        .unwrap();

    assert!(repo.delete_article(id).await.unwrap());
    assert!(!repo.delete_article(id).await.unwrap());
    assert!(repo.get_article(id).await.unwrap().is_none());
    assert!(repo.get_comment(comment.id).await.unwrap().is_none());

    // The tag row outlives the article.
    let other = publish(repo, author.id, "other", 0).await;
    let reused = repo.attach_tags(other, &[tag.clone()]).await.unwrap();
    assert_eq!(reused[0].name, tag);
}

async fn updates_apply(repo: &dyn Repository) {
    let (user, author) = repo.create_user(new_user(&unique("editor"))).await.unwrap();
    let id = publish(repo, author.id, "draft", 0).await;

    let updated = repo
        .update_article(
            id,
            ArticleChanges {
                title: "final".to_string(),
                content: "done".to_string(),
                rating: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "final");
    assert_eq!(updated.rating, 0, "rating untouched when not supplied");

    let missing = repo
        .update_article(
            i64::MAX,
            ArticleChanges {
                title: "x".to_string(),
                content: "y".to_string(),
                rating: Some(1),
            },
        )
        .await
        .unwrap();
    assert!(missing.is_none());

    let renamed = repo
        .update_author(
            author.id,
            AuthorUpdate {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                nickname: "amazing".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.first_name, "Grace");

    let demoted = repo.set_redaction(user.id, false).await.unwrap().unwrap();
    assert!(!demoted.is_redaction);
}

async fn comments_thread_in_order(repo: &dyn Repository) {
    let (_, author) = repo.create_user(new_user(&unique("talker"))).await.unwrap();
    let id = publish(repo, author.id, "thread", 0).await;

    for (offset, text) in [(2, "first"), (1, "second")] {
        repo.create_comment(NewComment {
            article_id: id,
            author_id: author.id,
            content: text.to_string(),
            publication_date: Utc::now() - Duration::minutes(offset),
        })
        .await
        .unwrap();
    }

    let thread = repo.comments_for_article(id).await.unwrap();
    let texts: Vec<&str> = thread.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);

    let edited = repo
        .update_comment(thread[0].id, "edited".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(edited.content, "edited");
    assert!(repo.delete_comment(thread[1].id).await.unwrap());
    assert_eq!(repo.comments_for_article(id).await.unwrap().len(), 1);
}

// --- In-Memory Runs ---

#[tokio::test]
async fn memory_user_gets_default_author() {
    user_gets_default_author(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_duplicate_username_conflicts() {
    duplicate_username_conflicts(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_tags_are_get_or_create() {
    tags_are_get_or_create(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_listing_filters_and_orders() {
    listing_filters_and_orders(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_delete_article_cascades() {
    delete_article_cascades(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_updates_apply() {
    updates_apply(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn memory_comments_thread_in_order() {
    comments_thread_in_order(&MemoryRepository::new()).await;
}

// --- Postgres Runs ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_repository_contract() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository().await;

    user_gets_default_author(&repo).await;
    duplicate_username_conflicts(&repo).await;
    tags_are_get_or_create(&repo).await;
    listing_filters_and_orders(&repo).await;
    delete_article_cascades(&repo).await;
    updates_apply(&repo).await;
    comments_thread_in_order(&repo).await;
}
