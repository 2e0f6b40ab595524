use crate::models::{
    Article, ArticleChanges, ArticleQuery, Author, AuthorUpdate, Comment, NewArticle, NewComment,
    NewUser, Tag, User,
};
use crate::repository::{RepoResult, Repository, RepositoryError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// MemoryRepository
///
/// In-process `Repository` with the same observable semantics as the Postgres store:
/// unique usernames and tag names, user + author inserted together, comment and tag-link
/// cascades on article delete. Used for local runs without `DATABASE_URL` and by the tests.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<i64, User>,
    authors: BTreeMap<i64, Author>,
    tags: BTreeMap<i64, Tag>,
    articles: BTreeMap<i64, Article>,
    // (article_id, tag_id) in attachment order.
    article_tags: Vec<(i64, i64)>,
    comments: BTreeMap<i64, Comment>,
    last_id: i64,
}

impl Store {
    // One sequence shared by every table is enough to keep ids unique per table.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn has_any_tag(&self, article_id: i64, names: &[String]) -> bool {
        self.article_tags.iter().any(|(a, t)| {
            *a == article_id
                && self
                    .tags
                    .get(t)
                    .is_some_and(|tag| names.iter().any(|n| *n == tag.name))
        })
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<(User, Author)> {
        let mut store = self.store.write().await;
        if store.users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict("username"));
        }

        let created = User {
            id: store.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_redaction: user.is_redaction,
            is_superuser: user.is_superuser,
            date_joined: Utc::now(),
        };
        let author = Author {
            id: store.next_id(),
            user_id: created.id,
            first_name: Author::DEFAULT_FIRST_NAME.to_string(),
            last_name: String::new(),
            nickname: String::new(),
        };

        store.users.insert(created.id, created.clone());
        store.authors.insert(author.id, author.clone());
        Ok((created, author))
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.username == username).cloned())
    }

    async fn set_redaction(&self, user_id: i64, is_redaction: bool) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(&user_id).map(|user| {
            user.is_redaction = is_redaction;
            user.clone()
        }))
    }

    async fn get_author(&self, id: i64) -> RepoResult<Option<Author>> {
        Ok(self.store.read().await.authors.get(&id).cloned())
    }

    async fn get_author_for_user(&self, user_id: i64) -> RepoResult<Option<Author>> {
        let store = self.store.read().await;
        Ok(store.authors.values().find(|a| a.user_id == user_id).cloned())
    }

    async fn list_authors(&self) -> RepoResult<Vec<Author>> {
        Ok(self.store.read().await.authors.values().cloned().collect())
    }

    async fn update_author(&self, id: i64, update: AuthorUpdate) -> RepoResult<Option<Author>> {
        let mut store = self.store.write().await;
        Ok(store.authors.get_mut(&id).map(|author| {
            author.first_name = update.first_name;
            author.last_name = update.last_name;
            author.nickname = update.nickname;
            author.clone()
        }))
    }

    async fn list_articles(&self, query: &ArticleQuery) -> RepoResult<(i64, Vec<Article>)> {
        let store = self.store.read().await;
        let mut matching: Vec<&Article> = store
            .articles
            .values()
            .filter(|a| match &query.tags {
                Some(names) => store.has_any_tag(a.id, names),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| {
            b.publication_date
                .cmp(&a.publication_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((total, page))
    }

    async fn get_article(&self, id: i64) -> RepoResult<Option<Article>> {
        Ok(self.store.read().await.articles.get(&id).cloned())
    }

    async fn create_article(&self, article: NewArticle) -> RepoResult<Article> {
        let mut store = self.store.write().await;
        let created = Article {
            id: store.next_id(),
            title: article.title,
            content: article.content,
            author_id: article.author_id,
            publication_date: article.publication_date,
            rating: article.rating,
        };
        store.articles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_article(&self, id: i64, changes: ArticleChanges) -> RepoResult<Option<Article>> {
        let mut store = self.store.write().await;
        Ok(store.articles.get_mut(&id).map(|article| {
            article.title = changes.title;
            article.content = changes.content;
            if let Some(rating) = changes.rating {
                article.rating = rating;
            }
            article.clone()
        }))
    }

    async fn delete_article(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.articles.remove(&id).is_none() {
            return Ok(false);
        }
        store.article_tags.retain(|(article_id, _)| *article_id != id);
        store.comments.retain(|_, c| c.article_id != id);
        Ok(true)
    }

    async fn attach_tags(&self, article_id: i64, names: &[String]) -> RepoResult<Vec<Tag>> {
        let mut store = self.store.write().await;
        let mut attached = Vec::with_capacity(names.len());
        for name in names {
            let existing = store.tags.values().find(|t| t.name == *name).cloned();
            let tag = match existing {
                Some(tag) => tag,
                None => {
                    let tag = Tag {
                        id: store.next_id(),
                        name: name.clone(),
                    };
                    store.tags.insert(tag.id, tag.clone());
                    tag
                }
            };
            if !store.article_tags.contains(&(article_id, tag.id)) {
                store.article_tags.push((article_id, tag.id));
            }
            attached.push(tag);
        }
        Ok(attached)
    }

    async fn tags_for_article(&self, article_id: i64) -> RepoResult<Vec<Tag>> {
        let store = self.store.read().await;
        Ok(store
            .article_tags
            .iter()
            .filter(|(a, _)| *a == article_id)
            .filter_map(|(_, t)| store.tags.get(t).cloned())
            .collect())
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let mut store = self.store.write().await;
        let created = Comment {
            id: store.next_id(),
            author_id: comment.author_id,
            article_id: comment.article_id,
            content: comment.content,
            publication_date: comment.publication_date,
        };
        store.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        Ok(self.store.read().await.comments.get(&id).cloned())
    }

    async fn comments_for_article(&self, article_id: i64) -> RepoResult<Vec<Comment>> {
        let store = self.store.read().await;
        let mut comments: Vec<Comment> = store
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            a.publication_date
                .cmp(&b.publication_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    async fn update_comment(&self, id: i64, content: String) -> RepoResult<Option<Comment>> {
        let mut store = self.store.write().await;
        Ok(store.comments.get_mut(&id).map(|comment| {
            comment.content = content;
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        Ok(self.store.write().await.comments.remove(&id).is_some())
    }
}
