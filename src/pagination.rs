use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::{error::ApiError, representation::ArticleDetail};

/// ArticleListParams
///
/// Query parameters of `GET /articles/`. `page` stays a string so an unparsable value
/// answers "Invalid page." instead of a query rejection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArticleListParams {
    /// Comma-separated tag names; articles carrying any of them are listed.
    pub tags: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: i64,
    pub size: i64,
}

fn invalid_page() -> ApiError {
    ApiError::NotFound("Invalid page.".to_string())
}

impl PageRequest {
    pub fn parse(raw: Option<&str>, size: u32) -> Result<Self, ApiError> {
        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some(value) => value.parse::<i64>().map_err(|_| invalid_page())?,
        };
        if number < 1 {
            return Err(invalid_page());
        }
        Ok(Self {
            number,
            size: i64::from(size.max(1)),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }

    /// Number of pages for `count` items. An empty listing still has one (empty) page.
    pub fn page_count(&self, count: i64) -> i64 {
        ((count + self.size - 1) / self.size).max(1)
    }

    /// Rejects pages past the end once the total is known.
    pub fn check_bounds(&self, count: i64) -> Result<(), ApiError> {
        if self.number > self.page_count(count) {
            Err(invalid_page())
        } else {
            Ok(())
        }
    }
}

/// ArticlePage
///
/// One page of the article listing with links to its neighbours.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticlePage {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<ArticleDetail>,
}

impl ArticlePage {
    pub fn build(
        page: PageRequest,
        count: i64,
        tags: Option<&str>,
        results: Vec<ArticleDetail>,
    ) -> Self {
        let next = (page.number < page.page_count(count)).then(|| link(page.number + 1, tags));
        let previous = (page.number > 1).then(|| link(page.number - 1, tags));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

fn link(number: i64, tags: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("page", &number.to_string());
    if let Some(tags) = tags.filter(|tags| !tags.is_empty()) {
        query.append_pair("tags", tags);
    }
    format!("/articles/?{}", query.finish())
}
