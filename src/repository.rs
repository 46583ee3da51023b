//! Repository port
//!
//! The relational store is an external collaborator. The cache service only
//! needs the three article reads below, used on its miss path.
//! [`InMemoryArticleRepository`] serves them from a catalog held in memory.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::info;

use crate::context::RequestContext;
use crate::error::{Result, ServiceError};
use crate::models::{ArticleCategory, ArticleDetail, ArticleTag};

/// Read access to article data.
///
/// Implementations should honour the context's deadline and token; the
/// cache service also enforces both around each call.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn get_all_categories(&self, ctx: &RequestContext) -> Result<Vec<ArticleCategory>>;

    async fn get_all_tags(&self, ctx: &RequestContext) -> Result<Vec<ArticleTag>>;

    /// Loads an article as seen by `viewer_id` (0 for anonymous).
    async fn get_article_by_id(
        &self,
        ctx: &RequestContext,
        article_id: u64,
        viewer_id: u64,
    ) -> Result<ArticleDetail>;
}

// == In-Memory Repository ==
/// Article data as loaded from a catalog file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleCatalog {
    #[serde(default)]
    pub categories: Vec<ArticleCategory>,
    #[serde(default)]
    pub tags: Vec<ArticleTag>,
    #[serde(default)]
    pub articles: Vec<ArticleDetail>,
    /// (article id, user id) pairs
    #[serde(default)]
    pub likes: Vec<(u64, u64)>,
}

/// Repository over a fixed in-process catalog.
///
/// Backs the binary when no relational store is attached, and the tests.
#[derive(Default)]
pub struct InMemoryArticleRepository {
    categories: RwLock<Vec<ArticleCategory>>,
    tags: RwLock<Vec<ArticleTag>>,
    articles: RwLock<HashMap<u64, ArticleDetail>>,
    likes: RwLock<HashSet<(u64, u64)>>,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: ArticleCatalog) -> Self {
        let repo = Self::new();
        *repo.categories.write() = catalog.categories;
        *repo.tags.write() = catalog.tags;
        for article in catalog.articles {
            repo.put_article(article);
        }
        repo.likes.write().extend(catalog.likes);
        repo
    }

    /// Loads a JSON [`ArticleCatalog`] from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let catalog: ArticleCatalog = serde_json::from_slice(&raw)?;
        info!(
            path = %path.display(),
            categories = catalog.categories.len(),
            tags = catalog.tags.len(),
            articles = catalog.articles.len(),
            "Article catalog loaded"
        );
        Ok(Self::from_catalog(catalog))
    }

    pub fn set_categories(&self, categories: Vec<ArticleCategory>) {
        *self.categories.write() = categories;
    }

    pub fn set_tags(&self, tags: Vec<ArticleTag>) {
        *self.tags.write() = tags;
    }

    /// Inserts or replaces an article.
    pub fn put_article(&self, article: ArticleDetail) {
        self.articles.write().insert(article.id, article);
    }

    pub fn set_liked(&self, article_id: u64, user_id: u64, liked: bool) {
        let mut likes = self.likes.write();
        if liked {
            likes.insert((article_id, user_id));
        } else {
            likes.remove(&(article_id, user_id));
        }
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn get_all_categories(&self, _ctx: &RequestContext) -> Result<Vec<ArticleCategory>> {
        let mut categories = self.categories.read().clone();
        categories.sort_by_key(|c| (c.sort_order, c.id));
        Ok(categories)
    }

    async fn get_all_tags(&self, _ctx: &RequestContext) -> Result<Vec<ArticleTag>> {
        Ok(self.tags.read().clone())
    }

    async fn get_article_by_id(
        &self,
        _ctx: &RequestContext,
        article_id: u64,
        viewer_id: u64,
    ) -> Result<ArticleDetail> {
        let mut article = self
            .articles
            .read()
            .get(&article_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("article {article_id}")))?;
        article.is_liked = viewer_id != 0 && self.likes.read().contains(&(article_id, viewer_id));
        Ok(article)
    }
}
