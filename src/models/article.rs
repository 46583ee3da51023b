//! Article read models
//!
//! Shapes returned by the article repository and cached by the cache service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// 0 for top-level categories
    #[serde(default)]
    pub parent_id: u64,
    #[serde(default)]
    pub article_count: i64,
    #[serde(default)]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Article tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTag {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub article_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Public author card embedded in article payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleAuthor {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
}

/// Article as seen by one viewer.
///
/// `is_liked` depends on who is asking, which is why cached copies are
/// keyed by article and viewer together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    /// 0 draft, 1 published, 2 deleted
    pub status: i32,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub author: ArticleAuthor,
    #[serde(default)]
    pub categories: Vec<ArticleCategory>,
    #[serde(default)]
    pub tags: Vec<ArticleTag>,
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
