//! Cache Service Module
//!
//! Read-through caching for article categories, tags and per-viewer article
//! detail, plus the short-lived online-count scalar and the user/list cache
//! groups.
//!
//! Every payload crosses a JSON boundary: values are serialized to `Bytes`
//! on write and deserialized on read, so each slot always holds one
//! representation and the memory-bounded groups account exact byte sizes.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, LruCache, LruConfig, TtlCache};
use crate::config::CacheConfig;
use crate::context::RequestContext;
use crate::error::Result;
use crate::models::{ArticleCategory, ArticleDetail, ArticleTag};
use crate::repository::ArticleRepository;
use crate::tasks::spawn_warmup_task;

// == Cache Keys ==
pub const KEY_ARTICLE_CATEGORIES: &str = "article:categories:all";
pub const KEY_ARTICLE_TAGS: &str = "article:tags:all";
pub const KEY_ARTICLE_DETAIL_PREFIX: &str = "article:detail:";
pub const KEY_ONLINE_COUNT: &str = "chat:online:count";
pub const KEY_USER_PREFIX: &str = "user:";

/// Composite key of one viewer's copy of an article.
pub fn article_detail_key(article_id: u64, viewer_id: u64) -> String {
    format!("{KEY_ARTICLE_DETAIL_PREFIX}{article_id}:user{viewer_id}")
}

// == Byte Store ==
/// Uniform byte-slot access over both cache primitives.
trait ByteStore {
    fn get_bytes(&self, key: &str) -> Option<Bytes>;
    fn put_bytes(&self, key: &str, bytes: Bytes, ttl: Duration);
    fn remove(&self, key: &str);
}

impl ByteStore for TtlCache<Bytes> {
    fn get_bytes(&self, key: &str) -> Option<Bytes> {
        self.get(key)
    }

    fn put_bytes(&self, key: &str, bytes: Bytes, ttl: Duration) {
        self.set_with_ttl(key, bytes, ttl);
    }

    fn remove(&self, key: &str) {
        self.delete(key);
    }
}

impl ByteStore for LruCache<Bytes> {
    fn get_bytes(&self, key: &str) -> Option<Bytes> {
        self.get(key)
    }

    fn put_bytes(&self, key: &str, bytes: Bytes, ttl: Duration) {
        self.set_with_ttl(key, bytes, ttl);
    }

    fn remove(&self, key: &str) {
        self.delete(key);
    }
}

/// Decodes a cached slot. A payload that no longer decodes is dropped and
/// reported as a miss.
fn load_json<T: DeserializeOwned>(store: &impl ByteStore, key: &str) -> Option<T> {
    let bytes = store.get_bytes(key)?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "Dropping undecodable cache entry");
            store.remove(key);
            None
        }
    }
}

fn store_json<T: Serialize>(store: &impl ByteStore, key: &str, value: &T, ttl: Duration) -> bool {
    match serde_json::to_vec(value) {
        Ok(encoded) => {
            store.put_bytes(key, Bytes::from(encoded), ttl);
            true
        }
        Err(err) => {
            warn!(key, error = %err, "Value not cached, serialization failed");
            false
        }
    }
}

// == Stats ==
/// Statistics of every cache the service owns.
#[derive(Debug, Clone, Serialize)]
pub struct CacheServiceStats {
    pub global: CacheStats,
    pub article: CacheStats,
    pub user: CacheStats,
    pub list: CacheStats,
    /// Articles with at least one indexed viewer copy
    pub indexed_articles: usize,
}

// == Cache Service ==
/// Read-through cache in front of the article repository.
pub struct CacheService {
    repo: Arc<dyn ArticleRepository>,
    config: CacheConfig,
    global: TtlCache<Bytes>,
    articles: LruCache<Bytes>,
    users: LruCache<Bytes>,
    lists: LruCache<Bytes>,
    /// article id -> composite keys of its cached viewer copies
    detail_index: Mutex<HashMap<u64, HashSet<String>>>,
}

impl CacheService {
    // == Constructor ==
    /// Builds the service and its cache groups without warming anything up.
    pub fn new(repo: Arc<dyn ArticleRepository>, config: &CacheConfig) -> Self {
        let service = Self {
            repo,
            config: config.clone(),
            global: TtlCache::new(config.default_ttl),
            articles: LruCache::new(LruConfig::from(&config.article)),
            users: LruCache::new(LruConfig::from(&config.user)),
            lists: LruCache::new(LruConfig::from(&config.list)),
            detail_index: Mutex::new(HashMap::new()),
        };

        info!(
            article_capacity = config.article.capacity,
            user_capacity = config.user.capacity,
            list_capacity = config.list.capacity,
            "Cache service initialized"
        );
        service
    }

    /// Builds the service and starts its background warm-up.
    ///
    /// The warm-up stops early when `shutdown` is cancelled.
    pub fn start(
        repo: Arc<dyn ArticleRepository>,
        config: &CacheConfig,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let service = Arc::new(Self::new(repo, config));
        let handle = spawn_warmup_task(Arc::clone(&service), shutdown);
        (service, handle)
    }

    /// The per-user cache group, for callers that manage their own keys.
    pub fn user_cache(&self) -> &LruCache<Bytes> {
        &self.users
    }

    /// The list cache group, for callers that manage their own keys.
    pub fn list_cache(&self) -> &LruCache<Bytes> {
        &self.lists
    }

    // == Categories ==
    /// Returns all article categories, loading them on a miss.
    ///
    /// Repository errors propagate unchanged and leave the cache empty.
    pub async fn get_article_categories(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<ArticleCategory>> {
        if let Some(categories) = load_json(&self.global, KEY_ARTICLE_CATEGORIES) {
            return Ok(categories);
        }

        let categories = ctx
            .run("load article categories", self.repo.get_all_categories(ctx))
            .await?;
        if store_json(
            &self.global,
            KEY_ARTICLE_CATEGORIES,
            &categories,
            self.config.categories_ttl,
        ) {
            info!(count = categories.len(), ttl = ?self.config.categories_ttl, "Categories cached");
        }
        Ok(categories)
    }

    pub fn invalidate_article_categories(&self) {
        self.global.delete(KEY_ARTICLE_CATEGORIES);
        info!("Categories cache invalidated");
    }

    // == Tags ==
    /// Returns all article tags, loading them on a miss.
    pub async fn get_article_tags(&self, ctx: &RequestContext) -> Result<Vec<ArticleTag>> {
        if let Some(tags) = load_json(&self.global, KEY_ARTICLE_TAGS) {
            return Ok(tags);
        }

        let tags = ctx
            .run("load article tags", self.repo.get_all_tags(ctx))
            .await?;
        if store_json(&self.global, KEY_ARTICLE_TAGS, &tags, self.config.tags_ttl) {
            info!(count = tags.len(), ttl = ?self.config.tags_ttl, "Tags cached");
        }
        Ok(tags)
    }

    pub fn invalidate_article_tags(&self) {
        self.global.delete(KEY_ARTICLE_TAGS);
        info!("Tags cache invalidated");
    }

    // == Article Detail ==
    /// Returns an article as seen by `viewer_id`.
    ///
    /// Each viewer gets a separate cached copy because the payload carries
    /// that viewer's like flag. Copies live in the article group and are
    /// bounded by its capacity and memory limits.
    pub async fn get_article_detail(
        &self,
        ctx: &RequestContext,
        article_id: u64,
        viewer_id: u64,
    ) -> Result<ArticleDetail> {
        let key = article_detail_key(article_id, viewer_id);
        if let Some(detail) = load_json(&self.articles, &key) {
            return Ok(detail);
        }

        let detail = ctx
            .run(
                "load article detail",
                self.repo.get_article_by_id(ctx, article_id, viewer_id),
            )
            .await?;

        // Index and slot are updated together so invalidation sees both or neither.
        let mut index = self.detail_index.lock();
        if store_json(
            &self.articles,
            &key,
            &detail,
            self.config.article_detail_ttl,
        ) {
            index.entry(article_id).or_default().insert(key);
        }
        Ok(detail)
    }

    /// Drops every cached viewer copy of an article.
    ///
    /// Returns the number of copies removed.
    pub fn invalidate_article_detail(&self, article_id: u64) -> usize {
        let mut index = self.detail_index.lock();
        let Some(keys) = index.remove(&article_id) else {
            debug!(article_id, "No cached article detail to invalidate");
            return 0;
        };

        let removed = keys.iter().filter(|key| self.articles.delete(key)).count();
        info!(article_id, removed, "Article detail cache invalidated");
        removed
    }

    /// Forgets index entries whose slot was evicted or expired.
    ///
    /// Returns the number of keys dropped from the index.
    pub fn prune_detail_index(&self) -> usize {
        let mut index = self.detail_index.lock();
        let mut pruned = 0;
        index.retain(|_, keys| {
            let before = keys.len();
            keys.retain(|key| self.articles.contains(key));
            pruned += before - keys.len();
            !keys.is_empty()
        });
        pruned
    }

    // == Online Count ==
    pub fn set_online_count(&self, count: i64) {
        store_json(
            &self.global,
            KEY_ONLINE_COUNT,
            &count,
            self.config.online_count_ttl,
        );
    }

    pub fn get_online_count(&self) -> Option<i64> {
        load_json(&self.global, KEY_ONLINE_COUNT)
    }

    // == User Group ==
    /// Read-through lookup of a per-user payload in the user group.
    pub async fn get_or_load_user<T, Fut>(
        &self,
        ctx: &RequestContext,
        user_id: u64,
        load: Fut,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T>>,
    {
        let key = format!("{KEY_USER_PREFIX}{user_id}");
        let ttl = self.users.config().default_ttl;
        read_through(&self.users, ctx, &key, ttl, "load user", load).await
    }

    pub fn invalidate_user(&self, user_id: u64) {
        self.users.delete(&format!("{KEY_USER_PREFIX}{user_id}"));
    }

    // == List Group ==
    /// Read-through lookup of a list payload (a page of results, a ranking)
    /// in the list group.
    pub async fn get_or_load_list<T, Fut>(
        &self,
        ctx: &RequestContext,
        key: &str,
        load: Fut,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T>>,
    {
        let ttl = self.lists.config().default_ttl;
        read_through(&self.lists, ctx, key, ttl, "load list", load).await
    }

    pub fn invalidate_list(&self, key: &str) {
        self.lists.delete(key);
    }

    // == Warm-up ==
    /// Preloads categories and tags within the configured warm-up timeout.
    ///
    /// Failures are logged, never returned. Returns how many of the two
    /// slots were populated.
    pub async fn warm_up(&self, parent: &RequestContext) -> usize {
        let ctx = parent.child_with_timeout(self.config.warmup_timeout);
        let mut warmed = 0;
        info!("Cache warm-up started");

        match ctx
            .run("warm categories", self.repo.get_all_categories(&ctx))
            .await
        {
            Ok(categories) => {
                if store_json(
                    &self.global,
                    KEY_ARTICLE_CATEGORIES,
                    &categories,
                    self.config.categories_ttl,
                ) {
                    warmed += 1;
                    info!(count = categories.len(), "Categories warmed");
                }
            }
            Err(err) => warn!(error = %err, "Category warm-up failed"),
        }

        match ctx.run("warm tags", self.repo.get_all_tags(&ctx)).await {
            Ok(tags) => {
                if store_json(&self.global, KEY_ARTICLE_TAGS, &tags, self.config.tags_ttl) {
                    warmed += 1;
                    info!(count = tags.len(), "Tags warmed");
                }
            }
            Err(err) => warn!(error = %err, "Tag warm-up failed"),
        }

        info!(warmed, "Cache warm-up finished");
        warmed
    }

    // == Maintenance ==
    /// Removes expired entries from every cache and prunes the detail index.
    ///
    /// Returns the number of cache entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.global.cleanup_expired()
            + self.articles.cleanup_expired()
            + self.users.cleanup_expired()
            + self.lists.cleanup_expired();
        let pruned = self.prune_detail_index();
        if pruned > 0 {
            debug!(pruned, "Detail index pruned");
        }
        removed
    }

    pub fn cache_stats(&self) -> CacheServiceStats {
        CacheServiceStats {
            global: self.global.stats(),
            article: self.articles.stats(),
            user: self.users.stats(),
            list: self.lists.stats(),
            indexed_articles: self.detail_index.lock().len(),
        }
    }

    /// Empties every cache the service owns.
    pub fn clear_all(&self) {
        let mut index = self.detail_index.lock();
        self.global.clear();
        self.articles.clear();
        self.users.clear();
        self.lists.clear();
        index.clear();
        warn!("All caches cleared");
    }
}

async fn read_through<T, Fut>(
    store: &LruCache<Bytes>,
    ctx: &RequestContext,
    key: &str,
    ttl: Duration,
    what: &str,
    load: Fut,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    Fut: Future<Output = Result<T>>,
{
    if let Some(value) = load_json(store, key) {
        return Ok(value);
    }
    let value = ctx.run(what, load).await?;
    store_json(store, key, &value, ttl);
    Ok(value)
}
