//! 元模型缓存
//!
//! 每个 (仓库, Hub) 一个槽位。同一个键的并发请求共享一次加载，
//! 不同的键互不等待。加载失败时，正在等待同一次加载的请求共享该错误；
//! 失败不缓存，之后的请求会重新加载。

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::metamodel::loader::MetamodelLoader;
use crate::metamodel::schema::Metamodel;
use crate::models::record::HubKey;
use crate::observability::AppMetrics;

/// 元模型存储 trait
#[async_trait]
pub trait MetamodelStore: Send + Sync {
    /// 获取元模型；未知的仓库或 Hub 返回 NotFound
    async fn get_metamodel(&self, key: &HubKey) -> Result<Arc<Metamodel>>;

    /// 已注册的仓库
    async fn repositories(&self) -> Result<Vec<String>>;

    /// 仓库下的 Hub
    async fn hubs(&self, repository: &str) -> Result<Vec<String>>;

    /// 使单个键失效
    fn invalidate(&self, key: &HubKey);

    /// 清空缓存
    fn invalidate_all(&self);
}

struct Loaded {
    metamodel: Arc<Metamodel>,
    loaded_at: Instant,
}

/// 失败的结果只在槽位被移除前对等待者可见
#[derive(Default)]
struct Slot {
    cell: OnceCell<std::result::Result<Loaded, AppError>>,
}

/// 带 TTL 的单飞缓存
pub struct CachedMetamodelStore {
    loader: Arc<dyn MetamodelLoader>,
    slots: DashMap<HubKey, Arc<Slot>>,
    /// None 表示永不过期
    ttl: Option<Duration>,
    metrics: Option<Arc<AppMetrics>>,
}

impl CachedMetamodelStore {
    pub fn new(loader: Arc<dyn MetamodelLoader>, ttl: Option<Duration>) -> Self {
        Self {
            loader,
            slots: DashMap::new(),
            ttl,
            metrics: None,
        }
    }

    /// 从配置的秒数创建，0 表示永不过期
    pub fn with_ttl_secs(loader: Arc<dyn MetamodelLoader>, ttl_secs: u64) -> Self {
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        Self::new(loader, ttl)
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 当前缓存的键数量
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn expired(&self, loaded: &Loaded) -> bool {
        self.ttl.is_some_and(|ttl| loaded.loaded_at.elapsed() >= ttl)
    }

    /// 只移除仍是同一个槽位的条目，避免误删并发请求新建的槽位
    fn evict(&self, key: &HubKey, slot: &Arc<Slot>) {
        self.slots.remove_if(key, |_, current| Arc::ptr_eq(current, slot));
    }

    fn record(&self, f: impl FnOnce(&AppMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    async fn load(&self, key: &HubKey) -> std::result::Result<Loaded, AppError> {
        match self.loader.load(key).await {
            Ok(metamodel) => {
                self.record(AppMetrics::record_cache_load);
                info!(
                    "Loaded metamodel for {} ({} categories)",
                    key,
                    metamodel.categories.len()
                );
                Ok(Loaded {
                    metamodel: Arc::new(metamodel),
                    loaded_at: Instant::now(),
                })
            }
            Err(e) => {
                warn!("Failed to load metamodel for {}: {}", key, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MetamodelStore for CachedMetamodelStore {
    async fn get_metamodel(&self, key: &HubKey) -> Result<Arc<Metamodel>> {
        loop {
            // 取出槽位后立即释放分片锁，加载期间不持有锁
            let slot = self.slots.entry(key.clone()).or_default().value().clone();

            match slot.cell.get() {
                Some(Ok(loaded)) if self.expired(loaded) => {
                    debug!("Metamodel for {} expired", key);
                    self.evict(key, &slot);
                    continue;
                }
                Some(Ok(loaded)) => {
                    self.record(AppMetrics::record_cache_hit);
                    return Ok(Arc::clone(&loaded.metamodel));
                }
                Some(Err(e)) => {
                    self.evict(key, &slot);
                    return Err(e.clone());
                }
                None => {}
            }

            self.record(AppMetrics::record_cache_miss);
            let outcome = slot.cell.get_or_init(|| self.load(key)).await;

            return match outcome {
                Ok(loaded) => Ok(Arc::clone(&loaded.metamodel)),
                Err(e) => {
                    self.evict(key, &slot);
                    Err(e.clone())
                }
            };
        }
    }

    async fn repositories(&self) -> Result<Vec<String>> {
        self.loader.list_repositories().await
    }

    async fn hubs(&self, repository: &str) -> Result<Vec<String>> {
        self.loader.list_hubs(repository).await
    }

    fn invalidate(&self, key: &HubKey) {
        if self.slots.remove(key).is_some() {
            debug!("Invalidated metamodel for {}", key);
        }
    }

    fn invalidate_all(&self) {
        self.slots.clear();
        debug!("Invalidated all cached metamodels");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::schema::{SchemaNode, ValueType};
    use crate::models::category::Category;
    use futures_util::future::join_all;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// 计数加载器：`broken` Hub 第一次加载失败，`failing` Hub 总是稍后失败，
    /// `blocked` Hub 等待通知
    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
        release: Notify,
    }

    fn metamodel() -> Metamodel {
        let root = SchemaNode::object([("local_id".to_string(), SchemaNode::leaf(ValueType::String))]);
        Metamodel {
            categories: BTreeMap::from([(Category::Samples, root)]),
            references: vec![],
        }
    }

    #[async_trait]
    impl MetamodelLoader for CountingLoader {
        async fn list_repositories(&self) -> Result<Vec<String>> {
            Ok(vec!["repo".into()])
        }

        async fn list_hubs(&self, _repository: &str) -> Result<Vec<String>> {
            Ok(vec!["hub".into()])
        }

        async fn load(&self, key: &HubKey) -> Result<Metamodel> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            match key.hub.as_str() {
                "broken" if n == 0 => return Err(AppError::Io("disk".into())),
                "failing" => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    return Err(AppError::Io("disk".into()));
                }
                "blocked" => self.release.notified().await,
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
            Ok(metamodel())
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_load() {
        let loader = Arc::new(CountingLoader::default());
        let store = CachedMetamodelStore::new(loader.clone(), None);
        let key = HubKey::new("repo", "hub");

        let results = join_all((0..8).map(|_| store.get_metamodel(&key))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let loader = Arc::new(CountingLoader::default());
        let store = CachedMetamodelStore::new(loader.clone(), None);
        let key = HubKey::new("repo", "broken");

        assert!(store.get_metamodel(&key).await.is_err());
        assert!(store.is_empty());
        assert!(store.get_metamodel(&key).await.is_ok());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_failure() {
        let loader = Arc::new(CountingLoader::default());
        let store = CachedMetamodelStore::new(loader.clone(), None);
        let key = HubKey::new("repo", "failing");

        let results = join_all((0..8).map(|_| store.get_metamodel(&key))).await;

        assert!(results.iter().all(|r| matches!(r, Err(AppError::Io(_)))));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());

        // 之后的请求重新加载
        assert!(store.get_metamodel(&key).await.is_err());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let loader = Arc::new(CountingLoader::default());
        let store = CachedMetamodelStore::new(loader.clone(), Some(Duration::from_millis(50)));
        let key = HubKey::new("repo", "hub");

        store.get_metamodel(&key).await.unwrap();
        store.get_metamodel(&key).await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.get_metamodel(&key).await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let loader = Arc::new(CountingLoader::default());
        let store = CachedMetamodelStore::with_ttl_secs(loader.clone(), 0);
        let key = HubKey::new("repo", "hub");

        store.get_metamodel(&key).await.unwrap();
        store.invalidate(&key);
        store.get_metamodel(&key).await.unwrap();
        store.invalidate_all();
        assert!(store.is_empty());
        store.get_metamodel(&key).await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_wait_on_each_other() {
        let loader = Arc::new(CountingLoader::default());
        let store = Arc::new(CachedMetamodelStore::new(loader.clone(), None));

        let blocked = {
            let store = store.clone();
            tokio::spawn(async move { store.get_metamodel(&HubKey::new("repo", "blocked")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let other = tokio::time::timeout(
            Duration::from_secs(2),
            store.get_metamodel(&HubKey::new("repo", "hub")),
        )
        .await;
        assert!(matches!(other, Ok(Ok(_))));

        loader.release.notify_one();
        assert!(blocked.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_metrics_count_hits_and_misses() {
        let metrics = Arc::new(AppMetrics::default());
        let store = CachedMetamodelStore::new(Arc::new(CountingLoader::default()), None)
            .with_metrics(metrics.clone());
        let key = HubKey::new("repo", "hub");

        store.get_metamodel(&key).await.unwrap();
        store.get_metamodel(&key).await.unwrap();

        let output = metrics.gather();
        assert!(output.contains("metamodel_cache_hits_total 1"));
        assert!(output.contains("metamodel_cache_misses_total 1"));
        assert!(output.contains("metamodel_loads_total 1"));
    }
}
