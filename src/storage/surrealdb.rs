use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use surrealdb::{
    Surreal,
    engine::any::{Any, connect},
    opt::auth::Root,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::category::Category;
use crate::models::record::{HubKey, Record};
use crate::storage::repository::RecordStore;

/// 记录表名
pub const RECORD_TABLE: &str = "record";

/// SurrealDB 连接池
#[derive(Clone)]
pub struct SurrealPool {
    /// 数据库连接
    db: Arc<Mutex<Option<Surreal<Any>>>>,
}

impl SurrealPool {
    /// 创建新的连接池
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.connection_timeout.max(1));
        let db: Surreal<Any> = tokio::time::timeout(timeout, connect(&config.url))
            .await
            .map_err(|_| AppError::Timeout(format!("connecting to {}", config.url)))??;

        // 认证
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await?;

        // 选择命名空间和数据库
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
        })
    }

    /// 获取内部数据库实例
    pub async fn inner(&self) -> Result<Surreal<Any>> {
        let guard = self.db.lock().await;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| AppError::Database("database connection closed".into()))
    }

    /// 关闭连接
    pub async fn close(&self) {
        let mut guard = self.db.lock().await;
        *guard = None;
    }
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    local_id: String,
    ordinal: u64,
    content: Value,
}

/// SurrealDB 记录存储
///
/// 表 `record` 的字段：`repository, hub, category, local_id, ordinal, content`。
#[derive(Clone)]
pub struct SurrealRecordStore {
    pool: SurrealPool,
}

impl SurrealRecordStore {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SurrealRecordStore {
    async fn fetch_category(&self, key: &HubKey, category: Category) -> Result<Vec<Record>> {
        let db = self.pool.inner().await?;
        let query = format!(
            "SELECT local_id, ordinal, content FROM {}
             WHERE repository = $repository AND hub = $hub AND category = $category
             ORDER BY ordinal ASC",
            RECORD_TABLE
        );
        let rows: Vec<RecordRow> = db
            .query(query)
            .bind(("repository", key.repository.clone()))
            .bind(("hub", key.hub.clone()))
            .bind(("category", category.as_str().to_string()))
            .await
            .map_err(|e| AppError::Execution(e.to_string()))?
            .take(0)
            .map_err(|e| AppError::Execution(e.to_string()))?;

        debug!("Fetched {} {} records for {}", rows.len(), category, key);
        Ok(rows
            .into_iter()
            .map(|row| {
                Record::new(
                    format!("{}:{}", category, row.local_id),
                    category,
                    row.ordinal,
                    row.content,
                )
            })
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        let db = self.pool.inner().await?;
        db.query("RETURN 1").await?;
        Ok(true)
    }
}
