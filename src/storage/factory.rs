//! 存储工厂模块
//!
//! 根据配置创建相应的记录存储实例。

use std::sync::Arc;
use tracing::info;

use crate::config::config::{AppConfig, StorageBackend};
use crate::error::Result;
use crate::storage::memory::MemoryRecordStore;
use crate::storage::repository::RecordStore;

#[cfg(feature = "surrealdb")]
use crate::storage::surrealdb::{SurrealPool, SurrealRecordStore};

/// 存储工厂
pub struct StorageFactory;

impl StorageFactory {
    /// 根据配置创建存储实例
    pub async fn create(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
        match config.database.backend {
            StorageBackend::Memory => {
                info!(
                    "Using in-memory record store over {}",
                    config.catalog.data_dir.display()
                );
                Ok(Arc::new(MemoryRecordStore::from_dir(
                    config.catalog.data_dir.clone(),
                )))
            }
            #[cfg(feature = "surrealdb")]
            StorageBackend::SurrealDB => {
                let pool = SurrealPool::new(&config.database).await?;
                info!("Connected to SurrealDB at {}", config.database.url);
                Ok(Arc::new(SurrealRecordStore::new(pool)))
            }
            #[cfg(not(feature = "surrealdb"))]
            StorageBackend::SurrealDB => Err(crate::error::AppError::Config(
                "SurrealDB feature is not enabled. Enable 'surrealdb' feature to use SurrealDB."
                    .into(),
            )),
        }
    }
}
