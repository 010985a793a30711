//! 内存记录存储
//!
//! 首次访问某个 (Hub, 类别) 时从 `<data_dir>/<repo>/<hub>/records/<category>.json`
//! 读取内容数组并常驻内存；测试中也可以直接插入。

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::category::Category;
use crate::models::record::{HubKey, Record};
use crate::storage::repository::RecordStore;

/// 记录目录名
pub const RECORDS_DIR: &str = "records";

/// 基于 DashMap 的内存存储
#[derive(Default)]
pub struct MemoryRecordStore {
    root: Option<PathBuf>,
    tables: DashMap<(HubKey, Category), Arc<Vec<Record>>>,
}

impl MemoryRecordStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 按需从数据目录加载
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            tables: DashMap::new(),
        }
    }

    /// 插入一个类别的内容，按顺序分配 ID 和 ordinal
    pub fn insert(&self, key: HubKey, category: Category, contents: Vec<Value>) {
        let records = build_records(category, contents);
        self.tables.insert((key, category), Arc::new(records));
    }

    async fn load(&self, key: &HubKey, category: Category) -> Result<Vec<Record>> {
        let Some(root) = &self.root else {
            return Ok(Vec::new());
        };
        let path = root
            .join(&key.repository)
            .join(&key.hub)
            .join(RECORDS_DIR)
            .join(format!("{}.json", category));

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Execution(format!("{}: {}", path.display(), e))),
        };
        let contents: Vec<Value> = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Execution(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded {} {} records for {}", contents.len(), category, key);
        Ok(build_records(category, contents))
    }
}

fn build_records(category: Category, contents: Vec<Value>) -> Vec<Record> {
    contents
        .into_iter()
        .enumerate()
        .map(|(i, content)| Record::new(format!("{}:{}", category, i), category, i as u64, content))
        .collect()
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_category(&self, key: &HubKey, category: Category) -> Result<Vec<Record>> {
        let table_key = (key.clone(), category);
        if let Some(records) = self.tables.get(&table_key) {
            return Ok(records.value().to_vec());
        }

        let records = Arc::new(self.load(key, category).await?);
        self.tables.insert(table_key, Arc::clone(&records));
        Ok(records.to_vec())
    }
}
