//! 元模型加载器
//!
//! 数据目录布局：
//!
//! ```text
//! <data_dir>/<repository>/<hub>/metamodel.schema.json
//! <data_dir>/<repository>/<hub>/references.json      (可选)
//! <data_dir>/<repository>/<hub>/records/<category>.json
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::metamodel::schema::{Metamodel, Reference};
use crate::models::record::HubKey;

/// 元模型文件名
pub const METAMODEL_FILE: &str = "metamodel.schema.json";
/// 引用声明文件名
pub const REFERENCES_FILE: &str = "references.json";

/// 元模型加载器 trait
#[async_trait]
pub trait MetamodelLoader: Send + Sync {
    /// 已注册的仓库（已排序）
    async fn list_repositories(&self) -> Result<Vec<String>>;

    /// 仓库下的 Hub（已排序）；未知仓库返回 NotFound
    async fn list_hubs(&self, repository: &str) -> Result<Vec<String>>;

    /// 加载并编译一个 Hub 的元模型
    async fn load(&self, key: &HubKey) -> Result<Metamodel>;
}

/// 基于数据目录的加载器
#[derive(Debug, Clone)]
pub struct FileMetamodelLoader {
    root: PathBuf,
}

impl FileMetamodelLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hub 目录；名称不能逃出数据目录
    pub fn hub_dir(&self, key: &HubKey) -> Result<PathBuf> {
        check_name(&key.repository)?;
        check_name(&key.hub)?;
        Ok(self.root.join(&key.repository).join(&key.hub))
    }

    async fn subdirectories(dir: &Path) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(|c: char| c == '/' || c == '\\') {
        return Err(AppError::NotFound(format!("invalid name: {}", name)));
    }
    Ok(())
}

async fn read_json(path: &Path) -> Result<Option<Value>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl MetamodelLoader for FileMetamodelLoader {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        Self::subdirectories(&self.root).await
    }

    async fn list_hubs(&self, repository: &str) -> Result<Vec<String>> {
        check_name(repository)?;
        let dir = self.root.join(repository);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(AppError::NotFound(format!("repository '{}'", repository)));
        }

        let mut hubs = Vec::new();
        for hub in Self::subdirectories(&dir).await? {
            if tokio::fs::try_exists(dir.join(&hub).join(METAMODEL_FILE)).await? {
                hubs.push(hub);
            }
        }
        Ok(hubs)
    }

    async fn load(&self, key: &HubKey) -> Result<Metamodel> {
        let dir = self.hub_dir(key)?;
        debug!("Loading metamodel for {} from {}", key, dir.display());

        let document = read_json(&dir.join(METAMODEL_FILE))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("hub '{}'", key)))?;

        let references: Vec<Reference> = match read_json(&dir.join(REFERENCES_FILE)).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };

        Ok(Metamodel::compile(&document, references)?)
    }
}
