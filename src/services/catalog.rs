//! 目录服务
//!
//! 仓库、Hub、元模型、类别和属性的浏览。

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::metamodel::resolver::{AttributePath, resolve};
use crate::metamodel::schema::{Metamodel, SchemaNode};
use crate::metamodel::store::MetamodelStore;
use crate::models::category::Category;
use crate::models::record::HubKey;
use crate::query::ast::Expression;
use crate::query::executor::Condition;

/// 获取类别的根节点，未声明的类别返回 NotFound
pub fn category_root<'m>(
    metamodel: &'m Metamodel,
    key: &HubKey,
    category: Category,
) -> Result<&'m SchemaNode> {
    metamodel
        .category(category)
        .ok_or_else(|| AppError::NotFound(format!("category '{}' in hub '{}'", category, key)))
}

/// 在访问存储之前检查查询
///
/// `categories` 和查询引用的类别都必须在 Hub 中声明，否则返回 NotFound；
/// 条件（包括 LIKE 模式）必须能够编译。
pub fn check_query<'c>(
    metamodel: &Metamodel,
    key: &HubKey,
    categories: impl IntoIterator<Item = &'c Category>,
    expression: &Expression,
) -> Result<()> {
    let queried = expression.categories();
    for category in categories.into_iter().copied().chain(queried) {
        category_root(metamodel, key, category)?;
    }
    Condition::compile(expression)?;
    Ok(())
}

/// 目录服务 trait
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// 已注册的仓库（已排序）
    async fn repositories(&self) -> Result<Vec<String>>;

    /// 仓库下的 Hub（已排序）
    async fn hubs(&self, repository: &str) -> Result<Vec<String>>;

    /// Hub 的元模型
    async fn metamodel(&self, key: &HubKey) -> Result<Arc<Metamodel>>;

    /// Hub 声明的类别，按规范顺序
    async fn categories(&self, key: &HubKey) -> Result<Vec<Category>>;

    /// 路径指向对象时返回其子属性名；指向叶子时返回空列表
    async fn attributes(
        &self,
        key: &HubKey,
        category: Category,
        path: &AttributePath,
    ) -> Result<Vec<String>>;
}

/// 目录服务实现
pub struct CatalogServiceImpl {
    metamodels: Arc<dyn MetamodelStore>,
}

impl CatalogServiceImpl {
    /// 创建新的服务实例
    pub fn new(metamodels: Arc<dyn MetamodelStore>) -> Self {
        Self { metamodels }
    }
}

#[async_trait]
impl CatalogService for CatalogServiceImpl {
    async fn repositories(&self) -> Result<Vec<String>> {
        self.metamodels.repositories().await
    }

    async fn hubs(&self, repository: &str) -> Result<Vec<String>> {
        self.metamodels.hubs(repository).await
    }

    async fn metamodel(&self, key: &HubKey) -> Result<Arc<Metamodel>> {
        self.metamodels.get_metamodel(key).await
    }

    async fn categories(&self, key: &HubKey) -> Result<Vec<Category>> {
        Ok(self.metamodels.get_metamodel(key).await?.category_names())
    }

    async fn attributes(
        &self,
        key: &HubKey,
        category: Category,
        path: &AttributePath,
    ) -> Result<Vec<String>> {
        let metamodel = self.metamodels.get_metamodel(key).await?;
        let root = category_root(&metamodel, key, category)?;
        Ok(resolve(root, path)?.attribute_names())
    }
}

/// 创建目录服务
pub fn create_catalog_service(metamodels: Arc<dyn MetamodelStore>) -> Arc<dyn CatalogService> {
    Arc::new(CatalogServiceImpl::new(metamodels))
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use crate::metamodel::loader::FileMetamodelLoader;
    use crate::metamodel::store::CachedMetamodelStore;
    use crate::storage::memory::MemoryRecordStore;
    use crate::storage::repository::RecordStore;

    pub const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data");

    pub fn example() -> HubKey {
        HubKey::new("Example", "Example")
    }

    pub fn metamodels() -> Arc<dyn MetamodelStore> {
        Arc::new(CachedMetamodelStore::new(
            Arc::new(FileMetamodelLoader::new(DATA_DIR)),
            None,
        ))
    }

    pub fn records() -> Arc<dyn RecordStore> {
        Arc::new(MemoryRecordStore::from_dir(DATA_DIR))
    }
}
