//! 内容搜索服务

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::metamodel::store::MetamodelStore;
use crate::models::category::Category;
use crate::models::record::HubKey;
use crate::query::executor::{SearchPlan, SearchResultSet};
use crate::query::parser::parse;
use crate::services::catalog::check_query;
use crate::storage::repository::RecordStore;

/// 搜索请求
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// 查询表达式
    pub query: String,
    /// 投影类别，空表示默认投影
    pub categories: Vec<Category>,
    /// 最大行数，0 表示不限
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// 搜索服务 trait
#[async_trait]
pub trait SearchService: Send + Sync {
    /// 执行搜索，返回有序结果集
    async fn search(&self, key: &HubKey, request: &SearchRequest) -> Result<SearchResultSet>;
}

/// 搜索服务实现
pub struct SearchServiceImpl {
    metamodels: Arc<dyn MetamodelStore>,
    records: Arc<dyn RecordStore>,
}

impl SearchServiceImpl {
    /// 创建新的服务实例
    pub fn new(metamodels: Arc<dyn MetamodelStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            metamodels,
            records,
        }
    }
}

#[async_trait]
impl SearchService for SearchServiceImpl {
    async fn search(&self, key: &HubKey, request: &SearchRequest) -> Result<SearchResultSet> {
        let expression = parse(&request.query)?;

        let metamodel = self.metamodels.get_metamodel(key).await?;
        check_query(&metamodel, key, &request.categories, &expression)?;

        let plan = SearchPlan::new(
            expression,
            &request.categories,
            &metamodel.references,
            request.limit,
        );
        debug!(
            "Search on {}: join {:?}, projection {:?}, limit {}",
            key, plan.join, plan.projection, plan.limit
        );

        self.records
            .search(key, &plan, &metamodel.references)
            .await
    }
}

/// 创建搜索服务
pub fn create_search_service(
    metamodels: Arc<dyn MetamodelStore>,
    records: Arc<dyn RecordStore>,
) -> Arc<dyn SearchService> {
    Arc::new(SearchServiceImpl::new(metamodels, records))
}
