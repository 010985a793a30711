//! 取值服务
//!
//! 解析属性路径，确认它指向叶子（或只含叶子的扁平对象），再从记录存储
//! 收集不同取值。

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::metamodel::resolver::{AttributePath, Resolved, resolve};
use crate::metamodel::store::MetamodelStore;
use crate::models::category::Category;
use crate::models::record::HubKey;
use crate::query::executor::SearchPlan;
use crate::query::parser::parse;
use crate::services::catalog::{category_root, check_query};
use crate::storage::repository::{RecordStore, collect_values};

/// 取值请求
#[derive(Debug, Clone, Default)]
pub struct ValuesRequest {
    pub path: AttributePath,
    /// 不区分大小写的子串过滤，空串等同于不过滤
    pub filter: Option<String>,
    /// 只统计出现在该查询结果中的记录
    pub query: Option<String>,
}

/// 取值服务 trait
#[async_trait]
pub trait ValuesService: Send + Sync {
    /// 路径上观测到的不同取值，按字典序排列
    async fn values(
        &self,
        key: &HubKey,
        category: Category,
        request: &ValuesRequest,
    ) -> Result<Vec<String>>;
}

/// 取值服务实现
pub struct ValuesServiceImpl {
    metamodels: Arc<dyn MetamodelStore>,
    records: Arc<dyn RecordStore>,
}

impl ValuesServiceImpl {
    /// 创建新的服务实例
    pub fn new(metamodels: Arc<dyn MetamodelStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            metamodels,
            records,
        }
    }
}

#[async_trait]
impl ValuesService for ValuesServiceImpl {
    async fn values(
        &self,
        key: &HubKey,
        category: Category,
        request: &ValuesRequest,
    ) -> Result<Vec<String>> {
        // 查询语法错误在访问存储之前返回
        let expression = request
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(parse)
            .transpose()?;

        let metamodel = self.metamodels.get_metamodel(key).await?;
        let root = category_root(&metamodel, key, category)?;
        let resolved = resolve(root, &request.path)?;
        if matches!(resolved, Resolved::Object { .. }) && !resolved.is_flat_object() {
            return Err(AppError::NotALeafPath(request.path.to_string()));
        }
        if let Some(expression) = &expression {
            check_query(&metamodel, key, &[], expression)?;
        }
        let filter = request.filter.as_deref();

        let Some(expression) = expression else {
            return self
                .records
                .distinct_values(key, category, &request.path, filter)
                .await;
        };

        let plan = SearchPlan::new(expression, &[category], &metamodel.references, 0);
        let result = self
            .records
            .search(key, &plan, &metamodel.references)
            .await?;
        let ids: HashSet<&str> = result.record_ids(category);
        debug!(
            "Restricting {} values to {} records matched by query",
            category,
            ids.len()
        );

        let records = self.records.fetch_category(key, category).await?;
        Ok(collect_values(
            records.iter().filter(|r| ids.contains(r.id.as_str())),
            &request.path,
            filter,
        ))
    }
}

/// 创建取值服务
pub fn create_values_service(
    metamodels: Arc<dyn MetamodelStore>,
    records: Arc<dyn RecordStore>,
) -> Arc<dyn ValuesService> {
    Arc::new(ValuesServiceImpl::new(metamodels, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::fixture::*;

    fn service() -> Arc<dyn ValuesService> {
        create_values_service(metamodels(), records())
    }

    fn request(path: &str) -> ValuesRequest {
        ValuesRequest {
            path: path.parse().unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_leaf_values_contain_known_term() {
        let values = service()
            .values(&example(), Category::Samples, &request("sample_type->term_value"))
            .await
            .unwrap();
        assert!(values.contains(&"H1-hESC".to_string()));
        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(values, sorted);
    }

    #[tokio::test]
    async fn test_filter_narrows_values() {
        let mut req = request("file_format->term_value");
        req.filter = Some("ENCODE".into());
        let values = service()
            .values(&example(), Category::Tracks, &req)
            .await
            .unwrap();
        assert_eq!(values, vec!["ENCODE narrow peak format"]);
    }

    #[tokio::test]
    async fn test_empty_filter_is_no_filter() {
        let service = service();
        let plain = service
            .values(&example(), Category::Tracks, &request("genome_assembly"))
            .await
            .unwrap();
        let mut req = request("genome_assembly");
        req.filter = Some(String::new());
        assert_eq!(
            service.values(&example(), Category::Tracks, &req).await.unwrap(),
            plain
        );
    }

    #[tokio::test]
    async fn test_values_are_idempotent() {
        let service = service();
        let req = request("biomaterial_type");
        let first = service.values(&example(), Category::Samples, &req).await.unwrap();
        let second = service.values(&example(), Category::Samples, &req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["cell line", "primary cell"]);
    }

    #[tokio::test]
    async fn test_flat_object_values_are_json() {
        let values = service()
            .values(&example(), Category::Experiments, &request("technique"))
            .await
            .unwrap();
        assert_eq!(values.len(), 2);
        assert!(values[0].starts_with('{'));
    }

    #[tokio::test]
    async fn test_object_path_is_not_a_leaf() {
        let result = service()
            .values(&example(), Category::Experiments, &request("target"))
            .await;
        assert!(matches!(result, Err(AppError::NotALeafPath(p)) if p == "target"));
    }

    #[tokio::test]
    async fn test_unresolvable_trailing_segment() {
        let result = service()
            .values(&example(), Category::Samples, &request("sample_type->term_label"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::UnknownAttribute { segment, .. }) if segment == "term_label"
        ));
    }

    #[tokio::test]
    async fn test_query_restricts_values() {
        let mut req = request("file_format->term_value");
        req.query = Some("samples.content->'biomaterial_type' ? 'primary cell'".into());
        let values = service()
            .values(&example(), Category::Tracks, &req)
            .await
            .unwrap();
        assert_eq!(values, vec!["BED", "ENCODE narrow peak format"]);
    }

    #[tokio::test]
    async fn test_bad_query_fails_before_store_access() {
        let mut req = request("file_format->term_value");
        req.query = Some("samples.content ? 'x'".into());
        let result = service()
            .values(&HubKey::new("Example", "Missing"), Category::Tracks, &req)
            .await;
        assert!(matches!(result, Err(AppError::QueryParse(_))));
    }
}
