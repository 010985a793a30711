use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::metamodel::resolver::AttributePath;
use crate::metamodel::schema::Reference;
use crate::models::category::Category;
use crate::models::content;
use crate::models::record::{HubKey, Record};
use crate::query::executor::{self, SearchPlan, SearchResultSet};

/// 记录存储 trait
///
/// 后端只需实现 `fetch_category`。`distinct_values` 和 `search` 有基于内存
/// 求值的默认实现，后端可以覆盖它们把过滤下推到存储。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 一个类别的全部记录，按 ordinal 升序；没有记录时返回空列表
    async fn fetch_category(&self, key: &HubKey, category: Category) -> Result<Vec<Record>>;

    /// 路径上出现过的全部不同取值（已排序）
    async fn distinct_values(
        &self,
        key: &HubKey,
        category: Category,
        path: &AttributePath,
        filter: Option<&str>,
    ) -> Result<Vec<String>> {
        let records = self.fetch_category(key, category).await?;
        Ok(collect_values(&records, path, filter))
    }

    /// 执行搜索计划
    async fn search(
        &self,
        key: &HubKey,
        plan: &SearchPlan,
        references: &[Reference],
    ) -> Result<SearchResultSet> {
        let tables = try_join_all(plan.join.iter().map(|&category| async move {
            self.fetch_category(key, category)
                .await
                .map(|records| (category, records))
        }))
        .await?;
        let tables: HashMap<Category, Vec<Record>> = tables.into_iter().collect();
        Ok(executor::execute(plan, &tables, references)?)
    }

    /// 检查存储是否可用
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// 收集记录在路径上的取值，去重排序，并按不区分大小写的子串过滤
///
/// 空过滤串等同于不过滤。
pub fn collect_values<'r>(
    records: impl IntoIterator<Item = &'r Record>,
    path: &AttributePath,
    filter: Option<&str>,
) -> Vec<String> {
    let steps = path.steps();
    let needle = filter
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase);

    let mut values = BTreeSet::new();
    for record in records {
        for text in content::texts(&record.values_at(&steps)) {
            let keep = needle
                .as_deref()
                .is_none_or(|n| text.to_lowercase().contains(n));
            if keep {
                values.insert(text);
            }
        }
    }
    values.into_iter().collect()
}
