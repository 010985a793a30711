use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::category::Category;
use crate::models::content::{self, PathStep};

/// (仓库, Hub) 键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HubKey {
    /// 仓库名
    pub repository: String,
    /// Hub 名
    pub hub: String,
}

impl HubKey {
    pub fn new(repository: impl Into<String>, hub: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            hub: hub.into(),
        }
    }
}

impl fmt::Display for HubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.hub)
    }
}

/// 元数据记录
///
/// 属于某个 Hub 中的一个类别，携带任意嵌套的内容文档。对查询层只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 存储分配的标识
    pub id: String,
    /// 所属类别
    pub category: Category,
    /// 插入顺序
    pub ordinal: u64,
    /// 内容文档
    pub content: Value,
}

impl Record {
    /// 创建新记录
    pub fn new(id: impl Into<String>, category: Category, ordinal: u64, content: Value) -> Self {
        Self {
            id: id.into(),
            category,
            ordinal,
            content,
        }
    }

    /// 获取路径上所有可达的值
    pub fn values_at(&self, steps: &[PathStep]) -> Vec<&Value> {
        content::navigate(&self.content, steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hub_key_display() {
        assert_eq!(HubKey::new("Example", "Example").to_string(), "Example/Example");
    }

    #[test]
    fn test_values_at_reads_content() {
        let record = Record::new(
            "samples:0",
            Category::Samples,
            0,
            json!({"biomaterial_type": "primary cell"}),
        );
        let values = record.values_at(&[PathStep::key("biomaterial_type")]);
        assert_eq!(values, vec![&json!("primary cell")]);
    }
}
