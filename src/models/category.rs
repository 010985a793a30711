use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 记录类别
///
/// 每个 Hub 的元模型都以这五个固定类别为根。声明顺序即规范顺序，
/// 排序、搜索连接和输出都依赖它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Tracks,
    Experiments,
    Samples,
    Studies,
    NonStandardSamples,
}

impl Category {
    /// 全部类别，按规范顺序
    pub const ALL: [Category; 5] = [
        Category::Tracks,
        Category::Experiments,
        Category::Samples,
        Category::Studies,
        Category::NonStandardSamples,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tracks => "tracks",
            Category::Experiments => "experiments",
            Category::Samples => "samples",
            Category::Studies => "studies",
            Category::NonStandardSamples => "non_standard_samples",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知类别名
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
