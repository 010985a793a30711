//! 搜索 DTO
//!
//! 定义搜索请求的查询参数。

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::category::Category;

/// 搜索查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// 查询表达式
    pub query: Option<String>,
    /// 逗号分隔的投影类别
    pub categories: Option<String>,
    /// 最大行数，0 表示不限
    pub limit: Option<usize>,
}

impl SearchParams {
    /// 解析投影类别；未知类别返回 NotFound
    pub fn projection(&self) -> Result<Vec<Category>> {
        let Some(raw) = self.categories.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                name.parse::<Category>()
                    .map_err(|e| AppError::NotFound(e.to_string()))
            })
            .collect()
    }
}
