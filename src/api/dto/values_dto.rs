//! 取值 DTO

use serde::Deserialize;

/// 取值查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValuesParams {
    /// 属性路径，必填
    pub path: Option<String>,
    /// 不区分大小写的子串过滤
    pub filter: Option<String>,
    /// 只统计该搜索结果中的记录
    pub query: Option<String>,
}
