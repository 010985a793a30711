//! 目录 DTO
//!
//! 元模型与属性浏览的查询参数。

use serde::Deserialize;

/// 元模型查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetamodelParams {
    /// 返回 类别 → 叶子属性路径 的扁平视图
    pub flat: bool,
}

/// 属性查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttributesParams {
    /// 属性路径（`a->b`），缺省为类别根
    pub path: Option<String>,
}
