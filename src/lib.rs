//! Trackatlas - 基因组轨道元数据目录服务
//!
//! 按仓库和 Hub 组织轨道元数据，提供元模型浏览、属性取值和跨类别的
//! 内容搜索，搜索结果可输出为 JSON 或 GSuite 文本。

pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod metamodel;
pub mod models;
pub mod observability;
pub mod query;
pub mod services;
pub mod storage;
