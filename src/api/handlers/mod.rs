//! Handlers 模块
//!
//! 处理 HTTP 请求。

pub mod catalog_handler;
pub mod search_handler;
pub mod values_handler;
