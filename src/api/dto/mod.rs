//! DTO 模块
//!
//! 定义 API 请求参数的数据结构。

pub mod catalog_dto;
pub mod search_dto;
pub mod values_dto;
