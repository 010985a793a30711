//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metamodel::resolver::PathError;
use crate::metamodel::schema::SchemaError;
use crate::query::QueryParseError;

/// 应用程序错误类型
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(String),

    /// 资源不存在（仓库、Hub 或类别）
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 属性路径中存在未知段
    #[error("未知属性 '{segment}' (路径: {path})")]
    UnknownAttribute { segment: String, path: String },

    /// 路径越过了叶子节点
    #[error("路径过深: '{segment}' 位于叶子节点 '{leaf}' 之后")]
    PathTooDeep { segment: String, leaf: String },

    /// 路径未指向叶子节点
    #[error("路径 '{0}' 未指向叶子属性")]
    NotALeafPath(String),

    /// 查询表达式解析失败
    #[error("查询解析失败: {0}")]
    QueryParse(String),

    /// 存储层执行失败
    #[error("查询执行失败: {0}")]
    Execution(String),

    /// 输出格式化失败（响应不符合声明的 schema）
    #[error("输出格式化失败: {0}")]
    Formatter(String),

    /// 参数验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 元模型加载错误
    #[error("元模型无效: {0}")]
    Schema(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

#[cfg(feature = "surrealdb")]
impl From<surrealdb::Error> for AppError {
    fn from(e: surrealdb::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<PathError> for AppError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::UnknownAttribute { segment, path } => {
                AppError::UnknownAttribute { segment, path }
            }
            PathError::PathTooDeep { segment, leaf } => AppError::PathTooDeep { segment, leaf },
        }
    }
}

impl From<QueryParseError> for AppError {
    fn from(e: QueryParseError) -> Self {
        AppError::QueryParse(e.to_string())
    }
}

impl From<SchemaError> for AppError {
    fn from(e: SchemaError) -> Self {
        AppError::Schema(e.to_string())
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();
        if status >= 500 {
            tracing::error!(code = %code, "{}", self);
        }
        let body = Json(ErrorResponse::new(&code, &self.to_string()));
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response()
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 详细信息
    pub details: Option<String>,
    /// 请求 ID
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
            request_id: None,
        }
    }
}

/// HTTP 状态码映射
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::NotFound(_) => (404, "NOT_FOUND".to_string()),
            AppError::UnknownAttribute { .. } => (404, "UNKNOWN_ATTRIBUTE".to_string()),
            AppError::PathTooDeep { .. } => (400, "PATH_TOO_DEEP".to_string()),
            AppError::NotALeafPath(_) => (400, "NOT_A_LEAF_PATH".to_string()),
            AppError::QueryParse(_) => (400, "QUERY_PARSE_ERROR".to_string()),
            AppError::Validation(_) => (400, "BAD_REQUEST".to_string()),
            AppError::Timeout(_) => (408, "TIMEOUT".to_string()),
            AppError::Execution(_) => (500, "EXECUTION_ERROR".to_string()),
            AppError::Database(_) => (500, "INTERNAL_ERROR".to_string()),
            AppError::Formatter(_) => (500, "FORMATTER_ERROR".to_string()),
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound("hub".into()), 404, "NOT_FOUND")]
    #[case(
        AppError::UnknownAttribute { segment: "x".into(), path: "x".into() },
        404,
        "UNKNOWN_ATTRIBUTE"
    )]
    #[case(
        AppError::PathTooDeep { segment: "a".into(), leaf: "b".into() },
        400,
        "PATH_TOO_DEEP"
    )]
    #[case(AppError::NotALeafPath("samples".into()), 400, "NOT_A_LEAF_PATH")]
    #[case(AppError::QueryParse("bad".into()), 400, "QUERY_PARSE_ERROR")]
    #[case(AppError::Execution("io".into()), 500, "EXECUTION_ERROR")]
    #[case(AppError::Formatter("schema".into()), 500, "FORMATTER_ERROR")]
    fn test_status_mapping(#[case] error: AppError, #[case] status: u16, #[case] code: &str) {
        let (actual_status, actual_code) = (&error).into();
        assert_eq!(actual_status, status);
        assert_eq!(actual_code, code);
    }

    #[test]
    fn test_path_error_conversion_keeps_segment() {
        let error: AppError = PathError::UnknownAttribute {
            segment: "bogus".into(),
            path: "sample_type->bogus".into(),
        }
        .into();
        assert!(error.to_string().contains("bogus"));
    }
}
