//! 响应 schema 校验
//!
//! 对外输出的 JSON 文档在发出前按随包发布的 JSON Schema 校验。

use jsonschema::Validator;
use serde_json::Value;
use tracing::error;

use crate::error::{AppError, Result};

/// 搜索结果 schema
pub const SEARCH_SCHEMA: &str = include_str!("../../schemas/search.schema.json");

/// 元模型文档 schema
pub const METAMODEL_SCHEMA: &str = include_str!("../../schemas/metamodel.schema.json");

/// 编译后的 schema 校验器
pub struct SchemaValidator {
    name: &'static str,
    validator: Validator,
}

impl SchemaValidator {
    /// 从 schema 文本编译
    pub fn new(name: &'static str, schema: &str) -> Result<Self> {
        let schema: Value = serde_json::from_str(schema)
            .map_err(|e| AppError::Formatter(format!("{} schema is not JSON: {}", name, e)))?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| AppError::Formatter(format!("{} schema is invalid: {}", name, e)))?;
        Ok(Self { name, validator })
    }

    pub fn search() -> Result<Self> {
        Self::new("search", SEARCH_SCHEMA)
    }

    pub fn metamodel() -> Result<Self> {
        Self::new("metamodel", METAMODEL_SCHEMA)
    }

    /// 校验文档；失败时记录日志并返回 Formatter 错误，文档不会被发出
    pub fn validate(&self, instance: &Value) -> Result<()> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            return Ok(());
        }
        error!(
            schema = self.name,
            "Response failed schema validation: {}",
            errors.join("; ")
        );
        Err(AppError::Formatter(format!(
            "{} response does not match its schema",
            self.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundled_schemas_compile() {
        assert!(SchemaValidator::search().is_ok());
        assert!(SchemaValidator::metamodel().is_ok());
    }

    #[test]
    fn test_search_rows_validate() {
        let validator = SchemaValidator::search().unwrap();
        assert!(validator.validate(&json!([])).is_ok());
        assert!(validator
            .validate(&json!([{"tracks": {"local_id": "t1"}, "samples": {}}]))
            .is_ok());
    }

    #[test]
    fn test_invalid_rows_are_formatter_errors() {
        let validator = SchemaValidator::search().unwrap();
        for bad in [json!({}), json!([{"widgets": {}}]), json!([{"tracks": "t1"}]), json!([{}])] {
            assert!(matches!(
                validator.validate(&bad),
                Err(AppError::Formatter(_))
            ));
        }
    }

    #[test]
    fn test_malformed_schema_text() {
        assert!(matches!(
            SchemaValidator::new("broken", "{"),
            Err(AppError::Formatter(_))
        ));
    }
}
