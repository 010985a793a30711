//! GSuite 文本输出
//!
//! 每个结果行输出一个块，块内每行 `字段名\t值`，块之间以空行分隔。
//! 字段表来自配置，每个字段从 (类别, 属性路径) 取值。

use crate::config::config::{GSuiteConfig, GSuiteField};
use crate::metamodel::resolver::AttributePath;
use crate::models::category::Category;
use crate::models::content::{self, PathStep};
use crate::query::executor::{SearchResultSet, SearchRow};

struct CompiledField {
    name: String,
    category: Category,
    steps: Vec<PathStep>,
}

impl CompiledField {
    fn new(field: &GSuiteField) -> Self {
        let Ok(path) = field.path.parse::<AttributePath>();
        Self {
            name: field.name.clone(),
            category: field.category,
            steps: path.steps(),
        }
    }
}

/// GSuite 格式化器
pub struct GSuiteFormatter {
    fields: Vec<CompiledField>,
    missing_value: String,
    value_separator: String,
}

impl GSuiteFormatter {
    pub fn new(config: &GSuiteConfig) -> Self {
        Self {
            fields: config.fields.iter().map(CompiledField::new).collect(),
            missing_value: config.missing_value.clone(),
            value_separator: config.value_separator.clone(),
        }
    }

    /// 输出的字段名，按配置顺序
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn format(&self, result: &SearchResultSet) -> String {
        let mut out = String::new();
        for (i, row) in result.rows.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for field in &self.fields {
                out.push_str(&field.name);
                out.push('\t');
                out.push_str(&self.value(row, field));
                out.push('\n');
            }
        }
        out
    }

    fn value(&self, row: &SearchRow, field: &CompiledField) -> String {
        let mut values: Vec<String> = Vec::new();
        if let Some(record) = row.get(field.category) {
            for text in content::texts(&record.values_at(&field.steps)) {
                let text = sanitize(&text);
                if !text.is_empty() && !values.contains(&text) {
                    values.push(text);
                }
            }
        }
        if values.is_empty() {
            self.missing_value.clone()
        } else {
            values.join(&self.value_separator)
        }
    }
}

/// 值中的制表符和换行会破坏行格式
fn sanitize(text: &str) -> String {
    text.replace(|c: char| matches!(c, '\t' | '\r' | '\n'), " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Record;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn row(tracks: serde_json::Value, samples: Option<serde_json::Value>) -> SearchRow {
        let mut records = BTreeMap::new();
        records.insert(
            Category::Tracks,
            Record::new("tracks:0", Category::Tracks, 0, tracks),
        );
        if let Some(samples) = samples {
            records.insert(
                Category::Samples,
                Record::new("samples:0", Category::Samples, 0, samples),
            );
        }
        SearchRow { records }
    }

    fn formatter() -> GSuiteFormatter {
        GSuiteFormatter::new(&GSuiteConfig {
            fields: vec![
                GSuiteField {
                    name: "uri".into(),
                    category: Category::Tracks,
                    path: "file_url".into(),
                },
                GSuiteField {
                    name: "sample_type".into(),
                    category: Category::Samples,
                    path: "sample_type->term_value".into(),
                },
            ],
            ..Default::default()
        })
    }

    #[test]
    fn test_blocks_are_separated_by_blank_line() {
        let result = SearchResultSet {
            rows: vec![
                row(json!({"file_url": "a.bed"}), Some(json!({"sample_type": {"term_value": "x"}}))),
                row(json!({"file_url": "b.bed"}), Some(json!({"sample_type": {"term_value": "y"}}))),
            ],
        };
        assert_eq!(
            formatter().format(&result),
            "uri\ta.bed\nsample_type\tx\n\nuri\tb.bed\nsample_type\ty\n"
        );
    }

    #[test]
    fn test_missing_values_use_placeholder() {
        let result = SearchResultSet {
            rows: vec![row(json!({"file_url": null}), None)],
        };
        assert_eq!(formatter().format(&result), "uri\t.\nsample_type\t.\n");
    }

    #[test]
    fn test_multiple_values_joined_and_sanitized() {
        let result = SearchResultSet {
            rows: vec![row(
                json!({"file_url": ["a\tb", "c\nd", "a\tb"]}),
                Some(json!({"sample_type": [{"term_value": "x"}, {"term_value": "y"}]})),
            )],
        };
        assert_eq!(
            formatter().format(&result),
            "uri\ta b,c d\nsample_type\tx,y\n"
        );
    }

    #[test]
    fn test_empty_result_is_empty_text() {
        assert_eq!(formatter().format(&SearchResultSet::default()), "");
    }

    #[test]
    fn test_default_vocabulary_order() {
        let formatter = GSuiteFormatter::new(&GSuiteConfig::default());
        let names: Vec<&str> = formatter.field_names().collect();
        assert_eq!(
            names,
            vec![
                "uri",
                "title",
                "file_format",
                "track_type",
                "genome",
                "experiment_type",
                "target",
                "biomaterial_type",
                "sample_type",
                "study"
            ]
        );
    }
}
