//! 输出格式化模块
//!
//! 搜索结果可以输出为 JSON（按 schema 校验）或 GSuite 文本。

pub mod gsuite;
pub mod validator;

use serde_json::Value;

use crate::config::config::GSuiteConfig;
use crate::error::Result;
use crate::metamodel::schema::Metamodel;
use crate::query::executor::SearchResultSet;

pub use gsuite::GSuiteFormatter;
pub use validator::SchemaValidator;

/// 输出类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Json,
    GSuite,
}

impl OutputKind {
    /// 根据 Accept 头选择输出类型：`text/plain` 为 GSuite，其余为 JSON
    pub fn from_accept(accept: Option<&str>) -> Self {
        let wants_text = accept.is_some_and(|value| {
            value
                .split(',')
                .filter_map(|part| part.split(';').next())
                .any(|media| media.trim().eq_ignore_ascii_case("text/plain"))
        });
        if wants_text {
            OutputKind::GSuite
        } else {
            OutputKind::Json
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputKind::Json => "application/json",
            OutputKind::GSuite => "text/plain; charset=utf-8",
        }
    }
}

/// 输出格式化器集合
pub struct OutputFormatters {
    search_schema: SchemaValidator,
    metamodel_schema: SchemaValidator,
    gsuite: GSuiteFormatter,
}

impl OutputFormatters {
    pub fn new(gsuite: &GSuiteConfig) -> Result<Self> {
        Ok(Self {
            search_schema: SchemaValidator::search()?,
            metamodel_schema: SchemaValidator::metamodel()?,
            gsuite: GSuiteFormatter::new(gsuite),
        })
    }

    /// 格式化搜索结果
    pub fn format(&self, result: &SearchResultSet, kind: OutputKind) -> Result<Vec<u8>> {
        match kind {
            OutputKind::Json => {
                let document = result.to_json();
                self.search_schema.validate(&document)?;
                Ok(serde_json::to_vec(&document)?)
            }
            OutputKind::GSuite => Ok(self.gsuite.format(result).into_bytes()),
        }
    }

    /// 元模型文档，校验通过后返回
    pub fn metamodel(&self, metamodel: &Metamodel) -> Result<Value> {
        let document = serde_json::to_value(metamodel)?;
        self.metamodel_schema.validate(&document)?;
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::store::MetamodelStore;
    use crate::models::category::Category;
    use crate::services::catalog::fixture::*;
    use crate::services::{SearchRequest, create_search_service};
    use rstest::rstest;

    #[rstest]
    #[case(None, OutputKind::Json)]
    #[case(Some("application/json"), OutputKind::Json)]
    #[case(Some("*/*"), OutputKind::Json)]
    #[case(Some("text/plain"), OutputKind::GSuite)]
    #[case(Some("text/html, TEXT/PLAIN;q=0.9"), OutputKind::GSuite)]
    fn test_output_kind_from_accept(#[case] accept: Option<&str>, #[case] expected: OutputKind) {
        assert_eq!(OutputKind::from_accept(accept), expected);
    }

    async fn primary_cell_rows() -> SearchResultSet {
        create_search_service(metamodels(), records())
            .search(
                &example(),
                &SearchRequest::new("samples.content->'biomaterial_type' ? 'primary cell'"),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_gsuite_for_primary_cell_search() {
        let formatters = OutputFormatters::new(&GSuiteConfig::default()).unwrap();
        let bytes = formatters
            .format(&primary_cell_rows().await, OutputKind::GSuite)
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        let expected_first = [
            "uri\thttp://example.org/files/track1.bed.gz",
            "title\tCD14 H3K4me3 peaks",
            "file_format\tENCODE narrow peak format",
            "track_type\tpeaks",
            "genome\tGRCh38",
            "experiment_type\tChIP-seq",
            "target\tH3K4me3",
            "biomaterial_type\tprimary cell",
            "sample_type\tCD14-positive monocyte",
            "study\tENCODE",
        ];
        let expected_second = [
            "uri\thttp://example.org/files/track3.bed",
            "title\tTh17 CTCF peaks",
            "file_format\tBED",
            "track_type\tpeaks",
            "genome\tGRCh38",
            "experiment_type\tChIP-seq",
            "target\tCTCF",
            "biomaterial_type\tprimary cell",
            "sample_type\tT-helper 17 cell",
            "study\tBlueprint",
        ];
        let mut actual: Vec<Vec<&str>> = blocks.iter().map(|b| b.lines().collect()).collect();
        actual.sort();
        assert_eq!(actual, vec![expected_first.to_vec(), expected_second.to_vec()]);
    }

    #[tokio::test]
    async fn test_json_and_gsuite_describe_the_same_rows() {
        let formatters = OutputFormatters::new(&GSuiteConfig::default()).unwrap();
        let rows = primary_cell_rows().await;

        let json: Value =
            serde_json::from_slice(&formatters.format(&rows, OutputKind::Json).unwrap()).unwrap();
        let text =
            String::from_utf8(formatters.format(&rows, OutputKind::GSuite).unwrap()).unwrap();

        let json_uris: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["tracks"]["file_url"].as_str().unwrap())
            .collect();
        let gsuite_uris: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("uri\t"))
            .collect();
        assert_eq!(json_uris, gsuite_uris);
        assert_eq!(json_uris.len(), rows.len());
    }

    #[tokio::test]
    async fn test_metamodel_document_validates() {
        let formatters = OutputFormatters::new(&GSuiteConfig::default()).unwrap();
        let metamodel = metamodels().get_metamodel(&example()).await.unwrap();
        let document = formatters.metamodel(&metamodel).unwrap();
        assert!(document["categories"][Category::Samples.as_str()].is_object());
        assert_eq!(document["references"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_gsuite_vocabulary_is_configurable() {
        let config = GSuiteConfig {
            fields: Vec::new(),
            missing_value: "NA".into(),
            value_separator: "|".into(),
        };
        let formatters = OutputFormatters::new(&config).unwrap();
        let bytes = formatters
            .format(&SearchResultSet::default(), OutputKind::GSuite)
            .unwrap();
        assert!(bytes.is_empty());
        assert_eq!(
            formatters
                .format(&SearchResultSet::default(), OutputKind::Json)
                .unwrap(),
            b"[]"
        );
    }
}
