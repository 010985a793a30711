use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::category::Category;

/// 存储后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 从数据目录加载到内存
    #[default]
    Memory,
    /// SurrealDB 远程存储
    SurrealDB,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 存储后端
    pub backend: StorageBackend,
    /// SurrealDB 连接地址
    pub url: String,
    /// 命名空间
    pub namespace: String,
    /// 数据库名称
    pub database: String,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 连接超时（秒）
    pub connection_timeout: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 请求超时（秒）
    pub request_timeout: u64,
}

/// 目录配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    /// 数据目录，布局为 `<repository>/<hub>/metamodel.schema.json`
    pub data_dir: PathBuf,
    /// 元模型缓存有效期（秒），0 表示永不过期
    pub metamodel_cache_ttl: u64,
}

/// GSuite 输出中的一列
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GSuiteField {
    /// 输出的字段名
    pub name: String,
    /// 值所在的类别
    pub category: Category,
    /// 类别内容中的属性路径（`a->b`）
    pub path: String,
}

impl GSuiteField {
    fn new(name: &str, category: Category, path: &str) -> Self {
        Self {
            name: name.into(),
            category,
            path: path.into(),
        }
    }
}

/// GSuite 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GSuiteConfig {
    /// 有序字段表
    pub fields: Vec<GSuiteField>,
    /// 缺失值的占位符
    pub missing_value: String,
    /// 多值连接符
    pub value_separator: String,
}

impl Default for GSuiteConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                GSuiteField::new("uri", Category::Tracks, "file_url"),
                GSuiteField::new("title", Category::Tracks, "label_short"),
                GSuiteField::new("file_format", Category::Tracks, "file_format->term_value"),
                GSuiteField::new("track_type", Category::Tracks, "type_of_condensed_data"),
                GSuiteField::new("genome", Category::Tracks, "genome_assembly"),
                GSuiteField::new(
                    "experiment_type",
                    Category::Experiments,
                    "technique->term_value",
                ),
                GSuiteField::new("target", Category::Experiments, "target->target_details"),
                GSuiteField::new("biomaterial_type", Category::Samples, "biomaterial_type"),
                GSuiteField::new("sample_type", Category::Samples, "sample_type->term_value"),
                GSuiteField::new("study", Category::Studies, "study_name"),
            ],
            missing_value: ".".into(),
            value_separator: ",".into(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（EnvFilter 语法）
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 服务器配置
    pub server: ServerConfig,
    /// 目录配置
    pub catalog: CatalogConfig,
    /// GSuite 输出配置
    pub gsuite: GSuiteConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: "ws://localhost:8000".into(),
                namespace: "trackatlas".into(),
                database: "catalog".into(),
                username: "root".into(),
                password: "root".into(),
                connection_timeout: 30,
            },
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
                request_timeout: 30,
            },
            catalog: CatalogConfig {
                data_dir: PathBuf::from("./data"),
                metamodel_cache_ttl: 300,
            },
            gsuite: GSuiteConfig::default(),
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
            },
            app_name: "trackatlas".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.database.backend = StorageBackend::SurrealDB;
        config.catalog.metamodel_cache_ttl = 3600;
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config
    }
}
