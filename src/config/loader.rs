use crate::config::config::{AppConfig, StorageBackend};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use std::path::{Path, PathBuf};

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序：
    /// 1. 开发环境默认值
    /// 2. ./config.yaml
    /// 3. `TRACKATLAS_` 前缀的环境变量（嵌套键以 `__` 分隔）
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::development()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TRACKATLAS_").split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.catalog.data_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::InvalidPath(
                "catalog.data_dir".to_string(),
            ));
        }

        if config.database.backend == StorageBackend::SurrealDB && config.database.url.is_empty()
        {
            return Err(ConfigValidationError::MissingDatabaseUrl);
        }

        if config.gsuite.fields.is_empty() {
            return Err(ConfigValidationError::EmptyGSuiteFields);
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("服务端口无效，必须大于 0")]
    InvalidPort,

    #[error("数据库连接 URL 未配置")]
    MissingDatabaseUrl,

    #[error("GSuite 字段表不能为空")]
    EmptyGSuiteFields,

    #[error("配置路径无效: {0}")]
    InvalidPath(String),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config_is_valid() {
        let config = AppConfig::development();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert_eq!(config.gsuite.fields.first().map(|f| f.name.as_str()), Some("uri"));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = AppConfig::development();
        config.server.port = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidPort)
        ));
    }

    #[test]
    fn test_validate_rejects_surrealdb_without_url() {
        let mut config = AppConfig::production();
        config.database.url.clear();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::load_from("does-not-exist.yaml").expect("defaults apply");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.gsuite.missing_value, ".");
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
server:
  port: 9090
catalog:
  data_dir: /srv/hubs
  metamodel_cache_ttl: 0
"#,
            )?;
            jail.set_env("TRACKATLAS_LOGGING__LEVEL", "warn");
            let config = ConfigLoader::load_from("config.yaml")?;
            assert_eq!(config.server.port, 9090);
            assert_eq!(config.catalog.data_dir, PathBuf::from("/srv/hubs"));
            assert_eq!(config.catalog.metamodel_cache_ttl, 0);
            assert_eq!(config.logging.level, "warn");
            assert_eq!(config.server.host, "0.0.0.0");
            Ok(())
        });
    }
}
