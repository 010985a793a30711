//! 配置管理模块
//!
//! 提供应用程序配置加载和管理功能，支持 YAML 配置文件和环境变量覆盖。

#[allow(clippy::module_inception)]
pub mod config;
pub mod loader;
