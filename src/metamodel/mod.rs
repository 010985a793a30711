//! 元模型模块
//!
//! 每个 (仓库, Hub) 一份元模型，按类别组织属性树。包括 schema 编译、
//! 属性路径解析、文件加载和带 TTL 的缓存。

pub mod loader;
pub mod resolver;
pub mod schema;
pub mod store;

pub use loader::{FileMetamodelLoader, MetamodelLoader};
pub use resolver::{AttributePath, PathError, Resolved, resolve};
pub use schema::{Metamodel, Reference, SchemaError, SchemaNode, ValueType};
pub use store::{CachedMetamodelStore, MetamodelStore};
