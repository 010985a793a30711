//! 存储层模块
//!
//! 记录存储的抽象及其实现：数据目录加载的内存存储和 SurrealDB。

pub mod factory;
pub mod memory;
pub mod repository;

#[cfg(feature = "surrealdb")]
pub mod surrealdb;

pub use factory::StorageFactory;
pub use memory::MemoryRecordStore;
pub use repository::RecordStore;
