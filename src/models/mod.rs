//! 数据模型模块

pub mod category;
pub mod content;
pub mod record;

pub use category::Category;
pub use content::PathStep;
pub use record::{HubKey, Record};
