//! 服务模块

pub mod catalog;
pub mod search;
pub mod values;

pub use catalog::{CatalogService, create_catalog_service};
pub use search::{SearchRequest, SearchService, create_search_service};
pub use values::{ValuesRequest, ValuesService, create_values_service};
