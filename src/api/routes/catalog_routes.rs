//! Catalog Routes
//!
//! 仓库、Hub、元模型、类别和属性的浏览路由。

use crate::api::handlers::catalog_handler::*;
use axum::{Router, routing::get};

use crate::api::app_state::AppState;

/// 创建目录路由器
pub fn create_catalog_router() -> Router<AppState> {
    Router::new()
        .route("/repositories", get(list_repositories))
        .route("/hubs/:repository", get(list_hubs))
        .route("/metamodel/:repository/:hub", get(get_metamodel))
        .route("/categories/:repository/:hub", get(list_categories))
        .route(
            "/attributes/:repository/:hub/:category",
            get(list_attributes),
        )
}
