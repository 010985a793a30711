use crate::api::handlers::values_handler::*;
use axum::{Router, routing::get};

use crate::api::app_state::AppState;

/// 创建取值路由器
pub fn create_values_router() -> Router<AppState> {
    Router::new().route("/values/:repository/:hub/:category", get(list_values))
}
