//! API 模块
//!
//! 提供 REST API 支持。

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use crate::api::app_state::AppState;
use crate::config::config::ServerConfig;
use crate::observability::{ObservabilityState, create_observability_router, metrics_middleware};
use axum::{Router, http::Method};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// `/api/v1` 下的全部路由
pub fn create_router(app_state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::catalog_routes::create_catalog_router())
        .merge(routes::values_routes::create_values_router())
        .merge(routes::search_routes::create_search_router());

    Router::new().nest("/api/v1", api).with_state(app_state)
}

/// 完整应用：API、可观测性端点以及通用中间件
pub fn create_app(
    app_state: AppState,
    observability: Arc<ObservabilityState>,
    server: &ServerConfig,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    create_observability_router(observability.clone())
        .merge(create_router(app_state))
        .layer(axum::middleware::from_fn_with_state(
            observability,
            metrics_middleware,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout.max(1),
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
