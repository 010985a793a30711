//! 可观测性模块
//!
//! 提供 Prometheus 指标、结构化日志和健康检查。

use axum::{
    Json, Router,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::config::LoggingConfig;
use crate::error::{AppError, Result};

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "trackatlas.log";

// ===== Simple Metrics =====

/// 请求的端点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// 仓库、Hub、元模型、类别、属性
    Catalog,
    Values,
    Search,
    Other,
}

impl EndpointKind {
    /// 按请求路径归类
    pub fn from_path(path: &str) -> Self {
        let Some(rest) = path.strip_prefix("/api/v1/") else {
            return EndpointKind::Other;
        };
        match rest.split('/').next() {
            Some("search") => EndpointKind::Search,
            Some("values") => EndpointKind::Values,
            Some("repositories" | "hubs" | "metamodel" | "categories" | "attributes") => {
                EndpointKind::Catalog
            }
            _ => EndpointKind::Other,
        }
    }
}

/// 简单应用指标
#[derive(Clone, Default)]
pub struct AppMetrics {
    pub http_requests_total: Arc<AtomicU64>,
    pub http_request_duration_sum: Arc<AtomicU64>,
    pub active_connections: Arc<AtomicUsize>,
    pub catalog_requests_total: Arc<AtomicU64>,
    pub values_requests_total: Arc<AtomicU64>,
    pub search_requests_total: Arc<AtomicU64>,
    pub search_latency_sum: Arc<AtomicU64>,
    pub metamodel_cache_hits: Arc<AtomicU64>,
    pub metamodel_cache_misses: Arc<AtomicU64>,
    pub metamodel_loads: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
}

impl AppMetrics {
    /// 记录 HTTP 请求
    pub fn record_http_request(&self, kind: EndpointKind, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::SeqCst);
        self.http_request_duration_sum
            .fetch_add(duration_ms, Ordering::SeqCst);
        match kind {
            EndpointKind::Catalog => {
                self.catalog_requests_total.fetch_add(1, Ordering::SeqCst);
            }
            EndpointKind::Values => {
                self.values_requests_total.fetch_add(1, Ordering::SeqCst);
            }
            EndpointKind::Search => {
                self.search_requests_total.fetch_add(1, Ordering::SeqCst);
                self.search_latency_sum
                    .fetch_add(duration_ms, Ordering::SeqCst);
            }
            EndpointKind::Other => {}
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    /// 元模型缓存命中
    pub fn record_cache_hit(&self) {
        self.metamodel_cache_hits.fetch_add(1, Ordering::SeqCst);
    }

    /// 元模型缓存未命中
    pub fn record_cache_miss(&self) {
        self.metamodel_cache_misses.fetch_add(1, Ordering::SeqCst);
    }

    /// 实际执行了一次元模型加载
    pub fn record_cache_load(&self) {
        self.metamodel_loads.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录错误
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self) -> String {
        format!(
            r#"# HELP http_requests_total Total HTTP requests
# TYPE http_requests_total counter
http_requests_total {}
# HELP http_request_duration_seconds HTTP request duration in seconds
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_sum {}
http_request_duration_seconds_count {}
# HELP active_connections Active HTTP connections
# TYPE active_connections gauge
active_connections {}
# HELP api_requests_total API requests by endpoint kind
# TYPE api_requests_total counter
api_requests_total{{endpoint="catalog"}} {}
api_requests_total{{endpoint="values"}} {}
api_requests_total{{endpoint="search"}} {}
# HELP search_latency_seconds Search request latency in seconds
# TYPE search_latency_seconds histogram
search_latency_seconds_sum {}
search_latency_seconds_count {}
# HELP metamodel_cache_hits_total Metamodel cache hits
# TYPE metamodel_cache_hits_total counter
metamodel_cache_hits_total {}
# HELP metamodel_cache_misses_total Metamodel cache misses
# TYPE metamodel_cache_misses_total counter
metamodel_cache_misses_total {}
# HELP metamodel_loads_total Metamodel loads from the source
# TYPE metamodel_loads_total counter
metamodel_loads_total {}
# HELP errors_total Total errors
# TYPE errors_total counter
errors_total {}
"#,
            self.http_requests_total.load(Ordering::SeqCst),
            self.http_request_duration_sum.load(Ordering::SeqCst) as f64 / 1000.0,
            self.http_requests_total.load(Ordering::SeqCst),
            self.active_connections.load(Ordering::SeqCst),
            self.catalog_requests_total.load(Ordering::SeqCst),
            self.values_requests_total.load(Ordering::SeqCst),
            self.search_requests_total.load(Ordering::SeqCst),
            self.search_latency_sum.load(Ordering::SeqCst) as f64 / 1000.0,
            self.search_requests_total.load(Ordering::SeqCst),
            self.metamodel_cache_hits.load(Ordering::SeqCst),
            self.metamodel_cache_misses.load(Ordering::SeqCst),
            self.metamodel_loads.load(Ordering::SeqCst),
            self.errors_total.load(Ordering::SeqCst),
        )
    }
}

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<HealthCheck>,
}

/// 单个健康检查项
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
    pub latency_ms: Option<u64>,
}

/// 健康检查结果
#[derive(Clone)]
pub struct HealthCheckResult {
    pub name: String,
    pub healthy: bool,
    pub message: String,
    pub latency_ms: u64,
}

/// 应用状态（用于健康检查）
#[derive(Clone)]
pub struct ObservabilityState {
    pub metrics: Arc<AppMetrics>,
    pub health_checks: Arc<Mutex<Vec<HealthCheckResult>>>,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(version: String) -> Self {
        Self::with_metrics(version, Arc::new(AppMetrics::default()))
    }

    /// 与元模型缓存共享同一组指标
    pub fn with_metrics(version: String, metrics: Arc<AppMetrics>) -> Self {
        Self {
            metrics,
            health_checks: Arc::new(Mutex::new(Vec::new())),
            start_time: Utc::now(),
            version,
        }
    }

    /// 添加健康检查结果，同名检查只保留最新一次
    pub async fn add_health_check(&self, result: HealthCheckResult) {
        let mut checks = self.health_checks.lock().await;
        checks.retain(|c| c.name != result.name);
        checks.push(result);
        if checks.len() > 10 {
            checks.remove(0);
        }
    }

    /// 获取应用正常运行时间
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_seconds() as f64
    }
}

// ===== Health Check Handlers =====

/// 获取完整健康状态
pub async fn health_check(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = state.health_checks.lock().await;
    let all_healthy = checks.iter().all(|c| c.healthy);

    let health_status = HealthStatus {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        checks: checks
            .iter()
            .map(|c| HealthCheck {
                name: c.name.clone(),
                status: if c.healthy {
                    "healthy".to_string()
                } else {
                    "unhealthy".to_string()
                },
                message: Some(c.message.clone()),
                latency_ms: Some(c.latency_ms),
            })
            .collect(),
    };

    let status_code = if all_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_status))
}

/// 简单存活检查
pub async fn liveness() -> impl IntoResponse {
    "OK"
}

/// 就绪检查（检查记录存储）
pub async fn readiness(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = state.health_checks.lock().await;
    let all_healthy = checks.iter().all(|c| c.healthy);

    if all_healthy {
        (axum::http::StatusCode::OK, "Ready")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let output = state.metrics.gather();
    (axum::http::StatusCode::OK, output)
}

/// 版本信息端点
pub async fn version(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": state.version,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 创建可观测性路由
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .with_state(state)
}

// ===== Structured Logging =====

/// 初始化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了日志目录时按天滚动写文件，
/// 返回的 guard 必须存活到进程退出，否则缓冲中的日志会丢失。
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Config(format!("invalid log level '{}': {}", config.level, e)))?;

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(writer);

    let installed = if config.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| AppError::Config(format!("failed to set tracing subscriber: {}", e)))?;

    Ok(guard)
}

// ===== Request Metrics Middleware =====

/// 记录请求指标的中间件
pub async fn metrics_middleware(
    State(state): State<Arc<ObservabilityState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = std::time::Instant::now();
    let kind = EndpointKind::from_path(req.uri().path());

    state.metrics.connection_opened();

    let response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    state.metrics.record_http_request(kind, duration_ms);
    if response.status().is_server_error() {
        state.metrics.record_error();
    }
    state.metrics.connection_closed();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_metrics_gather() {
        let metrics = AppMetrics::default();
        metrics.record_http_request(EndpointKind::Search, 100);
        metrics.record_http_request(EndpointKind::Catalog, 5);
        metrics.connection_opened();
        metrics.record_cache_hit();
        metrics.record_error();

        let output = metrics.gather();
        assert!(output.contains("http_requests_total 2"));
        assert!(output.contains("active_connections 1"));
        assert!(output.contains("api_requests_total{endpoint=\"search\"} 1"));
        assert!(output.contains("api_requests_total{endpoint=\"catalog\"} 1"));
        assert!(output.contains("api_requests_total{endpoint=\"values\"} 0"));
        assert!(output.contains("search_latency_seconds_sum 0.1"));
        assert!(output.contains("metamodel_cache_hits_total 1"));
        assert!(output.contains("errors_total 1"));
    }

    #[rstest]
    #[case("/api/v1/search/Example/Example", EndpointKind::Search)]
    #[case("/api/v1/values/Example/Example/samples", EndpointKind::Values)]
    #[case("/api/v1/repositories", EndpointKind::Catalog)]
    #[case("/api/v1/attributes/Example/Example/tracks", EndpointKind::Catalog)]
    #[case("/api/v1/unknown", EndpointKind::Other)]
    #[case("/health", EndpointKind::Other)]
    fn test_endpoint_kind_from_path(#[case] path: &str, #[case] expected: EndpointKind) {
        assert_eq!(EndpointKind::from_path(path), expected);
    }

    #[tokio::test]
    async fn test_health_checks_keep_latest_per_name() {
        let state = ObservabilityState::new("0.1.0".into());
        for healthy in [false, true] {
            state
                .add_health_check(HealthCheckResult {
                    name: "record_store".into(),
                    healthy,
                    message: String::new(),
                    latency_ms: 1,
                })
                .await;
        }
        let checks = state.health_checks.lock().await;
        assert_eq!(checks.len(), 1);
        assert!(checks[0].healthy);
    }

    #[test]
    fn test_invalid_log_level_is_config_error() {
        let config = LoggingConfig {
            level: "trackatlas=loud".into(),
            structured: false,
            log_dir: None,
        };
        // RUST_LOG 存在时会覆盖配置，此时跳过
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(matches!(init_tracing(&config), Err(AppError::Config(_))));
    }
}
