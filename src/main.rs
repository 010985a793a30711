use axum::ServiceExt;
use axum::extract::Request;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::{info, warn};
use trackatlas::api::{self, app_state::AppState};
use trackatlas::config::loader::ConfigLoader;
use trackatlas::metamodel::{CachedMetamodelStore, FileMetamodelLoader, MetamodelStore};
use trackatlas::observability::{
    AppMetrics, HealthCheckResult, ObservabilityState, init_tracing,
};
use trackatlas::storage::{RecordStore, StorageFactory};

/// 记录存储健康检查间隔
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;

    // guard 存活到 main 返回
    let _log_guard = init_tracing(&config.logging)?;
    info!("Starting Trackatlas ({} environment)...", config.environment);
    info!("Configuration loaded successfully");

    let metrics = Arc::new(AppMetrics::default());

    let loader = Arc::new(FileMetamodelLoader::new(config.catalog.data_dir.clone()));
    let metamodels: Arc<dyn MetamodelStore> = Arc::new(
        CachedMetamodelStore::with_ttl_secs(loader, config.catalog.metamodel_cache_ttl)
            .with_metrics(metrics.clone()),
    );
    info!(
        "Metamodel store initialized over {} (ttl: {}s)",
        config.catalog.data_dir.display(),
        config.catalog.metamodel_cache_ttl
    );

    let records = StorageFactory::create(&config).await?;
    info!("Record store initialized ({:?} backend)", config.database.backend);

    let app_state = AppState::from_stores(metamodels, records.clone(), &config.gsuite)?;
    info!("Application state created");

    // 创建可观测性状态并集成路由
    let observability_state = Arc::new(ObservabilityState::with_metrics(
        env!("CARGO_PKG_VERSION").to_string(),
        metrics,
    ));
    tokio::spawn(watch_record_store(records, observability_state.clone()));

    let router = api::create_app(app_state, observability_state, &config.server);
    let app = NormalizePathLayer::trim_trailing_slash().layer(router);
    info!("API router created with observability endpoints");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// 定期检查记录存储并更新健康状态
async fn watch_record_store(records: Arc<dyn RecordStore>, state: Arc<ObservabilityState>) {
    let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let start = Instant::now();
        let (healthy, message) = match records.health_check().await {
            Ok(true) => (true, "ok".to_string()),
            Ok(false) => (false, "record store reported unhealthy".to_string()),
            Err(e) => (false, e.to_string()),
        };
        if !healthy {
            warn!("Record store health check failed: {}", message);
        }
        state
            .add_health_check(HealthCheckResult {
                name: "record_store".to_string(),
                healthy,
                message,
                latency_ms: start.elapsed().as_millis() as u64,
            })
            .await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
