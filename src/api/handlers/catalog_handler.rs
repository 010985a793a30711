use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::Value;
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::catalog_dto::*},
    error::{AppError, Result},
    metamodel::resolver::AttributePath,
    models::{category::Category, record::HubKey},
};

/// 解析路径中的类别名；未知类别按资源不存在处理
pub(crate) fn parse_category(name: &str) -> Result<Category> {
    name.parse::<Category>()
        .map_err(|e| AppError::NotFound(e.to_string()))
}

pub async fn list_repositories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    debug!("Listing repositories");
    Ok(Json(state.catalog_service.repositories().await?))
}

pub async fn list_hubs(
    State(state): State<AppState>,
    Path(repository): Path<String>,
) -> Result<impl IntoResponse> {
    debug!("Listing hubs of repository: {}", repository);
    Ok(Json(state.catalog_service.hubs(&repository).await?))
}

pub async fn get_metamodel(
    State(state): State<AppState>,
    Path((repository, hub)): Path<(String, String)>,
    Query(params): Query<MetamodelParams>,
) -> Result<impl IntoResponse> {
    let key = HubKey::new(repository, hub);
    debug!("Getting metamodel of {} (flat: {})", key, params.flat);

    let metamodel = state.catalog_service.metamodel(&key).await?;
    let document: Value = if params.flat {
        serde_json::to_value(metamodel.flat())?
    } else {
        state.formatters.metamodel(&metamodel)?
    };
    Ok(Json(document))
}

pub async fn list_categories(
    State(state): State<AppState>,
    Path((repository, hub)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let key = HubKey::new(repository, hub);
    debug!("Listing categories of {}", key);
    Ok(Json(state.catalog_service.categories(&key).await?))
}

pub async fn list_attributes(
    State(state): State<AppState>,
    Path((repository, hub, category)): Path<(String, String, String)>,
    Query(params): Query<AttributesParams>,
) -> Result<impl IntoResponse> {
    let key = HubKey::new(repository, hub);
    let category = parse_category(&category)?;
    let Ok(path) = params.path.unwrap_or_default().parse::<AttributePath>();
    debug!("Listing attributes of {} {} at '{}'", key, category, path);

    Ok(Json(
        state
            .catalog_service
            .attributes(&key, category, &path)
            .await?,
    ))
}
