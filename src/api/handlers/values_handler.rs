use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::values_dto::*, handlers::catalog_handler::parse_category},
    error::{AppError, Result},
    metamodel::resolver::AttributePath,
    models::record::HubKey,
    services::ValuesRequest,
};

pub async fn list_values(
    State(state): State<AppState>,
    Path((repository, hub, category)): Path<(String, String, String)>,
    Query(params): Query<ValuesParams>,
) -> Result<impl IntoResponse> {
    let key = HubKey::new(repository, hub);
    let category = parse_category(&category)?;
    let raw_path = params
        .path
        .ok_or_else(|| AppError::Validation("Parameter 'path' is required".to_string()))?;
    let Ok(path) = raw_path.parse::<AttributePath>();
    debug!(
        "Listing values of {} {} at '{}' (filter: {:?}, query: {:?})",
        key, category, path, params.filter, params.query
    );

    let request = ValuesRequest {
        path,
        filter: params.filter,
        query: params.query,
    };
    Ok(Json(
        state
            .values_service
            .values(&key, category, &request)
            .await?,
    ))
}
