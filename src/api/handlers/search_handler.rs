use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::search_dto::*},
    error::Result,
    format::OutputKind,
    models::record::HubKey,
    services::SearchRequest,
};

pub async fn search(
    State(state): State<AppState>,
    Path((repository, hub)): Path<(String, String)>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let key = HubKey::new(repository, hub);
    let kind = OutputKind::from_accept(
        headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok()),
    );
    let request = SearchRequest::new(params.query.clone().unwrap_or_default())
        .with_categories(params.projection()?)
        .with_limit(params.limit.unwrap_or(0));
    debug!(
        "Search on {}: query: {}, output: {:?}",
        key, request.query, kind
    );

    let start_time = std::time::Instant::now();
    let result = state.search_service.search(&key, &request).await?;
    let body = state.formatters.format(&result, kind)?;
    debug!(
        "Search on {} returned {} rows in {} ms",
        key,
        result.len(),
        start_time.elapsed().as_millis()
    );

    Ok(([(header::CONTENT_TYPE, kind.content_type())], body))
}
