use super::{common::PaginatedResponse, AppState};
use crate::{errors::ServiceError, services::search::SearchResult};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Free text matched by the search index
    pub text: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Index-backed SKU search
#[utoipa::path(
    get,
    path = "/api/v1/skus/search",
    summary = "Search SKUs",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching launched SKUs in relevance order", body = PaginatedResponse<SearchResult>),
        (status = 400, description = "Missing search text", body = crate::errors::ErrorResponse),
        (status = 502, description = "Search index unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "search"
)]
pub async fn search_skus(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PaginatedResponse<SearchResult>>, ServiceError> {
    let (page, page_size) = state
        .services
        .catalog
        .page_bounds(query.page, query.page_size);

    let results = state
        .services
        .search
        .search(query.text.as_deref().unwrap_or_default(), page, page_size)
        .await?;

    Ok(Json(PaginatedResponse::new(
        results.items,
        results.page,
        results.page_size,
        results.total,
    )))
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/skus/search", get(search_skus))
}
