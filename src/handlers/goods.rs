use super::{common::PaginatedResponse, AppState};
use crate::{
    cache::{response_cache, HttpCache},
    errors::ServiceError,
    services::{
        breadcrumb::Breadcrumb,
        catalog::{KeywordSummary, SkuOrdering, SkuSummary},
        category_tree::{CategoryTree, ChannelGroup},
    },
};
use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

/// Query string accepted by the category SKU listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SkuListQuery {
    /// `create_time`, `price` or `sales`, prefixed with `-` for descending
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Full navigation menu
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "Category tree",
    description = "Channel groups with their three-level category menus. Served from cache for the configured lifetime.",
    responses(
        (status = 200, description = "Category tree keyed by channel group id", body = std::collections::BTreeMap<i32, ChannelGroup>,
            headers(("X-Cache" = String, description = "HIT or MISS"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "goods"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoryTree>, ServiceError> {
    let tree = state.services.categories.categories().await?;
    Ok(Json(tree))
}

/// Breadcrumb for a level-3 category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{category_id}",
    summary = "Category breadcrumb",
    params(("category_id" = i32, Path, description = "Level-3 category id")),
    responses(
        (status = 200, description = "Breadcrumb resolved", body = Breadcrumb),
        (status = 400, description = "Category chain is incomplete", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "goods"
)]
pub async fn get_breadcrumb(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> Result<Json<Breadcrumb>, ServiceError> {
    let breadcrumb = state.services.breadcrumbs.breadcrumb(category_id).await?;
    Ok(Json(breadcrumb))
}

/// Launched SKUs of a category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{category_id}/skus",
    summary = "List category SKUs",
    params(
        ("category_id" = i32, Path, description = "Level-3 category id"),
        SkuListQuery
    ),
    responses(
        (status = 200, description = "SKUs retrieved", body = PaginatedResponse<SkuSummary>),
        (status = 400, description = "Invalid request parameters", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "goods"
)]
pub async fn list_skus(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
    Query(query): Query<SkuListQuery>,
) -> Result<Json<PaginatedResponse<SkuSummary>>, ServiceError> {
    let ordering = SkuOrdering::parse(query.ordering.as_deref());
    let page = state
        .services
        .catalog
        .list_by_category(category_id, ordering, query.page, query.page_size)
        .await?;

    Ok(Json(PaginatedResponse::new(
        page.items,
        page.page,
        page.page_size,
        page.total,
    )))
}

/// Best sellers of a category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{category_id}/hotskus",
    summary = "Hot SKUs",
    params(("category_id" = i32, Path, description = "Level-3 category id")),
    responses(
        (status = 200, description = "Top sellers, highest sales first", body = [SkuSummary]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "goods"
)]
pub async fn hot_skus(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> Result<Json<Vec<SkuSummary>>, ServiceError> {
    let skus = state.services.catalog.top_sellers(category_id, None).await?;
    Ok(Json(skus))
}

/// Search suggestions
#[utoipa::path(
    get,
    path = "/api/v1/keywords",
    summary = "Search keywords",
    responses(
        (status = 200, description = "Keywords", body = [KeywordSummary]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "goods"
)]
pub async fn list_keywords(
    State(state): State<AppState>,
) -> Result<Json<Vec<KeywordSummary>>, ServiceError> {
    let keywords = state.services.catalog.keywords().await?;
    Ok(Json(keywords))
}

/// Catalog browsing routes; only the category tree goes through the response cache
pub fn goods_routes(cache: HttpCache) -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(list_categories).layer(from_fn_with_state(cache, response_cache)),
        )
        .route("/categories/:category_id", get(get_breadcrumb))
        .route("/categories/:category_id/skus", get(list_skus))
        .route("/categories/:category_id/hotskus", get(hot_skus))
        .route("/keywords", get(list_keywords))
}
