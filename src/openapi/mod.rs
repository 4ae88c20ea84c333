use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Catalog browsing, category navigation, product search and Alipay payment confirmation.

## Authentication

Payment endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors share one body shape:

```json
{
  "error": "Bad Request",
  "message": "分类不存在",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `page_size` (default 20, max 100).
"#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development")
    ),
    tags(
        (name = "goods", description = "Categories, SKUs and keywords"),
        (name = "search", description = "Index-backed SKU search"),
        (name = "payments", description = "Alipay payment link and confirmation")
    ),
    paths(
        crate::handlers::goods::list_categories,
        crate::handlers::goods::get_breadcrumb,
        crate::handlers::goods::list_skus,
        crate::handlers::goods::hot_skus,
        crate::handlers::goods::list_keywords,
        crate::handlers::search::search_skus,
        crate::handlers::payments::payment_url,
        crate::handlers::payments::payment_status,
    ),
    components(
        schemas(
            crate::handlers::common::PaginationMeta,
            crate::services::catalog::SkuSummary,
            crate::services::catalog::KeywordSummary,
            crate::services::category_tree::ChannelGroup,
            crate::services::breadcrumb::Breadcrumb,
            crate::services::search::SearchResult,
            crate::handlers::payments::PaymentUrlResponse,
            crate::handlers::payments::PaymentStatusResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/categories/{category_id}/skus"));
        assert!(json.contains("/api/v1/payment/status"));
        assert!(json.contains("Bearer"));
    }
}
