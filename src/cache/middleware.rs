use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CacheBackend, CacheError, InMemoryCache};
use crate::config::CacheConfig;

/// Header reporting whether a response came from the cache
pub const CACHE_STATUS_HEADER: &str = "x-cache";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timestamp: i64,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Vec<u8>) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        Self {
            status: status.as_u16(),
            headers,
            body,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let headers = response.headers_mut();
        for (key, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        response
    }
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_body_size: usize,
    pub max_entries: u64,
}

impl CacheOptions {
    /// Options for the category tree response
    pub fn for_categories(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_secs(config.categories_ttl_secs),
            max_body_size: config.max_body_size,
            max_entries: config.max_entries,
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::for_categories(&CacheConfig::default())
    }
}

/// Whole-response cache keyed on method, path and query
#[derive(Clone)]
pub struct HttpCache {
    cache: Arc<dyn CacheBackend>,
    options: CacheOptions,
}

impl HttpCache {
    pub fn new(cache: Arc<dyn CacheBackend>, options: CacheOptions) -> Self {
        Self { cache, options }
    }

    pub fn in_memory(options: CacheOptions) -> Self {
        let backend = InMemoryCache::with_capacity(options.max_entries);
        Self::new(Arc::new(backend), options)
    }

    fn generate_cache_key(&self, request: &Request<Body>) -> String {
        let mut key_parts = vec![
            request.method().to_string(),
            request.uri().path().to_string(),
        ];

        if let Some(query) = request.uri().query() {
            key_parts.push(query.to_string());
        }

        format!("http_cache:{}", key_parts.join(":"))
    }

    fn should_cache_request(&self, request: &Request<Body>) -> bool {
        self.options.enabled && request.method() == Method::GET
    }

    fn should_cache_response(&self, response: &Response) -> bool {
        if !response.status().is_success() {
            return false;
        }

        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(|value| !(value.contains("no-cache") || value.contains("no-store")))
            .unwrap_or(true)
    }

    pub async fn get_cached_response(&self, cache_key: &str) -> Option<CachedResponse> {
        match self.cache.get(cache_key).await {
            Ok(Some(cached_data)) => match serde_json::from_str::<CachedResponse>(&cached_data) {
                Ok(cached_response) => {
                    debug!("Cache hit for key: {}", cache_key);
                    Some(cached_response)
                }
                Err(e) => {
                    warn!("Failed to deserialize cached response: {}", e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache miss for key: {}", cache_key);
                None
            }
            Err(e) => {
                warn!("Cache error: {}", e);
                None
            }
        }
    }

    pub async fn store_response(
        &self,
        cache_key: &str,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), CacheError> {
        if body.len() > self.options.max_body_size {
            debug!("Response body too large to cache: {} bytes", body.len());
            return Ok(());
        }

        let cached_response = CachedResponse::new(status, headers, body.to_vec());
        let serialized = serde_json::to_string(&cached_response)?;

        self.cache
            .set(cache_key, &serialized, Some(self.options.ttl))
            .await?;
        debug!("Stored response in cache with key: {}", cache_key);

        Ok(())
    }
}

fn mark(mut response: Response, status: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    response
}

/// Serves repeat GETs from the cache until the entry expires
pub async fn response_cache(
    State(cache): State<HttpCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.should_cache_request(&request) {
        return next.run(request).await;
    }

    let cache_key = cache.generate_cache_key(&request);
    if let Some(cached) = cache.get_cached_response(&cache_key).await {
        return mark(cached.into_response(), "HIT");
    }

    let response = next.run(request).await;
    if !cache.should_cache_response(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to buffer response body for caching: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(e) = cache
        .store_response(&cache_key, parts.status, &parts.headers, &bytes)
        .await
    {
        warn!("Failed to store response in cache: {}", e);
    }

    mark(Response::from_parts(parts, Body::from(bytes)), "MISS")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn_with_state, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    // Same per-method layering as the category tree route
    fn counting_router(cache: HttpCache, hits: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            "/categories",
            get(move || {
                let hits = hits.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    format!("tree-{}", n)
                }
            })
            .layer(from_fn_with_state(cache, response_cache)),
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counting_router(HttpCache::in_memory(CacheOptions::default()), hits.clone());

        let first = app
            .clone()
            .oneshot(Request::get("/categories").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.headers()[CACHE_STATUS_HEADER], "MISS");
        assert_eq!(body_string(first).await, "tree-0");

        let second = app
            .oneshot(Request::get("/categories").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.headers()[CACHE_STATUS_HEADER], "HIT");
        assert_eq!(body_string(second).await, "tree-0");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_cache_passes_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let options = CacheOptions {
            enabled: false,
            ..CacheOptions::default()
        };
        let app = counting_router(HttpCache::in_memory(options), hits.clone());

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::get("/categories").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert!(response.headers().get(CACHE_STATUS_HEADER).is_none());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn query_variants_cannot_grow_the_cache_without_bound() {
        let backend = InMemoryCache::with_capacity(20);
        let options = CacheOptions {
            max_entries: 20,
            ..CacheOptions::default()
        };
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counting_router(HttpCache::new(Arc::new(backend.clone()), options), hits);

        for i in 0..300 {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/categories?r={i}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert!(backend.len().await <= 20);
    }

    #[test]
    fn no_store_responses_are_not_cached() {
        let cache = HttpCache::in_memory(CacheOptions::default());
        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        assert!(!cache.should_cache_response(&response));

        *response.status_mut() = StatusCode::BAD_REQUEST;
        response.headers_mut().remove(header::CACHE_CONTROL);
        assert!(!cache.should_cache_response(&response));
    }
}
