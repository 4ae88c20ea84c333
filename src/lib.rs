//! Storefront API Library
//!
//! Catalog browsing, category navigation, index-backed search and Alipay
//! payment confirmation for a book storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::FromRef, middleware::from_fn, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::{AuthConfig, AuthService};
use crate::cache::{middleware::CacheOptions, HttpCache};
use crate::config::AppConfig;
use crate::handlers::AppServices;
use crate::services::{alipay::PaymentProvider, search::SearchIndex};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
    pub response_cache: HttpCache,
}

impl AppState {
    /// Wires every service over one connection pool and the given external collaborators
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        search_index: Arc<dyn SearchIndex>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let services = AppServices::new(db.clone(), &config, search_index, payment_provider);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let response_cache = HttpCache::in_memory(CacheOptions::for_categories(&config.cache));

        Self {
            db,
            config,
            services,
            auth,
            response_cache,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Storefront routes mounted under `/api/v1`
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::goods::goods_routes(state.response_cache.clone()))
        .merge(handlers::search::search_routes())
        .merge(handlers::payments::payment_routes())
}

/// Full application router with request ids and HTTP tracing.
/// Deployment concerns (CORS, compression, timeouts) are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(&state))
        .nest("/health", health::health_routes())
        .merge(openapi::openapi_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(from_fn(middleware_helpers::request_id::request_id_middleware))
        .with_state(state)
}
