pub mod common;
pub mod goods;
pub mod payments;
pub mod search;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        alipay::PaymentProvider, breadcrumb::BreadcrumbService, catalog::CatalogService,
        category_tree::CategoryTreeService, payments::PaymentService,
        search::{SearchIndex, SearchService},
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub categories: Arc<CategoryTreeService>,
    pub breadcrumbs: Arc<BreadcrumbService>,
    pub search: Arc<SearchService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        search_index: Arc<dyn SearchIndex>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone(), config.catalog.clone())),
            categories: Arc::new(CategoryTreeService::new(db_pool.clone())),
            breadcrumbs: Arc::new(BreadcrumbService::new(db_pool.clone())),
            search: Arc::new(SearchService::new(db_pool.clone(), search_index)),
            payments: Arc::new(PaymentService::new(db_pool, payment_provider)),
        }
    }
}
