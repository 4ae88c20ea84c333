use crate::{
    config::CatalogConfig,
    db::DbPool,
    entities::{
        keyword::{self, Entity as Keyword},
        sku::{self, Entity as Sku},
    },
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

/// Largest row offset any backend accepts for `OFFSET`
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Sortable SKU fields accepted by the `ordering` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Id,
    CreateTime,
    Price,
    Sales,
}

/// Parsed `ordering` parameter: a field, optionally `-`-prefixed for descending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkuOrdering {
    pub field: SortField,
    pub descending: bool,
}

impl SkuOrdering {
    /// Unknown or empty values fall back to id ascending rather than failing the request
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let field = match name {
            "create_time" => SortField::CreateTime,
            "price" => SortField::Price,
            "sales" => SortField::Sales,
            _ => return Self::default(),
        };

        Self { field, descending }
    }

    fn apply(self, query: Select<Sku>) -> Select<Sku> {
        let order = if self.descending { Order::Desc } else { Order::Asc };
        let query = match self.field {
            SortField::Id => return query.order_by(sku::Column::Id, order),
            SortField::CreateTime => query.order_by(sku::Column::CreateTime, order),
            SortField::Price => query.order_by(sku::Column::Price, order),
            SortField::Sales => query.order_by(sku::Column::Sales, order),
        };
        // Tie-break so pages stay stable
        query.order_by_asc(sku::Column::Id)
    }
}

/// Storefront projection of a SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkuSummary {
    pub id: i32,
    pub name: String,
    #[schema(value_type = String, example = "35.80")]
    pub price: Decimal,
    pub default_image_url: Option<String>,
    pub comments: i32,
    pub author: Option<String>,
}

impl From<sku::Model> for SkuSummary {
    fn from(model: sku::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            default_image_url: model.default_image_url,
            comments: model.comments,
            author: model.author,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KeywordSummary {
    pub id: i32,
    pub name: String,
}

impl From<keyword::Model> for KeywordSummary {
    fn from(model: keyword::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// One page of a category listing
#[derive(Debug, Clone)]
pub struct SkuPage {
    pub items: Vec<SkuSummary>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

/// Service for browsing launched SKUs
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    config: CatalogConfig,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, config: CatalogConfig) -> Self {
        Self { db_pool, config }
    }

    /// Clamp caller-supplied paging to the configured bounds.
    /// `page` is capped so `(page - 1) * page_size` fits a signed 64-bit OFFSET.
    pub fn page_bounds(&self, page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
        let page_size = page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);
        let last_addressable = MAX_OFFSET / page_size;
        let page = page.unwrap_or(1).clamp(1, last_addressable);
        (page, page_size)
    }

    fn launched_in(category_id: i32) -> Select<Sku> {
        Sku::find()
            .filter(sku::Column::CategoryId.eq(category_id))
            .filter(sku::Column::IsLaunched.eq(true))
    }

    /// Launched SKUs of a category in the requested order.
    /// An unknown category is an empty page, not an error.
    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category_id: i32,
        ordering: SkuOrdering,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<SkuPage, ServiceError> {
        let db = &*self.db_pool;
        let (page, page_size) = self.page_bounds(page, page_size);

        let paginator = ordering
            .apply(Self::launched_in(category_id))
            .paginate(db, page_size);

        let total = paginator.num_items().await.map_err(|e| {
            error!(category_id, error = %e, "Failed to count SKUs for category");
            ServiceError::DatabaseError(e)
        })?;

        let items = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(category_id, page, error = %e, "Failed to fetch SKU page");
            ServiceError::DatabaseError(e)
        })?;

        debug!(category_id, page, total, "Listed category SKUs");
        Ok(SkuPage {
            items: items.into_iter().map(SkuSummary::from).collect(),
            page,
            page_size,
            total,
        })
    }

    /// Best sellers of a category, highest sales first, capped at `hot_skus_limit`
    #[instrument(skip(self))]
    pub async fn top_sellers(
        &self,
        category_id: i32,
        limit: Option<u64>,
    ) -> Result<Vec<SkuSummary>, ServiceError> {
        let db = &*self.db_pool;
        let limit = limit
            .unwrap_or(self.config.hot_skus_limit)
            .min(self.config.hot_skus_limit);

        let skus = Self::launched_in(category_id)
            .order_by_desc(sku::Column::Sales)
            .order_by_asc(sku::Column::Id)
            .limit(limit)
            .all(db)
            .await
            .map_err(|e| {
                error!(category_id, error = %e, "Failed to fetch hot SKUs");
                ServiceError::DatabaseError(e)
            })?;

        Ok(skus.into_iter().map(SkuSummary::from).collect())
    }

    /// Search suggestions
    #[instrument(skip(self))]
    pub async fn keywords(&self) -> Result<Vec<KeywordSummary>, ServiceError> {
        let db = &*self.db_pool;

        let keywords = Keyword::find()
            .order_by_asc(keyword::Column::Id)
            .limit(self.config.keywords_limit)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch keywords");
                ServiceError::DatabaseError(e)
            })?;

        Ok(keywords.into_iter().map(KeywordSummary::from).collect())
    }
}
