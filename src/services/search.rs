use crate::{
    config::SearchConfig,
    db::DbPool,
    entities::sku::{self, Entity as Sku},
    errors::ServiceError,
    services::catalog::SkuSummary,
};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use utoipa::ToSchema;

/// Deepest `from + size` an Elasticsearch index serves by default
pub const MAX_RESULT_WINDOW: u64 = 10_000;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search index transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Search index returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected search index response: {0}")]
    Decode(String),
}

impl From<SearchError> for ServiceError {
    fn from(err: SearchError) -> Self {
        ServiceError::ExternalServiceError(err.to_string())
    }
}

/// Document pushed into the index for each SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuDocument {
    pub id: i32,
    /// Full-text field the index matches against
    pub text: String,
    pub name: String,
    pub category_id: i32,
}

impl SkuDocument {
    pub fn index_text(model: &sku::Model) -> String {
        [Some(model.name.as_str()), model.caption.as_deref(), model.author.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<&sku::Model> for SkuDocument {
    fn from(model: &sku::Model) -> Self {
        Self {
            id: model.id,
            text: Self::index_text(model),
            name: model.name.clone(),
            category_id: model.category_id,
        }
    }
}

/// Ids matched by the index, best match first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub total: u64,
    pub ids: Vec<i32>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, text: &str, offset: u64, limit: u64) -> Result<SearchHits, SearchError>;
    async fn index_documents(&self, documents: &[SkuDocument]) -> Result<usize, SearchError>;
}

/// Elasticsearch-compatible HTTP index
#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticsearchIndex {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_hits(body: &Value) -> Result<SearchHits, SearchError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| SearchError::Decode("missing hits".into()))?;

    // ES 7+ reports {"value": n}, older versions a bare number
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(obj) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        None => 0,
    };

    let ids = hits
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Decode("missing hits.hits".into()))?
        .iter()
        .filter_map(|hit| {
            hit.get("_id")
                .and_then(Value::as_str)
                .and_then(|id| id.parse::<i32>().ok())
                .or_else(|| {
                    hit.pointer("/_source/id")
                        .and_then(Value::as_i64)
                        .and_then(|id| i32::try_from(id).ok())
                })
        })
        .collect();

    Ok(SearchHits { total, ids })
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn search(&self, text: &str, offset: u64, limit: u64) -> Result<SearchHits, SearchError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let query = json!({
            "from": offset,
            "size": limit,
            "query": {
                "multi_match": {
                    "query": text,
                    "fields": ["text", "name^2"]
                }
            }
        });

        let response = self.client.post(&url).json(&query).send().await?;
        let body: Value = Self::check(response).await?.json().await?;
        parse_hits(&body)
    }

    async fn index_documents(&self, documents: &[SkuDocument]) -> Result<usize, SearchError> {
        let mut indexed = 0;
        for doc in documents {
            let url = format!("{}/{}/_doc/{}", self.base_url, self.index, doc.id);
            let response = self.client.put(&url).json(doc).send().await?;
            Self::check(response).await?;
            indexed += 1;
        }
        Ok(indexed)
    }
}

/// One search result: the indexed text and the SKU it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub text: String,
    pub object: SkuSummary,
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<SearchResult>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

/// Free-text SKU search backed by an external index
#[derive(Clone)]
pub struct SearchService {
    db_pool: Arc<DbPool>,
    index: Arc<dyn SearchIndex>,
}

impl SearchService {
    pub fn new(db_pool: Arc<DbPool>, index: Arc<dyn SearchIndex>) -> Self {
        Self { db_pool, index }
    }

    /// Maps index hits back to launched SKUs in index order
    #[instrument(skip(self))]
    pub async fn search(&self, text: &str, page: u64, page_size: u64) -> Result<SearchPage, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::BadRequest("search text is required".to_string()));
        }

        let offset = page.saturating_sub(1).saturating_mul(page_size);
        // Pages beyond the index window only need the hit count
        let (offset, limit) = if offset.saturating_add(page_size) > MAX_RESULT_WINDOW {
            debug!(page, page_size, "Search page beyond result window");
            (0, 0)
        } else {
            (offset, page_size)
        };

        let hits = self.index.search(text, offset, limit).await.map_err(|e| {
            error!(error = %e, "Search index query failed");
            e
        })?;

        if hits.ids.is_empty() {
            return Ok(SearchPage {
                items: Vec::new(),
                page,
                page_size,
                total: hits.total,
            });
        }

        let skus = Sku::find()
            .filter(sku::Column::Id.is_in(hits.ids.clone()))
            .filter(sku::Column::IsLaunched.eq(true))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load SKUs for search hits");
                ServiceError::DatabaseError(e)
            })?;

        let mut by_id: HashMap<i32, sku::Model> = skus.into_iter().map(|s| (s.id, s)).collect();
        let items: Vec<SearchResult> = hits
            .ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|model| SearchResult {
                text: SkuDocument::index_text(&model),
                object: SkuSummary::from(model),
            })
            .collect();

        if items.len() < hits.ids.len() {
            debug!(
                hits = hits.ids.len(),
                kept = items.len(),
                "Dropped search hits for missing or unlaunched SKUs"
            );
        }

        Ok(SearchPage {
            items,
            page,
            page_size,
            total: hits.total,
        })
    }

    /// Pushes the given SKUs into the index, returning how many were written
    #[instrument(skip(self, sku_ids), fields(count = sku_ids.len()))]
    pub async fn reindex(&self, sku_ids: &[i32]) -> Result<usize, ServiceError> {
        if sku_ids.is_empty() {
            return Ok(0);
        }

        let skus = Sku::find()
            .filter(sku::Column::Id.is_in(sku_ids.to_vec()))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load SKUs for reindexing");
                ServiceError::DatabaseError(e)
            })?;

        let documents: Vec<SkuDocument> = skus.iter().map(SkuDocument::from).collect();
        let indexed = self.index.index_documents(&documents).await.map_err(|e| {
            warn!(error = %e, "Reindexing failed");
            e
        })?;
        Ok(indexed)
    }
}
