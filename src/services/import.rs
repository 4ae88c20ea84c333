use crate::{
    db::DbPool,
    entities::{
        category::{self, Entity as Category},
        sku::{self, Entity as Sku},
    },
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const DEFAULT_STOCK: i32 = 10;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: read failed: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("not a top-level category: {0}")]
    InvalidRoot(String),

    #[error("invalid price for {title}: {price}")]
    InvalidPrice { title: String, price: Decimal },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Authors {
    Many(Vec<String>),
    One(String),
}

impl Authors {
    fn joined(&self) -> String {
        match self {
            Authors::Many(names) => names.join(" "),
            Authors::One(name) => name.clone(),
        }
    }
}

/// One book as exported from the scraped document store
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookDocument {
    pub b_cate: String,
    pub s_cate: String,
    pub book_title: String,
    pub book_price: Decimal,
    #[serde(default)]
    pub book_img: Option<String>,
    #[serde(default)]
    pub book_author: Option<Authors>,
    #[serde(default)]
    pub book_service: Option<String>,
    #[serde(default)]
    pub book_detail: Option<String>,
}

/// Reads one JSON document per line, as produced by `mongoexport`
pub struct JsonLinesSource<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<BookDocument, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(ImportError::Read {
                        line: self.line_no,
                        source,
                    }))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|source| ImportError::Parse {
                line: self.line_no,
                source,
            }));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created(i32),
    Updated(i32),
}

impl ImportOutcome {
    pub fn sku_id(self) -> i32 {
        match self {
            ImportOutcome::Created(id) | ImportOutcome::Updated(id) => id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    #[serde(skip)]
    pub sku_ids: Vec<i32>,
}

/// Upserts scraped books into the relational catalog
pub struct CatalogImporter {
    db_pool: Arc<DbPool>,
    root: Option<category::Model>,
}

impl CatalogImporter {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            root: None,
        }
    }

    /// Create missing `b_cate`/`s_cate` categories beneath `root` instead of skipping the book
    pub fn create_categories_under(mut self, root: category::Model) -> Self {
        self.root = Some(root);
        self
    }

    /// Looks up a top-level category by id or exact name
    pub async fn resolve_root(&self, selector: &str) -> Result<category::Model, ImportError> {
        let selector = selector.trim();
        let query = match selector.parse::<i32>() {
            Ok(id) => Category::find_by_id(id),
            Err(_) => Category::find()
                .filter(category::Column::Name.eq(selector))
                .filter(category::Column::ParentId.is_null()),
        };

        match query.order_by_asc(category::Column::Id).one(&*self.db_pool).await? {
            Some(root) if root.parent_id.is_none() => Ok(root),
            _ => Err(ImportError::InvalidRoot(selector.to_string())),
        }
    }

    async fn find_leaf(&self, name: &str) -> Result<Option<category::Model>, DbErr> {
        Category::find()
            .filter(category::Column::Name.eq(name))
            .filter(category::Column::ParentId.is_not_null())
            .order_by_asc(category::Column::Id)
            .one(&*self.db_pool)
            .await
    }

    async fn find_or_create_child(&self, name: &str, parent_id: i32) -> Result<category::Model, DbErr> {
        let existing = Category::find()
            .filter(category::Column::Name.eq(name))
            .filter(category::Column::ParentId.eq(parent_id))
            .order_by_asc(category::Column::Id)
            .one(&*self.db_pool)
            .await?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        debug!(name, parent_id, "Creating category");
        category::ActiveModel {
            name: Set(name.to_string()),
            parent_id: Set(Some(parent_id)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
    }

    async fn resolve_leaf_category(&self, doc: &BookDocument) -> Result<category::Model, ImportError> {
        if let Some(cat3) = self.find_leaf(&doc.s_cate).await? {
            return Ok(cat3);
        }
        let Some(root) = &self.root else {
            return Err(ImportError::UnknownCategory(doc.s_cate.clone()));
        };

        let cat2 = self.find_or_create_child(&doc.b_cate, root.id).await?;
        Ok(self.find_or_create_child(&doc.s_cate, cat2.id).await?)
    }

    /// Existing SKUs (matched by name) get their service text refreshed; new ones are created
    #[instrument(skip(self, doc), fields(title = %doc.book_title))]
    pub async fn import_document(&self, doc: &BookDocument) -> Result<ImportOutcome, ImportError> {
        let db = &*self.db_pool;

        if doc.book_price <= Decimal::ZERO {
            return Err(ImportError::InvalidPrice {
                title: doc.book_title.clone(),
                price: doc.book_price,
            });
        }

        let category = self.resolve_leaf_category(doc).await?;

        let existing = Sku::find()
            .filter(sku::Column::Name.eq(doc.book_title.as_str()))
            .order_by_asc(sku::Column::Id)
            .one(db)
            .await?;

        if let Some(existing) = existing {
            let id = existing.id;
            let mut active = existing.into_active_model();
            active.desc_service = Set(doc.book_service.clone());
            active.update(db).await?;
            return Ok(ImportOutcome::Updated(id));
        }

        let price = doc.book_price.round_dp(2);
        let created = sku::ActiveModel {
            name: Set(doc.book_title.clone()),
            category_id: Set(category.id),
            price: Set(price),
            cost_price: Set((price * Decimal::new(8, 1)).round_dp(2)),
            market_price: Set((price * Decimal::new(13, 1)).round_dp(2)),
            stock: Set(DEFAULT_STOCK),
            sales: Set(0),
            comments: Set(0),
            is_launched: Set(true),
            default_image_url: Set(doc.book_img.clone()),
            author: Set(doc.book_author.as_ref().map(Authors::joined)),
            desc_detail: Set(doc.book_detail.clone()),
            desc_service: Set(doc.book_service.clone()),
            caption: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(ImportOutcome::Created(created.id))
    }

    /// Imports every document; failures are logged and counted, never fatal
    pub async fn import_all<I>(&self, documents: I) -> ImportSummary
    where
        I: IntoIterator<Item = Result<BookDocument, ImportError>>,
    {
        let mut summary = ImportSummary::default();

        for doc in documents {
            let outcome = match doc {
                Ok(doc) => self.import_document(&doc).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(ImportOutcome::Created(id)) => {
                    summary.created += 1;
                    summary.sku_ids.push(id);
                }
                Ok(ImportOutcome::Updated(id)) => {
                    summary.updated += 1;
                    summary.sku_ids.push(id);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping document");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            "Catalog import finished"
        );
        summary
    }
}
