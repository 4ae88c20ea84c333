use crate::{
    db::DbPool,
    entities::{
        category::{self, Entity as Category},
        channel::{self, Entity as Channel},
    },
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RootCrumb {
    /// Channel URL of the top-level category
    pub url: String,
    pub category: CategoryName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Breadcrumb {
    pub cat1: RootCrumb,
    pub cat2: CategoryName,
    pub cat3: CategoryName,
}

/// Walks a leaf category up to its channel
#[derive(Clone)]
pub struct BreadcrumbService {
    db_pool: Arc<DbPool>,
}

fn db_failure(step: &'static str, category_id: i32) -> impl FnOnce(DbErr) -> ServiceError {
    move |e| {
        error!(category_id, step, error = %e, "Breadcrumb lookup failed");
        ServiceError::DatabaseError(e)
    }
}

impl BreadcrumbService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn category(&self, id: Option<i32>) -> Result<category::Model, ServiceError> {
        let Some(id) = id else {
            return Err(ServiceError::CategoryNotFound);
        };

        Category::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(db_failure("category", id))?
            .ok_or(ServiceError::CategoryNotFound)
    }

    /// Resolves `cat3 -> cat2 -> cat1 -> channel`.
    /// A missing link is `CategoryNotFound`; storage failures stay `DatabaseError`.
    #[instrument(skip(self))]
    pub async fn breadcrumb(&self, category_id: i32) -> Result<Breadcrumb, ServiceError> {
        let cat3 = self.category(Some(category_id)).await?;
        let cat2 = self.category(cat3.parent_id).await?;
        let cat1 = self.category(cat2.parent_id).await?;

        let channel = Channel::find()
            .filter(channel::Column::CategoryId.eq(cat1.id))
            .order_by_asc(channel::Column::Id)
            .one(&*self.db_pool)
            .await
            .map_err(db_failure("channel", cat1.id))?
            .ok_or(ServiceError::CategoryNotFound)?;

        debug!(category_id, root = cat1.id, "Resolved breadcrumb");
        Ok(Breadcrumb {
            cat1: RootCrumb {
                url: channel.url,
                category: CategoryName { name: cat1.name },
            },
            cat2: CategoryName { name: cat2.name },
            cat3: CategoryName { name: cat3.name },
        })
    }
}
