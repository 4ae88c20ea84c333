use crate::{
    db::DbPool,
    entities::{
        category::{self, Entity as Category},
        channel::{self, Entity as Channel},
    },
    errors::ServiceError,
};
use sea_orm::{EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

/// Top-level entry of a navigation group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChannelEntry {
    pub id: i32,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeafCategory {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubCategory {
    pub id: i32,
    pub name: String,
    pub sub_cats: Vec<LeafCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChannelGroup {
    pub channels: Vec<ChannelEntry>,
    pub sub_cats: Vec<SubCategory>,
}

/// Navigation menu keyed by channel group id
pub type CategoryTree = BTreeMap<i32, ChannelGroup>;

/// Assembles the three-level category menu
#[derive(Clone)]
pub struct CategoryTreeService {
    db_pool: Arc<DbPool>,
}

impl CategoryTreeService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<CategoryTree, ServiceError> {
        let db = &*self.db_pool;

        let channels = Channel::find()
            .order_by_asc(channel::Column::GroupId)
            .order_by_asc(channel::Column::Sequence)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load channels");
                ServiceError::DatabaseError(e)
            })?;

        let categories = Category::find()
            .order_by_asc(category::Column::Id)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load categories");
                ServiceError::DatabaseError(e)
            })?;

        Ok(build_tree(&channels, &categories))
    }
}

/// Assembles the menu from already-loaded rows
pub fn build_tree(channels: &[channel::Model], categories: &[category::Model]) -> CategoryTree {
    let by_id: HashMap<i32, &category::Model> = categories.iter().map(|c| (c.id, c)).collect();
    let mut children: HashMap<i32, Vec<&category::Model>> = HashMap::new();
    for cat in categories {
        if let Some(parent_id) = cat.parent_id {
            children.entry(parent_id).or_default().push(cat);
        }
    }
    for list in children.values_mut() {
        list.sort_by_key(|c| c.id);
    }

    let mut tree = CategoryTree::new();
    for ch in channels {
        let Some(cat1) = by_id.get(&ch.category_id) else {
            warn!(channel_id = ch.id, category_id = ch.category_id, "Channel points at a missing category");
            continue;
        };

        let group = tree.entry(ch.group_id).or_default();
        group.channels.push(ChannelEntry {
            id: cat1.id,
            name: cat1.name.clone(),
            url: ch.url.clone(),
        });

        for cat2 in children.get(&cat1.id).into_iter().flatten() {
            let sub_cats = children
                .get(&cat2.id)
                .into_iter()
                .flatten()
                .map(|cat3| LeafCategory {
                    id: cat3.id,
                    name: cat3.name.clone(),
                })
                .collect();

            group.sub_cats.push(SubCategory {
                id: cat2.id,
                name: cat2.name.clone(),
                sub_cats,
            });
        }
    }

    tree
}
