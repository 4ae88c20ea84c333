use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Purchasable catalog entry
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "skus")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub caption: Option<String>,
    /// Always a level-3 category
    pub category_id: i32,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub market_price: Decimal,
    pub stock: i32,
    /// Maintained by order fulfilment
    pub sales: i32,
    pub comments: i32,
    /// Gates storefront visibility
    pub is_launched: bool,
    pub default_image_url: Option<String>,
    pub author: Option<String>,
    pub desc_detail: Option<String>,
    pub desc_service: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert && active_model.create_time.is_not_set() {
            active_model.create_time = Set(now);
        }
        active_model.update_time = Set(now);
        Ok(active_model)
    }
}
