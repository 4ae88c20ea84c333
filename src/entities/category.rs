use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product category; `parent_id` is null for top-level categories
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
    #[sea_orm(has_many = "super::sku::Entity")]
    Skus,
    #[sea_orm(has_many = "super::channel::Entity")]
    Channels,
}

impl Related<super::sku::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Skus.def()
    }
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
