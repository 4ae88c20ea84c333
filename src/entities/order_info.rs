use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How the customer chose to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayMethod {
    #[sea_orm(num_value = 1)]
    Cash,
    #[sea_orm(num_value = 2)]
    Alipay,
}

/// Order lifecycle. Payment confirmation only moves `Unpaid` to `Unreceived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(num_value = 1)]
    Unpaid,
    #[sea_orm(num_value = 2)]
    Unsend,
    #[sea_orm(num_value = 3)]
    Unreceived,
    #[sea_orm(num_value = 4)]
    Uncomment,
    #[sea_orm(num_value = 5)]
    Finished,
    #[sea_orm(num_value = 6)]
    Canceled,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_info")]
pub struct Model {
    /// Merchant order number, also sent to Alipay as `out_trade_no`
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    pub user_id: i32,
    pub total_count: i32,
    pub total_amount: Decimal,
    pub freight: Decimal,
    pub pay_method: PayMethod,
    pub status: OrderStatus,
    pub create_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
