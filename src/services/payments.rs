use crate::{
    db::DbPool,
    entities::{
        order_info::{self, Entity as OrderInfo, OrderStatus, PayMethod},
        payment::{self, Entity as Payment},
    },
    errors::ServiceError,
    services::alipay::{PagePayOrder, PaymentProvider},
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveEnum, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Page-pay initiation and callback confirmation for Alipay orders
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    provider: Arc<dyn PaymentProvider>,
}

fn required_param<'a>(
    params: &'a BTreeMap<String, String>,
    key: &str,
) -> Result<&'a str, ServiceError> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::BadRequest(format!("missing callback parameter: {}", key)))
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { db_pool, provider }
    }

    /// Builds the Alipay redirect URL for an unpaid order owned by `user_id`.
    /// Every precondition failure is the same `InvalidOrder` to the caller.
    #[instrument(skip(self))]
    pub async fn initiate_payment(&self, order_id: &str, user_id: i32) -> Result<String, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderInfo::find_by_id(order_id.to_string())
            .one(db)
            .await
            .map_err(|e| {
                error!(order_id, error = %e, "Failed to load order for payment");
                ServiceError::DatabaseError(e)
            })?;

        let Some(order) = order else {
            warn!(order_id, user_id, "Payment requested for unknown order");
            return Err(ServiceError::InvalidOrder);
        };

        let rejection = if order.user_id != user_id {
            Some("order belongs to another user")
        } else if order.pay_method != PayMethod::Alipay {
            Some("order is not paid through Alipay")
        } else if order.status != OrderStatus::Unpaid {
            Some("order is not awaiting payment")
        } else {
            None
        };

        if let Some(reason) = rejection {
            warn!(order_id, user_id, reason, "Rejected payment request");
            return Err(ServiceError::InvalidOrder);
        }

        let url = self
            .provider
            .page_pay_url(&PagePayOrder::for_order(&order.order_id, order.total_amount))?;

        info!(order_id, user_id, "Issued Alipay payment link");
        Ok(url)
    }

    /// Verifies an Alipay return callback, records the trade and marks the order paid.
    /// Replays of the same `trade_no` are acknowledged without another write.
    #[instrument(skip(self, params))]
    pub async fn confirm_payment(
        &self,
        mut params: BTreeMap<String, String>,
    ) -> Result<String, ServiceError> {
        let Some(signature) = params.remove("sign") else {
            warn!("Payment callback without signature");
            return Err(ServiceError::InvalidSignature);
        };

        if !self.provider.verify_callback(&params, &signature) {
            return Err(ServiceError::InvalidSignature);
        }

        let order_id = required_param(&params, "out_trade_no")?.to_string();
        let trade_id = required_param(&params, "trade_no")?.to_string();

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(%order_id, error = %e, "Failed to open payment transaction");
            ServiceError::DatabaseError(e)
        })?;

        let record = payment::ActiveModel {
            order_id: Set(order_id.clone()),
            trade_id: Set(trade_id.clone()),
            create_time: Set(Utc::now()),
            ..Default::default()
        };

        let inserted = Payment::insert(record)
            .on_conflict(
                OnConflict::column(payment::Column::TradeId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| {
                error!(%order_id, %trade_id, error = %e, "Failed to record payment");
                ServiceError::DatabaseError(e)
            })?;

        if inserted == 0 {
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            info!(%order_id, %trade_id, "Duplicate payment callback acknowledged");
            return Ok(trade_id);
        }

        let updated = OrderInfo::update_many()
            .col_expr(
                order_info::Column::Status,
                Expr::value(OrderStatus::Unreceived.into_value()),
            )
            .filter(order_info::Column::OrderId.eq(order_id.as_str()))
            .filter(order_info::Column::Status.eq(OrderStatus::Unpaid.into_value()))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(%order_id, %trade_id, error = %e, "Failed to mark order paid");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(%order_id, %trade_id, error = %e, "Failed to commit payment");
            ServiceError::DatabaseError(e)
        })?;

        if updated.rows_affected == 0 {
            warn!(%order_id, %trade_id, "Payment recorded but order was not awaiting payment");
        } else {
            info!(%order_id, %trade_id, "Order marked paid");
        }

        Ok(trade_id)
    }
}
