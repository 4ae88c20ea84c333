use super::AppState;
use crate::{auth::AuthUser, errors::ServiceError};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentUrlResponse {
    /// Gateway URL carrying the signed page-pay request
    pub alipay_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusResponse {
    /// Alipay trade number recorded for the order
    pub trade_id: String,
}

/// Alipay payment link for an unpaid order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}/payment",
    summary = "Get payment link",
    params(("order_id" = String, Path, description = "Merchant order id")),
    responses(
        (status = 200, description = "Payment link built", body = PaymentUrlResponse),
        (status = 400, description = "Order is not payable by this user", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn payment_url(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentUrlResponse>, ServiceError> {
    let alipay_url = state
        .services
        .payments
        .initiate_payment(&order_id, auth_user.user_id)
        .await?;
    Ok(Json(PaymentUrlResponse { alipay_url }))
}

/// Confirms a payment from the Alipay return parameters
#[utoipa::path(
    put,
    path = "/api/v1/payment/status",
    summary = "Confirm payment",
    description = "Takes the query parameters Alipay appends to the return URL, including `sign`.",
    params(
        ("out_trade_no" = String, Query, description = "Merchant order id"),
        ("trade_no" = String, Query, description = "Alipay trade number"),
        ("sign" = String, Query, description = "RSA2 signature over the other parameters"),
    ),
    responses(
        (status = 200, description = "Payment recorded", body = PaymentStatusResponse),
        (status = 400, description = "Signed parameters are incomplete", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Signature verification failed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaymentStatusResponse>, ServiceError> {
    info!(user_id = auth_user.user_id, "Payment callback received");
    let trade_id = state.services.payments.confirm_payment(params).await?;
    Ok(Json(PaymentStatusResponse { trade_id }))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/:order_id/payment", get(payment_url))
        .route("/payment/status", put(payment_status))
}
