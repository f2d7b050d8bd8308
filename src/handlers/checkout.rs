use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::order::{OrderState, PaymentMethod};
use crate::entities::tariff_rule::CustomerGroup;
use crate::errors::ServiceError;
use crate::handlers::common::client_identity;
use crate::services::checkout::CheckoutRequest;
use crate::services::order_pricing::{CartLine, PricedLine};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutPayload {
    pub customer_group: CustomerGroup,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, message = "order must contain at least one line"))]
    pub lines: Vec<CartLine>,
    #[validate(length(min = 1, message = "shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "billing address is required"))]
    pub billing_address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: i64,
    pub state: OrderState,
    pub payment_method: PaymentMethod,
    pub lines: Vec<PricedLine>,
    pub subtotal: rust_decimal::Decimal,
    pub shipping_cost: rust_decimal::Decimal,
    pub total: rust_decimal::Decimal,
}

/// POST /api/v1/checkout
///
/// Prices the submitted cart server-side and creates the order. Client
/// prices are never accepted; the response carries the authoritative totals.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutPayload,
    responses(
        (status = 201, description = "Order created", body = CheckoutResponse),
        (status = 400, description = "Invalid cart"),
        (status = 404, description = "Unknown product"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutPayload>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let identity = client_identity(&headers);
    let result = state
        .services
        .checkout
        .checkout(
            &identity,
            CheckoutRequest {
                customer_group: payload.customer_group,
                payment_method: payload.payment_method,
                lines: payload.lines,
                shipping_address: payload.shipping_address,
                billing_address: payload.billing_address,
            },
        )
        .await?;

    let response = CheckoutResponse {
        order_id: result.order.id,
        state: result.order.state,
        payment_method: result.order.payment_method,
        lines: result.priced.lines,
        subtotal: result.priced.subtotal,
        shipping_cost: result.priced.shipping_cost,
        total: result.priced.total,
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}
