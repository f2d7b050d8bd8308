use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::errors::ServiceError;
use crate::services::payments::SignedPaymentForm;
use crate::{ApiResponse, AppState};

/// GET /api/v1/orders/:id/payment-form
///
/// Signed gateway redirect form for a card order awaiting payment. The
/// browser posts these three fields to `gateway_url` as-is.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/payment-form",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Signed payment form", body = SignedPaymentForm),
        (status = 400, description = "Not a card order"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order not awaiting payment"),
    ),
    tag = "payments"
)]
pub async fn payment_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SignedPaymentForm>>, ServiceError> {
    let form = state.services.payments.payment_form(id).await?;
    Ok(Json(ApiResponse::success(form)))
}
