use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::handlers::common::ListQuery;
use crate::{ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// GET /api/v1/orders/:id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with line items", body = OrderDetail),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrderDetail>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::OrderNotFound(id.to_string()))?;
    let items = state.services.orders.get_order_items(id).await?;

    Ok(Json(ApiResponse::success(OrderDetail { order, items })))
}

/// GET /api/v1/orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("limit" = Option<u64>, Query, description = "Page size, capped at 100"),
    ),
    responses((status = 200, description = "Paginated orders")),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<order::Model>>>, ServiceError> {
    let page = state
        .services
        .orders
        .list_orders(query.page, query.limit)
        .await?;

    // per_page is clamped by the service, so this never divides by zero
    let total_pages = page.total.div_ceil(page.per_page);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: page.orders,
        total: page.total,
        page: page.page,
        limit: page.per_page,
        total_pages,
    })))
}

/// POST /api/v1/orders/:id/approve
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/approve",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order approved for payment", body = order::Model),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order not in an approvable state"),
    ),
    tag = "orders"
)]
pub async fn approve_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.approve_for_payment(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /api/v1/orders/:id/ship
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/ship",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order shipped", body = order::Model),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order not paid"),
    ),
    tag = "orders"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.mark_shipped(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /api/v1/orders/:id/cancel
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = order::Model),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already shipped or cancelled"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.cancel_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}
