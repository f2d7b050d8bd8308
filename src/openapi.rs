use axum::response::Json;
use utoipa::OpenApi;

use crate::entities::order::{OrderState, PaymentMethod};
use crate::entities::tariff_rule::CustomerGroup;
use crate::entities::{order, order_item};
use crate::handlers;
use crate::services::order_pricing::{CartLine, PricedLine, PricedOrder};
use crate::services::payments::SignedPaymentForm;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = "B2B storefront commerce core: customer-group tariff pricing, \
server-authoritative checkout and signed card payment processing."
    ),
    paths(
        handlers::checkout::checkout,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::approve_order,
        handlers::orders::ship_order,
        handlers::orders::cancel_order,
        handlers::payments::payment_form,
        handlers::payment_webhooks::payment_webhook,
    ),
    components(schemas(
        handlers::checkout::CheckoutPayload,
        handlers::checkout::CheckoutResponse,
        handlers::orders::OrderDetail,
        order::Model,
        order_item::Model,
        OrderState,
        PaymentMethod,
        CustomerGroup,
        CartLine,
        PricedLine,
        PricedOrder,
        SignedPaymentForm,
    )),
    tags(
        (name = "checkout", description = "Cart pricing and order creation"),
        (name = "orders", description = "Order lookup and state transitions"),
        (name = "payments", description = "Gateway payment forms and notifications"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
