mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::entities::order::{OrderState, PaymentMethod};
use storefront_api::entities::tariff_rule::CustomerGroup;
use storefront_api::errors::ServiceError;
use storefront_api::services::checkout::CheckoutRequest;
use storefront_api::services::order_pricing::CartLine;

fn request(
    group: CustomerGroup,
    method: PaymentMethod,
    lines: Vec<CartLine>,
) -> CheckoutRequest {
    CheckoutRequest {
        customer_group: group,
        payment_method: method,
        lines,
        shipping_address: "C/ Mayor 1, Madrid".to_string(),
        billing_address: "C/ Mayor 1, Madrid".to_string(),
    }
}

#[tokio::test]
async fn checkout_prices_and_persists_an_order() {
    let app = common::setup().await;
    let surgical = Uuid::new_v4();

    let masks = common::seed_product(&app.db, dec!(50.00), Some(surgical)).await;
    let gloves = common::seed_product(&app.db, dec!(50.00), Some(surgical)).await;
    // Product rule beats the category rule for masks only
    common::seed_rule(&app.db, CustomerGroup::Hospital, dec!(20), Some(masks), None).await;
    common::seed_rule(&app.db, CustomerGroup::Hospital, dec!(10), None, Some(surgical)).await;

    let result = app
        .checkout
        .checkout(
            "10.0.0.1",
            request(
                CustomerGroup::Hospital,
                PaymentMethod::Card,
                vec![
                    CartLine { product_id: masks, quantity: 3 },
                    CartLine { product_id: gloves, quantity: 3 },
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(result.priced.subtotal, dec!(255.00));
    assert_eq!(result.priced.shipping_cost, dec!(15.00));
    assert_eq!(result.priced.total, dec!(270.00));
    assert_eq!(result.order.state, OrderState::ApprovedPendingPayment);
    assert_eq!(result.order.total, dec!(270.00));

    let items = app.orders.get_order_items(result.order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_id, masks);
    assert_eq!(items[0].unit_price, dec!(40.00));
    assert_eq!(items[1].product_id, gloves);
    assert_eq!(items[1].unit_price, dec!(45.00));
}

#[tokio::test]
async fn bank_transfer_orders_start_requested_and_need_approval() {
    let app = common::setup().await;
    let product = common::seed_product(&app.db, dec!(100.00), None).await;

    let result = app
        .checkout
        .checkout(
            "10.0.0.1",
            request(
                CustomerGroup::Business,
                PaymentMethod::BankTransfer,
                vec![CartLine { product_id: product, quantity: 1 }],
            ),
        )
        .await
        .unwrap();
    assert_eq!(result.order.state, OrderState::Requested);

    let approved = app.orders.approve_for_payment(result.order.id).await.unwrap();
    assert_eq!(approved.state, OrderState::ApprovedPendingPayment);

    // Approval is not repeatable
    let err = app.orders.approve_for_payment(result.order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn unknown_product_aborts_checkout_without_persisting() {
    let app = common::setup().await;
    let known = common::seed_product(&app.db, dec!(10.00), None).await;

    let err = app
        .checkout
        .checkout(
            "10.0.0.1",
            request(
                CustomerGroup::Individual,
                PaymentMethod::Card,
                vec![
                    CartLine { product_id: known, quantity: 1 },
                    CartLine { product_id: Uuid::new_v4(), quantity: 1 },
                ],
            ),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ProductNotFound(_));

    let page = app.orders.list_orders(1, 20).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn list_page_size_is_clamped() {
    let app = common::setup().await;

    let page = app.orders.list_orders(1, u64::MAX).await.unwrap();
    assert_eq!(page.per_page, 100);

    let page = app.orders.list_orders(1, 0).await.unwrap();
    assert_eq!(page.per_page, 1);
}

#[tokio::test]
async fn free_shipping_applies_at_the_threshold() {
    let app = common::setup().await;
    let product = common::seed_product(&app.db, dec!(250.00), None).await;

    let result = app
        .checkout
        .checkout(
            "10.0.0.1",
            request(
                CustomerGroup::Individual,
                PaymentMethod::Card,
                vec![CartLine { product_id: product, quantity: 2 }],
            ),
        )
        .await
        .unwrap();

    assert_eq!(result.priced.subtotal, dec!(500.00));
    assert_eq!(result.priced.shipping_cost, dec!(0.00));
    assert_eq!(result.priced.total, dec!(500.00));
}

#[tokio::test]
async fn cancel_is_allowed_until_shipment() {
    let app = common::setup().await;
    let product = common::seed_product(&app.db, dec!(20.00), None).await;

    let result = app
        .checkout
        .checkout(
            "10.0.0.1",
            request(
                CustomerGroup::Business,
                PaymentMethod::BankTransfer,
                vec![CartLine { product_id: product, quantity: 1 }],
            ),
        )
        .await
        .unwrap();

    let cancelled = app.orders.cancel_order(result.order.id).await.unwrap();
    assert_eq!(cancelled.state, OrderState::Cancelled);

    // Terminal: neither approval nor a second cancel may proceed
    assert_matches!(
        app.orders.approve_for_payment(result.order.id).await.unwrap_err(),
        ServiceError::StateConflict(_)
    );
    assert_matches!(
        app.orders.cancel_order(result.order.id).await.unwrap_err(),
        ServiceError::StateConflict(_)
    );
}
