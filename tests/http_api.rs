mod common;

use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use storefront_api::config::{AppConfig, GatewayConfig, PricingConfig, RateLimitConfig};
use storefront_api::entities::tariff_rule::CustomerGroup;
use storefront_api::events::EventSender;
use storefront_api::AppState;

async fn test_router() -> (axum::Router, AppState) {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    storefront_api::db::run_migrations(&db).await.unwrap();

    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let config = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        db_max_connections: 1,
        request_timeout_secs: 5,
        gateway: GatewayConfig {
            merchant_code: common::TEST_MERCHANT_CODE.to_string(),
            secret_key: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                common::TEST_SECRET,
            ),
            ..GatewayConfig::default()
        },
        pricing: PricingConfig::default(),
        rate_limit: RateLimitConfig::default(),
    };

    let state = AppState::new(db, config, EventSender::new(tx));
    let router = storefront_api::app_routes().with_state(state.clone());
    (router, state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (router, _state) = test_router().await;

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn checkout_creates_an_order_and_serves_its_payment_form() {
    let (router, state) = test_router().await;
    let product = common::seed_product(&state.db, dec!(80.00), None).await;
    common::seed_rule(&state.db, CustomerGroup::Hospital, dec!(25), None, None).await;

    let payload = json!({
        "customer_group": "hospital",
        "payment_method": "card",
        "lines": [{ "product_id": product, "quantity": 2 }],
        "shipping_address": "C/ Mayor 1, Madrid",
        "billing_address": "C/ Mayor 1, Madrid",
    });

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    // 80.00 at 25% off is 60.00 each; 120.00 subtotal plus 15.00 shipping
    assert_eq!(body["data"]["total"], json!("135.00"));
    assert_eq!(body["data"]["state"], "approved_pending_payment");
    let order_id = body["data"]["order_id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/orders/{}/payment-form", order_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["signature_version"], "HMAC_SHA256_V1");

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/orders/{}", order_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_rejects_an_empty_cart() {
    let (router, _state) = test_router().await;

    let payload = json!({
        "customer_group": "business",
        "payment_method": "card",
        "lines": [],
        "shipping_address": "x",
        "billing_address": "x",
    });

    let response = router
        .oneshot(
            Request::post("/api/v1/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_order_returns_404() {
    let (router, _state) = test_router().await;

    let response = router
        .oneshot(Request::get("/api/v1/orders/42").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_round_trip_marks_the_order_paid() {
    let (router, state) = test_router().await;
    let product = common::seed_product(&state.db, dec!(100.00), None).await;

    let payload = json!({
        "customer_group": "business",
        "payment_method": "card",
        "lines": [{ "product_id": product, "quantity": 2 }],
        "shipping_address": "x",
        "billing_address": "x",
    });
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    let order_id = body["data"]["order_id"].as_i64().unwrap();
    let reference = format!("{:04}", order_id);

    // 2 x 100.00 plus 15.00 shipping
    let (params, signature) = common::build_notification(
        common::TEST_SECRET,
        &reference,
        common::TEST_MERCHANT_CODE,
        "0000",
        21500,
    );
    let form = format!(
        "Ds_SignatureVersion=HMAC_SHA256_V1&Ds_MerchantParameters={}&Ds_Signature={}",
        urlencode(&params),
        urlencode(&signature)
    );

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/orders/{}", order_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["state"], "paid");

    // A replay conflicts instead of double-applying
    let response = router
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn webhook_rejects_bad_signatures_with_403() {
    let (router, state) = test_router().await;
    let product = common::seed_product(&state.db, dec!(100.00), None).await;

    let payload = json!({
        "customer_group": "business",
        "payment_method": "card",
        "lines": [{ "product_id": product, "quantity": 2 }],
        "shipping_address": "x",
        "billing_address": "x",
    });
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    let order_id = body["data"]["order_id"].as_i64().unwrap();
    let reference = format!("{:04}", order_id);

    let (params, _) = common::build_notification(
        common::TEST_SECRET,
        &reference,
        common::TEST_MERCHANT_CODE,
        "0000",
        21500,
    );
    let (_, wrong_signature) = common::build_notification(
        b"another-secret-entirely-32-bytes",
        &reference,
        common::TEST_MERCHANT_CODE,
        "0000",
        21500,
    );
    let form = format!(
        "Ds_SignatureVersion=HMAC_SHA256_V1&Ds_MerchantParameters={}&Ds_Signature={}",
        urlencode(&params),
        urlencode(&wrong_signature)
    );

    let response = router
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
