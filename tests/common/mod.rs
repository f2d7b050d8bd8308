//! Shared fixtures for integration tests: an in-memory database with the
//! schema applied, seeded catalog data, and fully wired services.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::config::{GatewayConfig, PricingConfig, RateLimitConfig};
use storefront_api::entities::tariff_rule::{self, CustomerGroup};
use storefront_api::entities::product;
use storefront_api::events::EventSender;
use storefront_api::rate_limiter::{InMemoryRateLimitStore, RateLimiter};
use storefront_api::services::catalog::SeaOrmCatalog;
use storefront_api::services::checkout::CheckoutService;
use storefront_api::services::order_pricing::OrderPricingService;
use storefront_api::services::orders::OrderService;
use storefront_api::services::payment_processing::PaymentProcessingService;
use storefront_api::services::payments::RedsysGateway;

pub const TEST_SECRET: &[u8] = b"sq7HjrUOBfKmC576ILgskD5srU870gJ7";
pub const TEST_MERCHANT_CODE: &str = "999008881";

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub payments: PaymentProcessingService,
    pub gateway_config: GatewayConfig,
}

pub async fn setup() -> TestApp {
    // A single connection keeps the in-memory database alive and shared
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    storefront_api::db::run_migrations(&db).await.unwrap();
    let db = Arc::new(db);

    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    let event_sender = EventSender::new(tx);

    let gateway_config = GatewayConfig {
        merchant_code: TEST_MERCHANT_CODE.to_string(),
        terminal: "1".to_string(),
        secret_key: STANDARD.encode(TEST_SECRET),
        currency: "978".to_string(),
        merchant_name: "Storefront".to_string(),
        consumer_language: "001".to_string(),
        notification_url: "http://localhost:8080/api/v1/payments/webhook".to_string(),
        return_url_ok: "http://localhost:8080/payment/ok".to_string(),
        return_url_ko: "http://localhost:8080/payment/ko".to_string(),
        use_test_environment: true,
    };

    let catalog = Arc::new(SeaOrmCatalog::new(db.clone()));
    let pricing = OrderPricingService::new(catalog, PricingConfig::default());
    let orders = OrderService::new(db.clone(), event_sender.clone());
    let gateway = RedsysGateway::new(gateway_config.clone());
    let payments = PaymentProcessingService::new(gateway, orders.clone(), event_sender.clone());
    let rate_limiter = RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        &RateLimitConfig::default(),
    );
    let checkout = CheckoutService::new(pricing, orders.clone(), rate_limiter);

    TestApp {
        db,
        checkout,
        orders,
        payments,
        gateway_config,
    }
}

pub async fn seed_product(
    db: &DatabaseConnection,
    price: Decimal,
    category_id: Option<Uuid>,
) -> Uuid {
    let id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(id),
        name: Set(format!("Product {}", &id.to_string()[..8])),
        sku: Set(format!("SKU-{}", &id.to_string()[..8])),
        base_price: Set(price),
        category_id: Set(category_id),
        active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();
    id
}

pub async fn seed_rule(
    db: &DatabaseConnection,
    group: CustomerGroup,
    discount_percent: Decimal,
    product_id: Option<Uuid>,
    category_id: Option<Uuid>,
) {
    tariff_rule::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_group: Set(group),
        discount_percent: Set(discount_percent),
        product_id: Set(product_id),
        category_id: Set(category_id),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();
}

/// Builds a gateway-side notification envelope: base64 JSON parameters and
/// a signature computed the same way the gateway signs, keyed per order.
pub fn build_notification(
    secret: &[u8],
    order_reference: &str,
    merchant_code: &str,
    response_code: &str,
    amount_cents: i64,
) -> (String, String) {
    let params = serde_json::json!({
        "Ds_Order": order_reference,
        "Ds_MerchantCode": merchant_code,
        "Ds_Terminal": "1",
        "Ds_Response": response_code,
        "Ds_Amount": amount_cents.to_string(),
        "Ds_Currency": "978",
    });
    let encoded = STANDARD.encode(serde_json::to_vec(&params).unwrap());

    type HmacSha256 = Hmac<Sha256>;
    let mut key_mac = HmacSha256::new_from_slice(secret).unwrap();
    key_mac.update(order_reference.as_bytes());
    let order_key = key_mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&order_key).unwrap();
    mac.update(encoded.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    (encoded, signature)
}
