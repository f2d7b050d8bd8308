use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod rate_limiter;
pub mod services;

use config::AppConfig;
use events::EventSender;
use rate_limiter::{InMemoryRateLimitStore, RateLimiter};
use services::catalog::SeaOrmCatalog;
use services::checkout::CheckoutService;
use services::order_pricing::OrderPricingService;
use services::orders::OrderService;
use services::payment_processing::PaymentProcessingService;
use services::payments::RedsysGateway;

/// Service singletons shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub payments: PaymentProcessingService,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, event_sender: EventSender) -> Self {
        let db = Arc::new(db);
        let config = Arc::new(config);

        let catalog = Arc::new(SeaOrmCatalog::new(db.clone()));
        let pricing = OrderPricingService::new(catalog, config.pricing.clone());
        let orders = OrderService::new(db.clone(), event_sender.clone());
        let gateway = RedsysGateway::new(config.gateway.clone());
        let payments =
            PaymentProcessingService::new(gateway, orders.clone(), event_sender.clone());
        let rate_limiter = RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            &config.rate_limit,
        );
        let checkout = CheckoutService::new(pricing, orders.clone(), rate_limiter);

        Self {
            db,
            config,
            event_sender,
            services: AppServices {
                checkout,
                orders,
                payments,
            },
        }
    }
}

/// Standard JSON envelope for API responses.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/status", get(handlers::health::status))
        .route("/checkout", post(handlers::checkout::checkout))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/approve", post(handlers::orders::approve_order))
        .route("/orders/:id/ship", post(handlers::orders::ship_order))
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/orders/:id/payment-form",
            get(handlers::payments::payment_form),
        )
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
}

pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/status", get(handlers::health::status))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", api_v1_routes())
}
