use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Redsys gateway endpoints
const REDSYS_TEST_URL: &str = "https://sis-t.redsys.es:25443/sis/realizarPago";
const REDSYS_LIVE_URL: &str = "https://sis.redsys.es/sis/realizarPago";

/// Payment gateway (Redsys) configuration.
///
/// The secret key is the base64-encoded merchant key from the bank back
/// office. It never appears in any outbound payload; it only feeds the
/// signature derivation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Merchant code (FUC) assigned by the bank
    #[serde(default)]
    pub merchant_code: String,

    /// Terminal number, usually "1"
    #[serde(default = "default_terminal")]
    pub terminal: String,

    /// Base64-encoded merchant secret key
    #[serde(default)]
    pub secret_key: String,

    /// ISO 4217 numeric currency code; 978 = EUR
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Merchant name shown on the gateway payment page
    #[serde(default)]
    pub merchant_name: String,

    /// Consumer language code for the payment page ("001" = Spanish)
    #[serde(default = "default_language")]
    pub consumer_language: String,

    /// Webhook URL the gateway notifies asynchronously
    #[serde(default)]
    pub notification_url: String,

    /// Browser return URL after an approved payment
    #[serde(default)]
    pub return_url_ok: String,

    /// Browser return URL after a declined payment
    #[serde(default)]
    pub return_url_ko: String,

    /// Use the bank's test environment instead of production
    #[serde(default = "default_true")]
    pub use_test_environment: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            merchant_code: String::new(),
            terminal: default_terminal(),
            secret_key: String::new(),
            currency: default_currency(),
            merchant_name: String::new(),
            consumer_language: default_language(),
            notification_url: String::new(),
            return_url_ok: String::new(),
            return_url_ko: String::new(),
            use_test_environment: true,
        }
    }
}

impl GatewayConfig {
    /// Target endpoint for the signed payment form.
    pub fn gateway_url(&self) -> &'static str {
        if self.use_test_environment {
            REDSYS_TEST_URL
        } else {
            REDSYS_LIVE_URL
        }
    }
}

/// Pricing and order-shape limits.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PricingConfig {
    /// Flat shipping fee applied below the free-shipping threshold
    #[serde(default = "default_shipping_flat_fee")]
    pub shipping_flat_fee: Decimal,

    /// Pre-tax subtotal at or above which shipping is free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Maximum quantity accepted on a single order line
    #[serde(default = "default_max_line_quantity")]
    pub max_line_quantity: u32,

    /// Maximum number of lines accepted per order
    #[serde(default = "default_max_order_lines")]
    pub max_order_lines: usize,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            shipping_flat_fee: default_shipping_flat_fee(),
            free_shipping_threshold: default_free_shipping_threshold(),
            max_line_quantity: default_max_line_quantity(),
            max_order_lines: default_max_order_lines(),
        }
    }
}

/// Rate limiting configuration (fixed window).
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Requests allowed per identity+action per window
    #[serde(default = "default_rate_limit_requests")]
    pub requests_per_window: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_rate_limit_requests(),
            window_secs: default_rate_limit_window_secs(),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment ("development", "production", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Bounded timeout for collaborator/database calls, seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    #[validate]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_terminal() -> String {
    "1".to_string()
}
fn default_currency() -> String {
    "978".to_string()
}
fn default_language() -> String {
    "001".to_string()
}
fn default_true() -> bool {
    true
}
fn default_shipping_flat_fee() -> Decimal {
    dec!(15.00)
}
fn default_free_shipping_threshold() -> Decimal {
    dec!(500.00)
}
fn default_max_line_quantity() -> u32 {
    10_000
}
fn default_max_order_lines() -> usize {
    100
}
fn default_rate_limit_requests() -> u32 {
    30
}
fn default_rate_limit_window_secs() -> u64 {
    60
}

/// Loads configuration from `config/{environment}.toml` (when present) with
/// `APP_`-prefixed environment variable overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let base_path = Path::new(CONFIG_DIR).join("default.toml");
    if base_path.exists() {
        builder = builder.add_source(File::from(base_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let config: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(
        environment = %config.environment,
        port = config.port,
        gateway_test = config.gateway.use_test_environment,
        "Configuration loaded"
    );

    Ok(config)
}

/// Initializes tracing with an env-filter; `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let default_directive = format!("storefront_api={},tower_http=info", level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_defaults_match_commercial_terms() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.shipping_flat_fee, dec!(15.00));
        assert_eq!(pricing.free_shipping_threshold, dec!(500.00));
        assert_eq!(pricing.max_line_quantity, 10_000);
        assert_eq!(pricing.max_order_lines, 100);
    }

    #[test]
    fn gateway_url_follows_environment_flag() {
        let mut gateway = GatewayConfig::default();
        assert!(gateway.gateway_url().contains("sis-t"));
        gateway.use_test_environment = false;
        assert_eq!(gateway.gateway_url(), "https://sis.redsys.es/sis/realizarPago");
    }
}
