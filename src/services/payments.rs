//! Redsys payment gateway integration: building signed outbound payment
//! forms and verifying signed inbound notifications.
//!
//! The signature scheme follows the HMAC_SHA256_V1 shape: a per-order key is
//! derived from the merchant secret and the order reference, then the
//! base64-encoded parameter envelope is MACed with that key. The signature
//! therefore binds both the envelope and the order reference, and the secret
//! itself never appears in any payload.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use utoipa::ToSchema;

use crate::config::GatewayConfig;
use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Signature scheme tag sent alongside every signed envelope.
pub const SIGNATURE_VERSION: &str = "HMAC_SHA256_V1";

/// Authorization transaction type in the gateway protocol.
const TRANSACTION_TYPE_AUTHORIZATION: &str = "0";

/// Gateway bound on the order reference length.
const ORDER_REF_MAX_LEN: usize = 12;

/// Fixed outbound parameter set. Every field participates in the signature,
/// so this is a closed struct rather than a map: a silently-dropped field
/// would be a security defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantParameters {
    #[serde(rename = "Ds_Merchant_Amount")]
    pub amount: String,
    #[serde(rename = "Ds_Merchant_Order")]
    pub order: String,
    #[serde(rename = "Ds_Merchant_MerchantCode")]
    pub merchant_code: String,
    #[serde(rename = "Ds_Merchant_Currency")]
    pub currency: String,
    #[serde(rename = "Ds_Merchant_TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Ds_Merchant_Terminal")]
    pub terminal: String,
    #[serde(rename = "Ds_Merchant_MerchantURL")]
    pub merchant_url: String,
    #[serde(rename = "Ds_Merchant_UrlOK")]
    pub url_ok: String,
    #[serde(rename = "Ds_Merchant_UrlKO")]
    pub url_ko: String,
    #[serde(rename = "Ds_Merchant_MerchantName")]
    pub merchant_name: String,
    #[serde(rename = "Ds_Merchant_ConsumerLanguage")]
    pub consumer_language: String,
    #[serde(rename = "Ds_Merchant_ProductDescription")]
    pub product_description: String,
}

/// Signed form fields for client-side auto-submission to the gateway.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignedPaymentForm {
    pub signature_version: String,
    pub merchant_parameters: String,
    pub signature: String,
    pub gateway_url: String,
}

/// Outcome of verifying one inbound notification. Pure data; applying it to
/// an order is the payment processing service's job.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    pub is_valid: bool,
    pub response_code: i64,
    pub order_reference: String,
    /// Notified amount in major currency units
    pub amount: Decimal,
    pub merchant_code: String,
    pub is_payment_ok: bool,
}

/// Builds signed payment requests and validates signed notifications.
#[derive(Clone)]
pub struct RedsysGateway {
    config: GatewayConfig,
}

impl RedsysGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn merchant_code(&self) -> &str {
        &self.config.merchant_code
    }

    /// Decoded merchant secret. Missing configuration fails fast here; a
    /// payment request is never silently built unsigned.
    fn secret(&self) -> Result<Vec<u8>, ServiceError> {
        if self.config.secret_key.is_empty() {
            return Err(ServiceError::ConfigurationError(
                "gateway secret key is not configured".to_string(),
            ));
        }
        STANDARD.decode(&self.config.secret_key).map_err(|_| {
            ServiceError::ConfigurationError("gateway secret key is not valid base64".to_string())
        })
    }

    /// Gateway order reference: the numeric order id zero-padded to at
    /// least 4 digits. The protocol bounds references to 4-12 characters
    /// with a numeric prefix; padding covers the lower bound and ids beyond
    /// 12 digits are rejected.
    pub fn order_reference(order_id: i64) -> Result<String, ServiceError> {
        if order_id < 0 {
            return Err(ServiceError::ValidationError(format!(
                "order id must be non-negative, got {}",
                order_id
            )));
        }
        let reference = format!("{:04}", order_id);
        if reference.len() > ORDER_REF_MAX_LEN {
            return Err(ServiceError::ValidationError(format!(
                "order id {} exceeds the gateway reference bound",
                order_id
            )));
        }
        Ok(reference)
    }

    /// Converts a major-unit amount to integer cents, round-to-nearest.
    pub fn amount_to_cents(amount: Decimal) -> Result<i64, ServiceError> {
        if amount.is_sign_negative() {
            return Err(ServiceError::ValidationError(format!(
                "payment amount must not be negative, got {}",
                amount
            )));
        }
        (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("payment amount {} out of range", amount))
            })
    }

    /// Builds the signed payment-initiation form for one order amount.
    pub fn build_payment_request(
        &self,
        order_id: i64,
        amount: Decimal,
        description: &str,
    ) -> Result<SignedPaymentForm, ServiceError> {
        if self.config.merchant_code.is_empty() {
            return Err(ServiceError::ConfigurationError(
                "gateway merchant code is not configured".to_string(),
            ));
        }

        let cents = Self::amount_to_cents(amount)?;
        let order_reference = Self::order_reference(order_id)?;

        let params = MerchantParameters {
            amount: cents.to_string(),
            order: order_reference.clone(),
            merchant_code: self.config.merchant_code.clone(),
            currency: self.config.currency.clone(),
            transaction_type: TRANSACTION_TYPE_AUTHORIZATION.to_string(),
            terminal: self.config.terminal.clone(),
            merchant_url: self.config.notification_url.clone(),
            url_ok: self.config.return_url_ok.clone(),
            url_ko: self.config.return_url_ko.clone(),
            merchant_name: self.config.merchant_name.clone(),
            consumer_language: self.config.consumer_language.clone(),
            product_description: description.to_string(),
        };

        let json = serde_json::to_vec(&params)
            .map_err(|e| ServiceError::InternalError(format!("envelope serialization: {}", e)))?;
        let merchant_parameters = STANDARD.encode(json);
        let signature = STANDARD.encode(self.sign(&order_reference, &merchant_parameters)?);

        Ok(SignedPaymentForm {
            signature_version: SIGNATURE_VERSION.to_string(),
            merchant_parameters,
            signature,
            gateway_url: self.config.gateway_url().to_string(),
        })
    }

    /// Decodes and validates one inbound notification envelope.
    ///
    /// Structurally broken envelopes are an error; a well-formed envelope
    /// with a wrong signature comes back as `is_valid == false`. No I/O and
    /// no state mutation happens here.
    pub fn verify_notification(
        &self,
        merchant_parameters: &str,
        signature: &str,
    ) -> Result<NotificationResult, ServiceError> {
        let decoded = decode_base64_any(merchant_parameters).ok_or_else(|| {
            ServiceError::ValidationError("notification envelope is not valid base64".to_string())
        })?;
        let json: Value = serde_json::from_slice(&decoded).map_err(|_| {
            ServiceError::ValidationError("notification envelope is not valid JSON".to_string())
        })?;

        let order_reference = string_field(&json, "Ds_Order")?;
        let merchant_code = string_field(&json, "Ds_MerchantCode")?;
        let response_code = numeric_field(&json, "Ds_Response")?;
        let amount_cents = numeric_field(&json, "Ds_Amount")?;

        let expected = self.sign(&order_reference, merchant_parameters)?;
        let received = decode_base64_any(signature).unwrap_or_default();
        let is_valid = constant_time_eq(&expected, &received);

        // Gateway convention: response codes 0000-0099 are approved
        // authorizations, everything else is a decline or error
        let is_payment_ok = is_valid && (0..=99).contains(&response_code);

        Ok(NotificationResult {
            is_valid,
            response_code,
            order_reference,
            amount: Decimal::new(amount_cents, 2),
            merchant_code,
            is_payment_ok,
        })
    }

    /// HMAC-SHA256 over the encoded envelope, keyed per order:
    /// key = HMAC(secret, order_reference); tag = HMAC(key, envelope).
    fn sign(&self, order_reference: &str, merchant_parameters: &str) -> Result<Vec<u8>, ServiceError> {
        let secret = self.secret()?;

        let mut key_mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| ServiceError::InternalError(format!("hmac key: {}", e)))?;
        key_mac.update(order_reference.as_bytes());
        let order_key = key_mac.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&order_key)
            .map_err(|e| ServiceError::InternalError(format!("hmac key: {}", e)))?;
        mac.update(merchant_parameters.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// The gateway emits standard base64 on redirects and URL-safe base64 on
/// notifications; accept either, padded or not.
fn decode_base64_any(input: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(input)
        .or_else(|_| URL_SAFE.decode(input))
        .or_else(|_| STANDARD_NO_PAD.decode(input))
        .or_else(|_| URL_SAFE_NO_PAD.decode(input))
        .ok()
}

fn string_field(json: &Value, name: &str) -> Result<String, ServiceError> {
    json.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("notification is missing field {}", name))
        })
}

/// Numeric notification fields arrive as strings ("0000", "27000") but some
/// gateway emulators send bare numbers; accept both.
fn numeric_field(json: &Value, name: &str) -> Result<i64, ServiceError> {
    let value = json.get(name).ok_or_else(|| {
        ServiceError::ValidationError(format!("notification is missing field {}", name))
    })?;
    match value {
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            ServiceError::ValidationError(format!("notification field {} is not numeric", name))
        }),
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            ServiceError::ValidationError(format!("notification field {} is not numeric", name))
        }),
        _ => Err(ServiceError::ValidationError(format!(
            "notification field {} is not numeric",
            name
        ))),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
