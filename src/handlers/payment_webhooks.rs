use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::services::payment_processing::NotificationOutcome;
use crate::services::payments::SIGNATURE_VERSION;
use crate::AppState;

#[derive(Debug)]
struct NotificationFields {
    signature_version: String,
    merchant_parameters: String,
    signature: String,
}

/// The gateway posts `application/x-www-form-urlencoded`; emulators and
/// retries sometimes post JSON with the same field names. Accept both.
fn parse_notification(headers: &HeaderMap, body: &[u8]) -> Result<NotificationFields, ServiceError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        let json: Value = serde_json::from_slice(body).map_err(|_| {
            ServiceError::ValidationError("notification body is not valid JSON".to_string())
        })?;
        let field = |name: &str| {
            json.get(name)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("notification is missing field {}", name))
                })
        };
        return Ok(NotificationFields {
            signature_version: field("Ds_SignatureVersion")?,
            merchant_parameters: field("Ds_MerchantParameters")?,
            signature: field("Ds_Signature")?,
        });
    }

    let mut signature_version = None;
    let mut merchant_parameters = None;
    let mut signature = None;
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "Ds_SignatureVersion" => signature_version = Some(value.into_owned()),
            "Ds_MerchantParameters" => merchant_parameters = Some(value.into_owned()),
            "Ds_Signature" => signature = Some(value.into_owned()),
            _ => {}
        }
    }

    let missing = |name: &str| {
        ServiceError::ValidationError(format!("notification is missing field {}", name))
    };
    Ok(NotificationFields {
        signature_version: signature_version.ok_or_else(|| missing("Ds_SignatureVersion"))?,
        merchant_parameters: merchant_parameters.ok_or_else(|| missing("Ds_MerchantParameters"))?,
        signature: signature.ok_or_else(|| missing("Ds_Signature"))?,
    })
}

/// POST /api/v1/payments/webhook
///
/// Inbound payment notification endpoint. Responds with a plain `OK` body
/// for every processed notification, approval or decline alike; the gateway
/// retries anything else. Errors map to statuses the gateway treats as
/// permanent failures (400/403/404/409).
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Notification processed"),
        (status = 400, description = "Malformed notification or amount mismatch"),
        (status = 403, description = "Signature or merchant mismatch"),
        (status = 404, description = "Unknown order reference"),
        (status = 409, description = "Order not awaiting payment"),
    ),
    tag = "payments"
)]
#[instrument(skip(state, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ServiceError> {
    let fields = parse_notification(&headers, &body)?;

    if fields.signature_version != SIGNATURE_VERSION {
        warn!(version = %fields.signature_version, "Unsupported notification signature version");
        return Err(ServiceError::ValidationError(format!(
            "unsupported signature version {}",
            fields.signature_version
        )));
    }

    let outcome = state
        .services
        .payments
        .handle_notification(&fields.merchant_parameters, &fields.signature)
        .await?;

    match outcome {
        NotificationOutcome::Paid => info!("Payment notification applied"),
        NotificationOutcome::Declined => info!("Payment decline recorded"),
    }
    Ok((StatusCode::OK, "OK"))
}
