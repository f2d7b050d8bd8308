use tracing::{info, instrument, warn};

use crate::entities::order::{self, OrderState, PaymentMethod};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::orders::OrderService;
use crate::services::payments::{NotificationResult, RedsysGateway, SignedPaymentForm};

/// Outcome reported back to the gateway for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Approved authorization, order moved to paid.
    Paid,
    /// Declined authorization; recorded, order untouched.
    Declined,
}

/// Glue between the gateway protocol and the order state machine: issues
/// payment forms for orders awaiting payment and applies inbound
/// notifications to them.
#[derive(Clone)]
pub struct PaymentProcessingService {
    gateway: RedsysGateway,
    orders: OrderService,
    event_sender: EventSender,
}

impl PaymentProcessingService {
    pub fn new(gateway: RedsysGateway, orders: OrderService, event_sender: EventSender) -> Self {
        Self {
            gateway,
            orders,
            event_sender,
        }
    }

    /// Builds the signed redirect form for a card order awaiting payment.
    /// The amount signed is the stored order total, never a client value.
    #[instrument(skip(self))]
    pub async fn payment_form(&self, order_id: i64) -> Result<SignedPaymentForm, ServiceError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;

        if order.payment_method != PaymentMethod::Card {
            return Err(ServiceError::ValidationError(format!(
                "order {} is not a card order",
                order_id
            )));
        }
        if order.state != OrderState::ApprovedPendingPayment {
            return Err(ServiceError::StateConflict(format!(
                "order {} is in state {:?}, not awaiting payment",
                order_id, order.state
            )));
        }

        self.gateway
            .build_payment_request(order.id, order.total, &format!("Order {}", order.id))
    }

    /// Applies one verified notification. Checks run strictly in order:
    /// signature, order lookup, order state, amount, merchant code. A decline
    /// with a valid signature is a recorded outcome, not an error.
    #[instrument(skip(self, merchant_parameters, signature))]
    pub async fn handle_notification(
        &self,
        merchant_parameters: &str,
        signature: &str,
    ) -> Result<NotificationOutcome, ServiceError> {
        let result = self
            .gateway
            .verify_notification(merchant_parameters, signature)?;

        if !result.is_valid {
            warn!(order_reference = %result.order_reference, "Notification signature mismatch");
            return Err(ServiceError::InvalidSignature);
        }

        let order = self
            .orders
            .get_order_by_reference(&result.order_reference)
            .await?;

        self.apply_result(&order, &result).await
    }

    async fn apply_result(
        &self,
        order: &order::Model,
        result: &NotificationResult,
    ) -> Result<NotificationOutcome, ServiceError> {
        if order.state != OrderState::ApprovedPendingPayment {
            return Err(ServiceError::StateConflict(format!(
                "order {} is in state {:?}, not awaiting payment",
                order.id, order.state
            )));
        }

        // Integer-cent comparison sidesteps any decimal representation drift
        let expected_cents = RedsysGateway::amount_to_cents(order.total)?;
        let notified_cents = RedsysGateway::amount_to_cents(result.amount)?;
        if expected_cents != notified_cents {
            return Err(ServiceError::AmountMismatch {
                expected: expected_cents,
                notified: notified_cents,
            });
        }

        if result.merchant_code != self.gateway.merchant_code() {
            return Err(ServiceError::MerchantMismatch);
        }

        if result.is_payment_ok {
            let reference = format!("{}/{:04}", result.order_reference, result.response_code);
            self.orders.mark_paid(order.id, &reference).await?;
            info!(order_id = order.id, %reference, "Payment confirmed");
            Ok(NotificationOutcome::Paid)
        } else {
            info!(
                order_id = order.id,
                response_code = result.response_code,
                "Payment declined by gateway"
            );
            self.event_sender
                .send(Event::PaymentDeclined {
                    order_id: order.id,
                    response_code: result.response_code,
                })
                .await;
            Ok(NotificationOutcome::Declined)
        }
    }
}
