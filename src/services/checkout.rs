use tracing::{info, instrument};

use crate::entities::order::{self, PaymentMethod};
use crate::entities::tariff_rule::CustomerGroup;
use crate::errors::ServiceError;
use crate::rate_limiter::RateLimiter;
use crate::services::order_pricing::{CartLine, OrderPricingService, PricedOrder};
use crate::services::orders::{OrderDraft, OrderService};

/// One checkout submission. Lines carry product ids and quantities only;
/// all prices come from the catalog on this side.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_group: CustomerGroup,
    pub payment_method: PaymentMethod,
    pub lines: Vec<CartLine>,
    pub shipping_address: String,
    pub billing_address: String,
}

#[derive(Debug)]
pub struct CheckoutResult {
    pub order: order::Model,
    pub priced: PricedOrder,
}

/// Checkout orchestration: limit, price, persist. Pricing failures abort
/// before anything is written.
#[derive(Clone)]
pub struct CheckoutService {
    pricing: OrderPricingService,
    orders: OrderService,
    rate_limiter: RateLimiter,
}

impl CheckoutService {
    pub fn new(
        pricing: OrderPricingService,
        orders: OrderService,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            pricing,
            orders,
            rate_limiter,
        }
    }

    #[instrument(skip(self, request), fields(group = ?request.customer_group, lines = request.lines.len()))]
    pub async fn checkout(
        &self,
        identity: &str,
        request: CheckoutRequest,
    ) -> Result<CheckoutResult, ServiceError> {
        self.rate_limiter.check(identity, "checkout").await?;

        let priced = self
            .pricing
            .price_order(request.customer_group, &request.lines)
            .await?;

        let order = self
            .orders
            .create_order(OrderDraft {
                customer_group: request.customer_group,
                payment_method: request.payment_method,
                shipping_address: request.shipping_address,
                billing_address: request.billing_address,
                priced: priced.clone(),
            })
            .await?;

        info!(order_id = order.id, total = %order.total, "Checkout completed");
        Ok(CheckoutResult { order, priced })
    }
}
