//! Pure pricing primitives: discount resolution, unit-price calculation and
//! shipping. No I/O here; everything is deterministic over its inputs so the
//! whole module is safe to call concurrently and trivially testable.

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::entities::tariff_rule;

const CURRENCY_DP: u32 = 2;

/// Standard currency rounding: half-up to 2 decimal places.
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolves the discount percentage for a product within one customer
/// group's rule set. First match wins, no aggregation:
///
/// 1. rule scoped to this product
/// 2. rule scoped to this category (and no product)
/// 3. group-global rule (neither product nor category)
///
/// No matching rule is a valid state and yields zero. Rules carrying both a
/// product and a category violate the scope invariant and are skipped.
pub fn resolve_discount(
    rules: &[tariff_rule::Model],
    product_id: Uuid,
    category_id: Option<Uuid>,
) -> Decimal {
    let valid = || {
        rules
            .iter()
            .filter(|r| !(r.product_id.is_some() && r.category_id.is_some()))
    };

    if let Some(rule) = valid().find(|r| r.product_id == Some(product_id)) {
        return rule.discount_percent;
    }

    if let Some(category) = category_id {
        if let Some(rule) = valid().find(|r| r.product_id.is_none() && r.category_id == Some(category))
        {
            return rule.discount_percent;
        }
    }

    valid()
        .find(|r| r.product_id.is_none() && r.category_id.is_none())
        .map(|r| r.discount_percent)
        .unwrap_or(Decimal::ZERO)
}

/// Applies a percentage discount to a base price, rounding half-up to 2dp.
/// Discounts outside [0, 100] come from malformed tariff data and are
/// clamped rather than rejected.
pub fn unit_price(base_price: Decimal, discount_percent: Decimal) -> Decimal {
    let discount = discount_percent
        .max(Decimal::ZERO)
        .min(Decimal::ONE_HUNDRED);
    round2(base_price * (Decimal::ONE - discount / Decimal::ONE_HUNDRED))
}

/// Line subtotal for a quantity of units at an already-rounded unit price.
pub fn line_subtotal(unit_price: Decimal, quantity: u32) -> Decimal {
    round2(unit_price * Decimal::from(quantity))
}

/// Shipping cost over the pre-tax subtotal: a flat fee below the
/// free-shipping threshold, zero at or above it.
pub fn shipping_cost(subtotal: Decimal, flat_fee: Decimal, free_threshold: Decimal) -> Decimal {
    if subtotal >= free_threshold {
        Decimal::ZERO
    } else {
        flat_fee
    }
}
