use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::entities::tariff_rule::CustomerGroup;
use crate::errors::ServiceError;
use crate::services::catalog::ProductCatalog;
use crate::services::pricing;

/// Client-submitted order line. Untrusted: deliberately has no price field,
/// so a tampered client price cannot even be parsed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Server-derived order line with catalog snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_subtotal: Decimal,
}

/// Authoritative order totals, recomputed server-side from catalog truth.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

/// Recomputes order totals from the catalog for a customer group.
/// Pure over fetched data; persistence belongs to the order service.
#[derive(Clone)]
pub struct OrderPricingService {
    catalog: Arc<dyn ProductCatalog>,
    config: PricingConfig,
}

impl OrderPricingService {
    pub fn new(catalog: Arc<dyn ProductCatalog>, config: PricingConfig) -> Self {
        Self { catalog, config }
    }

    /// Prices a cart submission. All-or-nothing: any unknown product or
    /// shape violation aborts the whole order before anything is persisted.
    /// Lines are accumulated in submitted order so the stored line sequence
    /// is auditable.
    #[instrument(skip(self, lines), fields(group = ?group, line_count = lines.len()))]
    pub async fn price_order(
        &self,
        group: CustomerGroup,
        lines: &[CartLine],
    ) -> Result<PricedOrder, ServiceError> {
        // Shape checks come before any catalog work
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one line".to_string(),
            ));
        }
        if lines.len() > self.config.max_order_lines {
            return Err(ServiceError::TooManyLines(format!(
                "order has {} lines, maximum is {}",
                lines.len(),
                self.config.max_order_lines
            )));
        }
        for line in lines {
            if line.quantity == 0 || line.quantity > self.config.max_line_quantity {
                return Err(ServiceError::InvalidQuantity(format!(
                    "quantity must be between 1 and {}, got {}",
                    self.config.max_line_quantity, line.quantity
                )));
            }
        }

        let rules = self.catalog.get_tariff_rules(group).await?;

        let mut priced = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;

        for line in lines {
            let product = self
                .catalog
                .get_product(line.product_id)
                .await?
                .ok_or(ServiceError::ProductNotFound(line.product_id))?;

            let discount = pricing::resolve_discount(&rules, product.id, product.category_id);
            let unit_price = pricing::unit_price(product.base_price, discount);
            let line_subtotal = pricing::line_subtotal(unit_price, line.quantity);
            subtotal += line_subtotal;

            priced.push(PricedLine {
                product_id: product.id,
                product_name: product.name,
                sku: product.sku,
                quantity: line.quantity,
                unit_price,
                line_subtotal,
            });
        }

        let shipping_cost = pricing::shipping_cost(
            subtotal,
            self.config.shipping_flat_fee,
            self.config.free_shipping_threshold,
        );
        let total = pricing::round2(subtotal + shipping_cost);

        Ok(PricedOrder {
            lines: priced,
            subtotal,
            shipping_cost,
            total,
        })
    }
}
