use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::tariff_rule::CustomerGroup;

/// Order lifecycle state.
///
/// Canonical machine: `Requested`/`QuoteRequested` →
/// `ApprovedPendingPayment` → `Paid` → `Shipped`, with `Cancelled` reachable
/// from any non-terminal state. Payment notifications only ever act on
/// `ApprovedPendingPayment`; `Paid` and `Shipped` are terminal for them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[sea_orm(string_value = "requested")]
    Requested,
    #[sea_orm(string_value = "quote_requested")]
    QuoteRequested,
    #[sea_orm(string_value = "approved_pending_payment")]
    ApprovedPendingPayment,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderState {
    /// Whether `next` is a legal forward transition from `self`.
    /// Transitions are monotonic; the only backward-looking move is into
    /// `Cancelled`, and `Cancelled` itself is terminal.
    pub fn can_transition_to(self, next: OrderState) -> bool {
        use OrderState::*;
        match (self, next) {
            (Cancelled, _) => false,
            (_, Cancelled) => !matches!(self, Shipped),
            (Requested, ApprovedPendingPayment) => true,
            (QuoteRequested, ApprovedPendingPayment) => true,
            (ApprovedPendingPayment, Paid) => true,
            (Paid, Shipped) => true,
            _ => false,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "card")]
    Card,
}

/// Persisted order. Totals are server-derived at creation time and satisfy
/// `total == round2(subtotal + shipping_cost)`. Orders are never deleted;
/// cancellation is a state, not a removal.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Order)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Numeric id; also the seed of the gateway order reference
    #[sea_orm(primary_key)]
    pub id: i64,
    pub customer_group: CustomerGroup,
    pub state: OrderState,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    /// Gateway reference + response code, set when the order is paid
    pub payment_reference: Option<String>,
    pub shipping_address: String,
    pub billing_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
