use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::entities::order::{self, OrderState, PaymentMethod};
use crate::entities::order_item;
use crate::entities::tariff_rule::CustomerGroup;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::order_pricing::PricedOrder;

/// Everything needed to persist a priced order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_group: CustomerGroup,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub billing_address: String,
    pub priced: PricedOrder,
}

/// Hard cap on list page size; arbitrary client-supplied limits must not
/// turn one request into a full-table fetch.
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order persistence and state transitions. The state machine lives here:
/// every mutation goes through a conditional update keyed on the current
/// state, so concurrent writers cannot double-transition an order.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Persists an order and its line snapshots in one transaction.
    /// Pricing happened before this call; an abort here leaves nothing
    /// behind. Card orders start directly in `ApprovedPendingPayment`
    /// (awaiting the gateway), bank-transfer orders in `Requested`.
    #[instrument(skip(self, draft), fields(group = ?draft.customer_group, method = ?draft.payment_method))]
    pub async fn create_order(&self, draft: OrderDraft) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let initial_state = match draft.payment_method {
            PaymentMethod::Card => OrderState::ApprovedPendingPayment,
            PaymentMethod::BankTransfer => OrderState::Requested,
        };

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: NotSet,
            customer_group: Set(draft.customer_group),
            state: Set(initial_state),
            payment_method: Set(draft.payment_method),
            subtotal: Set(draft.priced.subtotal),
            shipping_cost: Set(draft.priced.shipping_cost),
            total: Set(draft.priced.total),
            payment_reference: Set(None),
            shipping_address: Set(draft.shipping_address),
            billing_address: Set(draft.billing_address),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for (index, line) in draft.priced.lines.iter().enumerate() {
            order_item::ActiveModel {
                id: NotSet,
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                sku: Set(line.sku.clone()),
                quantity: Set(line.quantity as i32),
                unit_price: Set(line.unit_price),
                line_subtotal: Set(line.line_subtotal),
                line_no: Set(index as i32),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(order_id = order.id, total = %order.total, "Order created");
        self.event_sender.send(Event::OrderCreated(order.id)).await;

        Ok(order)
    }

    pub async fn get_order(&self, order_id: i64) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find_by_id(order_id).one(&*self.db).await?)
    }

    pub async fn get_order_items(
        &self,
        order_id: i64,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::LineNo)
            .all(&*self.db)
            .await?)
    }

    /// Looks an order up by its gateway reference (zero-padded numeric id).
    pub async fn get_order_by_reference(
        &self,
        reference: &str,
    ) -> Result<order::Model, ServiceError> {
        let order_id: i64 = reference
            .trim()
            .parse()
            .map_err(|_| ServiceError::OrderNotFound(reference.to_string()))?;
        self.get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(reference.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, page: u64, per_page: u64) -> Result<OrderListPage, ServiceError> {
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Moves a `Requested`/`QuoteRequested` order into
    /// `ApprovedPendingPayment` (back-office approval).
    #[instrument(skip(self))]
    pub async fn approve_for_payment(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        let rows = order::Entity::update_many()
            .col_expr(order::Column::State, Expr::value(OrderState::ApprovedPendingPayment))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(
                order::Column::State
                    .is_in([OrderState::Requested, OrderState::QuoteRequested]),
            )
            .exec(&*self.db)
            .await?
            .rows_affected;

        let order = self.require_order(order_id).await?;
        if rows == 0 {
            return Err(ServiceError::StateConflict(format!(
                "order {} cannot be approved from state {:?}",
                order_id, order.state
            )));
        }

        self.event_sender
            .send(Event::OrderApprovedForPayment(order_id))
            .await;
        Ok(order)
    }

    /// Transitions an order to `Paid`, recording the payment reference.
    ///
    /// The `WHERE state = approved_pending_payment` predicate is the
    /// per-order mutual exclusion: two concurrent notifications cannot both
    /// win the update, the loser surfaces as a state conflict.
    #[instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        order_id: i64,
        payment_reference: &str,
    ) -> Result<order::Model, ServiceError> {
        let rows = order::Entity::update_many()
            .col_expr(order::Column::State, Expr::value(OrderState::Paid))
            .col_expr(
                order::Column::PaymentReference,
                Expr::value(Some(payment_reference.to_string())),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::State.eq(OrderState::ApprovedPendingPayment))
            .exec(&*self.db)
            .await?
            .rows_affected;

        let order = self.require_order(order_id).await?;
        if rows == 0 {
            warn!(order_id, state = ?order.state, "Payment notification for order not awaiting payment");
            return Err(ServiceError::StateConflict(format!(
                "order {} is in state {:?}, not awaiting payment",
                order_id, order.state
            )));
        }

        self.event_sender
            .send(Event::OrderPaid {
                order_id,
                payment_reference: payment_reference.to_string(),
            })
            .await;
        Ok(order)
    }

    /// Transitions a `Paid` order to `Shipped`.
    #[instrument(skip(self))]
    pub async fn mark_shipped(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        let rows = order::Entity::update_many()
            .col_expr(order::Column::State, Expr::value(OrderState::Shipped))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::State.eq(OrderState::Paid))
            .exec(&*self.db)
            .await?
            .rows_affected;

        let order = self.require_order(order_id).await?;
        if rows == 0 {
            return Err(ServiceError::StateConflict(format!(
                "order {} cannot ship from state {:?}",
                order_id, order.state
            )));
        }

        self.event_sender.send(Event::OrderShipped(order_id)).await;
        Ok(order)
    }

    /// Cancels an order. Orders are never deleted; cancellation is the
    /// terminal audit state.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        let current = self.require_order(order_id).await?;
        if !current.state.can_transition_to(OrderState::Cancelled) {
            return Err(ServiceError::StateConflict(format!(
                "order {} cannot be cancelled from state {:?}",
                order_id, current.state
            )));
        }

        let rows = order::Entity::update_many()
            .col_expr(order::Column::State, Expr::value(OrderState::Cancelled))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::State.eq(current.state))
            .exec(&*self.db)
            .await?
            .rows_affected;

        if rows == 0 {
            return Err(ServiceError::StateConflict(format!(
                "order {} changed state concurrently",
                order_id
            )));
        }

        info!(order_id, "Order cancelled");
        self.event_sender.send(Event::OrderCancelled(order_id)).await;
        self.require_order(order_id).await
    }

    async fn require_order(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        self.get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))
    }
}
