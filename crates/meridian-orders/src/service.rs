//! # Order Service
//!
//! The caller-facing operations of the order engine. Each operation opens
//! one transaction, runs the pure core logic against the repositories, and
//! commits - or returns an error with nothing applied.
//!
//! ## Confirmation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  confirm(order_id)                                                      │
//! │                                                                         │
//! │  1. Load order         reject unless DRAFT, reject empty carts         │
//! │  2. Eligibility        every line vs customer age - all or nothing     │
//! │  3. Clamp              requested quantities vs live stock (warnings)   │
//! │  4. Lock in stock      conditional decrements, per line                │
//! │  5. Recompute total    Σ price × clamped quantity                      │
//! │  6. Settle bonus       debit/credit the loyalty ledger                 │
//! │  7. Cashback           5% of the net total, to the same account        │
//! │  8. Persist            versioned update → PROCESSING                   │
//! │                                                                         │
//! │  Any failure before step 8 drops the transaction: no stock, ledger     │
//! │  or order mutation survives.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use meridian_core::error::CoreError;
use meridian_core::{
    cart, eligibility, settlement, Customer, LoyaltyAccount, Money, Order, OrderStatus, Product,
};
use meridian_db::repository::{customer, generate_id, loyalty, order, product};
use meridian_db::{Database, DebitOutcome, StockAdjustment, UpdateOutcome};

use crate::error::ServiceResult;
use crate::snapshot::OrderSnapshot;

// =============================================================================
// Order Service
// =============================================================================

/// The order lifecycle engine.
///
/// Cheap to clone; holds only the database handle.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
}

impl OrderService {
    /// Creates a new service over the given database.
    pub fn new(db: Database) -> Self {
        OrderService { db }
    }

    // =========================================================================
    // Cart Operations (DRAFT only)
    // =========================================================================

    /// Returns the customer's draft order, creating one if none exists.
    ///
    /// A customer has at most one draft at a time; repeated calls return
    /// the same cart.
    pub async fn create_or_get_draft(&self, customer_id: &str) -> ServiceResult<OrderSnapshot> {
        debug!(customer_id = %customer_id, "create_or_get_draft");

        let mut tx = self.db.begin().await?;

        customer::get(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        if let Some(existing) = order::find_draft_for_customer(&mut *tx, customer_id).await? {
            return Ok(OrderSnapshot::from(&existing));
        }

        let now = Utc::now();
        let draft = Order {
            id: generate_id(),
            customer_id: customer_id.to_string(),
            lines: BTreeMap::new(),
            created_on: now.date_naive(),
            total_cost_cents: 0,
            bonus_used_cents: 0,
            status: OrderStatus::Draft,
            version: 0,
            updated_at: now,
        };
        order::insert(&mut *tx, &draft).await?;
        tx.commit().await?;

        info!(order_id = %draft.id, customer_id = %customer_id, "Draft order created");
        Ok(OrderSnapshot::from(&draft))
    }

    /// Merges requested quantities into a draft cart.
    ///
    /// Quantities over available stock are clamped and reported through the
    /// snapshot's warning list; a product with no stock at all is an error.
    pub async fn add_to_cart(
        &self,
        order_id: &str,
        requested: &BTreeMap<String, i64>,
    ) -> ServiceResult<OrderSnapshot> {
        debug!(order_id = %order_id, lines = requested.len(), "add_to_cart");

        if requested.is_empty() {
            return Err(CoreError::Validation(
                meridian_core::ValidationError::Required {
                    field: "requested quantities".to_string(),
                },
            )
            .into());
        }

        let mut tx = self.db.begin().await?;

        let mut order = load_order(&mut *tx, order_id).await?;

        let mut warnings = Vec::new();
        for (product_id, &quantity) in requested {
            let product = product::get(&mut *tx, product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

            if let Some(warning) = cart::add_line(&mut order, &product, quantity)? {
                warnings.push(warning);
            }
        }

        recompute_and_resettle(&mut *tx, &mut order).await?;
        persist(&mut *tx, &mut order).await?;
        tx.commit().await?;

        Ok(OrderSnapshot::of(&order, warnings))
    }

    /// Removes a line from a draft cart and recomputes the total.
    pub async fn remove_from_cart(
        &self,
        order_id: &str,
        product_id: &str,
    ) -> ServiceResult<OrderSnapshot> {
        debug!(order_id = %order_id, product_id = %product_id, "remove_from_cart");

        let mut tx = self.db.begin().await?;

        let mut order = load_order(&mut *tx, order_id).await?;
        cart::remove_line(&mut order, product_id)?;

        recompute_and_resettle(&mut *tx, &mut order).await?;
        persist(&mut *tx, &mut order).await?;
        tx.commit().await?;

        Ok(OrderSnapshot::from(&order))
    }

    // =========================================================================
    // Lifecycle Transitions
    // =========================================================================

    /// Confirms a draft order: DRAFT → PROCESSING.
    ///
    /// Locks in stock, recomputes the total, settles the loyalty bonus and
    /// pays cashback, all atomically. Clamp warnings ride on the snapshot.
    pub async fn confirm(&self, order_id: &str) -> ServiceResult<OrderSnapshot> {
        debug!(order_id = %order_id, "confirm");

        let mut tx = self.db.begin().await?;

        let mut order = load_order(&mut *tx, order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Processing,
            }
            .into());
        }
        if order.is_empty() {
            return Err(CoreError::EmptyOrder {
                order_id: order.id.clone(),
            }
            .into());
        }

        let owner = customer::get(&mut *tx, &order.customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(order.customer_id.clone()))?;

        let line_ids: Vec<String> = order.lines.keys().cloned().collect();
        let products = product::get_many(&mut *tx, &line_ids).await?;

        // Eligibility first: an age failure aborts before any stock moves.
        check_eligibility(&owner, &order, &products)?;

        // Clamp to live stock; a cart clamped to nothing cannot confirm.
        let (clamped, warnings) = cart::clamp_lines_to_stock(&order.lines, &products)?;
        if clamped.is_empty() {
            return Err(CoreError::EmptyOrder {
                order_id: order.id.clone(),
            }
            .into());
        }

        // Lock in stock line by line. The clamp read and these decrements
        // share one transaction, so a refused decrement means another
        // writer slipped in between - surfaced as a retryable conflict.
        for (product_id, &quantity) in &clamped {
            match product::adjust_stock(&mut *tx, product_id, -quantity).await? {
                StockAdjustment::Adjusted(_) => {}
                StockAdjustment::NotFound => {
                    return Err(CoreError::ProductNotFound(product_id.clone()).into())
                }
                StockAdjustment::WouldGoNegative { .. } => {
                    return Err(CoreError::Conflict {
                        entity: "Product",
                        id: product_id.clone(),
                    }
                    .into())
                }
            }
        }

        order.lines = clamped;
        let final_cost = cart::priced_total(&order.lines, &products)?;

        // Settle the bonus against the recomputed total, then pay cashback
        // on what is actually charged.
        let account = loyalty::get_by_customer(&mut *tx, &order.customer_id).await?;
        apply_settlement(&mut *tx, account.as_ref(), &mut order, final_cost).await?;

        if let Some(account) = &account {
            let cashback = settlement::cashback(order.total_cost());
            if cashback.is_positive() {
                loyalty::credit(&mut *tx, &account.id, cashback.cents())
                    .await?
                    .ok_or_else(|| CoreError::AccountNotFound(account.id.clone()))?;
            }
        }

        order.status = OrderStatus::Processing;
        persist(&mut *tx, &mut order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            total = %order.total_cost(),
            bonus_used = %order.bonus_used(),
            clamped_lines = warnings.len(),
            "Order confirmed"
        );
        Ok(OrderSnapshot::of(&order, warnings))
    }

    /// Moves an order to a new status.
    ///
    /// PROCESSING routes through [`OrderService::confirm`] and CANCELED
    /// through [`OrderService::cancel`], so their side effects apply no
    /// matter which entry point a caller uses. SHIPPED and DELIVERED are
    /// pure advances with no stock or ledger effect.
    pub async fn set_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> ServiceResult<OrderSnapshot> {
        debug!(order_id = %order_id, status = %status, "set_status");

        match status {
            OrderStatus::Processing => return self.confirm(order_id).await,
            OrderStatus::Canceled => return self.cancel(order_id).await,
            _ => {}
        }

        let mut tx = self.db.begin().await?;

        let mut order = load_order(&mut *tx, order_id).await?;
        if !order.status.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: status,
            }
            .into());
        }

        order.status = status;
        persist(&mut *tx, &mut order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, status = %status, "Order status advanced");
        Ok(OrderSnapshot::from(&order))
    }

    /// Cancels a non-terminal order.
    ///
    /// Restores any stock locked in at confirmation and returns any held
    /// bonus to the loyalty account. Canceling a DRAFT touches neither.
    pub async fn cancel(&self, order_id: &str) -> ServiceResult<OrderSnapshot> {
        debug!(order_id = %order_id, "cancel");

        let mut tx = self.db.begin().await?;

        let mut order = load_order(&mut *tx, order_id).await?;
        if !order.status.can_transition_to(OrderStatus::Canceled) {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Canceled,
            }
            .into());
        }

        // Stock was only ever decremented once the order reached PROCESSING.
        let stock_committed = matches!(
            order.status,
            OrderStatus::Processing | OrderStatus::Shipped
        );
        if stock_committed {
            for (product_id, &quantity) in &order.lines {
                match product::adjust_stock(&mut *tx, product_id, quantity).await? {
                    StockAdjustment::Adjusted(_) => {}
                    StockAdjustment::NotFound => {
                        return Err(CoreError::ProductNotFound(product_id.clone()).into())
                    }
                    StockAdjustment::WouldGoNegative { .. } => {
                        // A restore adds a positive delta; the guard can only
                        // refuse it if the row changed under us.
                        return Err(CoreError::Conflict {
                            entity: "Product",
                            id: product_id.clone(),
                        }
                        .into());
                    }
                }
            }
        }

        // Reverse the held bonus and put the pre-bonus total back on the
        // record, so total + bonus_used still equals the priced sum.
        if order.bonus_used_cents > 0 {
            let account = loyalty::get_by_customer(&mut *tx, &order.customer_id)
                .await?
                .ok_or_else(|| CoreError::AccountNotFound(order.customer_id.clone()))?;
            loyalty::credit(&mut *tx, &account.id, order.bonus_used_cents)
                .await?
                .ok_or_else(|| CoreError::AccountNotFound(account.id.clone()))?;

            order.total_cost_cents += order.bonus_used_cents;
            order.bonus_used_cents = 0;
        }

        order.status = OrderStatus::Canceled;
        persist(&mut *tx, &mut order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, stock_restored = stock_committed, "Order canceled");
        Ok(OrderSnapshot::from(&order))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetches a single order.
    pub async fn order(&self, order_id: &str) -> ServiceResult<OrderSnapshot> {
        let mut conn = self.db.pool().acquire().await.map_err(meridian_db::DbError::from)?;
        let order = load_order(&mut *conn, order_id).await?;
        Ok(OrderSnapshot::from(&order))
    }

    /// Lists a customer's orders, newest first.
    pub async fn orders_for_customer(
        &self,
        customer_id: &str,
    ) -> ServiceResult<Vec<OrderSnapshot>> {
        let mut conn = self.db.pool().acquire().await.map_err(meridian_db::DbError::from)?;
        let orders = order::list_by_customer(&mut *conn, customer_id).await?;
        Ok(orders.iter().map(OrderSnapshot::from).collect())
    }

    /// Lists all orders currently in a status.
    pub async fn orders_with_status(
        &self,
        status: OrderStatus,
    ) -> ServiceResult<Vec<OrderSnapshot>> {
        let mut conn = self.db.pool().acquire().await.map_err(meridian_db::DbError::from)?;
        let orders = order::list_by_status(&mut *conn, status).await?;
        Ok(orders.iter().map(OrderSnapshot::from).collect())
    }

    // =========================================================================
    // Ownership Maintenance
    // =========================================================================

    /// Moves a terminal order to a different owner.
    ///
    /// Used to park the history of deleted customers on the sentinel
    /// account. Deliberately outside the lifecycle invariants: it never
    /// touches stock, totals or the ledger.
    pub async fn reassign_owner(
        &self,
        order_id: &str,
        customer_id: &str,
    ) -> ServiceResult<OrderSnapshot> {
        debug!(order_id = %order_id, customer_id = %customer_id, "reassign_owner");

        let mut tx = self.db.begin().await?;

        let order = load_order(&mut *tx, order_id).await?;
        if !order.status.is_terminal() {
            return Err(CoreError::InvalidState {
                order_id: order.id.clone(),
                status: order.status,
            }
            .into());
        }

        customer::get(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        order::reassign_owner(&mut *tx, order_id, customer_id).await?;
        let reassigned = load_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        Ok(OrderSnapshot::from(&reassigned))
    }

    /// Retires a customer account.
    ///
    /// Refused while the customer still has orders in flight. Otherwise
    /// cancels any leftover draft cart, deletes the loyalty account, parks
    /// the historical orders on the sentinel account and deletes the
    /// customer row.
    pub async fn retire_customer(&self, customer_id: &str) -> ServiceResult<()> {
        debug!(customer_id = %customer_id, "retire_customer");

        let mut tx = self.db.begin().await?;

        let retiring = customer::get(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        let sentinel = customer::ensure_sentinel(&mut *tx).await?;
        if retiring.id == sentinel.id {
            return Err(CoreError::RetireBlocked {
                customer_id: customer_id.to_string(),
                reason: "the sentinel account cannot be retired".to_string(),
            }
            .into());
        }

        if order::has_active_for_customer(&mut *tx, customer_id).await? {
            return Err(CoreError::RetireBlocked {
                customer_id: customer_id.to_string(),
                reason: "customer has orders in flight".to_string(),
            }
            .into());
        }

        // A leftover draft cart never committed stock or bonus; cancel it
        // so every remaining order is terminal before the reassignment.
        for mut draft in order::list_by_customer(&mut *tx, customer_id)
            .await?
            .into_iter()
            .filter(|o| o.status == OrderStatus::Draft)
        {
            draft.status = OrderStatus::Canceled;
            persist(&mut *tx, &mut draft).await?;
        }

        loyalty::delete_for_customer(&mut *tx, customer_id).await?;

        let moved =
            order::reassign_terminal_orders(&mut *tx, customer_id, &sentinel.id).await?;

        customer::delete(&mut *tx, customer_id).await?;
        tx.commit().await?;

        info!(customer_id = %customer_id, orders_reassigned = moved, "Customer retired");
        Ok(())
    }
}

// =============================================================================
// Flow Helpers
// =============================================================================

/// Loads an order or fails with the caller-facing not-found error.
async fn load_order(conn: &mut SqliteConnection, order_id: &str) -> ServiceResult<Order> {
    order::get(conn, order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
}

/// Persists an order through the versioned update, mapping the outcome to
/// the caller-facing errors and bumping the in-memory version on success.
async fn persist(conn: &mut SqliteConnection, order: &mut Order) -> ServiceResult<()> {
    match order::update(conn, order).await? {
        UpdateOutcome::Updated => {
            order.version += 1;
            Ok(())
        }
        UpdateOutcome::Conflict => Err(CoreError::Conflict {
            entity: "Order",
            id: order.id.clone(),
        }
        .into()),
        UpdateOutcome::NotFound => Err(CoreError::OrderNotFound(order.id.clone()).into()),
    }
}

/// Recomputes the order's pre-bonus total after a cart edit and, when the
/// order already holds bonus, re-runs settlement so the held amount tracks
/// the new total. A plain draft (no bonus held) just gets its total.
async fn recompute_and_resettle(
    conn: &mut SqliteConnection,
    order: &mut Order,
) -> ServiceResult<()> {
    let line_ids: Vec<String> = order.lines.keys().cloned().collect();
    let products = product::get_many(conn, &line_ids).await?;
    let final_cost = cart::priced_total(&order.lines, &products)?;

    if order.bonus_used_cents > 0 {
        let account = loyalty::get_by_customer(conn, &order.customer_id).await?;
        apply_settlement(conn, account.as_ref(), order, final_cost).await?;
    } else {
        order.total_cost_cents = final_cost.cents();
    }
    Ok(())
}

/// Runs the settlement plan against the ledger and writes the resulting
/// totals onto the order.
///
/// A debit refused for insufficient balance here is a ledger invariant
/// violation: the plan never asks for more than the balance it was shown,
/// inside the same transaction.
async fn apply_settlement(
    conn: &mut SqliteConnection,
    account: Option<&LoyaltyAccount>,
    order: &mut Order,
    final_cost: Money,
) -> ServiceResult<()> {
    let balance = account.map(LoyaltyAccount::balance).unwrap_or_default();
    let plan = settlement::reconcile(final_cost, order.bonus_used(), balance);

    if let Some(account) = account {
        if plan.debit.is_positive() {
            match loyalty::debit(conn, &account.id, plan.debit.cents()).await? {
                DebitOutcome::Debited(_) => {}
                DebitOutcome::NotFound => {
                    return Err(CoreError::AccountNotFound(account.id.clone()).into())
                }
                DebitOutcome::InsufficientBalance { balance } => {
                    return Err(CoreError::InsufficientBalance {
                        account_id: account.id.clone(),
                        balance,
                        requested: plan.debit.cents(),
                    }
                    .into())
                }
            }
        } else if plan.credit.is_positive() {
            loyalty::credit(conn, &account.id, plan.credit.cents())
                .await?
                .ok_or_else(|| CoreError::AccountNotFound(account.id.clone()))?;
        }
    } else if plan.credit.is_positive() {
        // Bonus held by an order whose account has vanished - the retire
        // flow forbids this, so treat it as the invariant violation it is.
        return Err(CoreError::AccountNotFound(order.customer_id.clone()).into());
    }

    order.bonus_used_cents = plan.bonus_used.cents();
    order.total_cost_cents = plan.total_cost.cents();
    Ok(())
}

/// Verifies every line of the order against the customer's age.
fn check_eligibility(
    owner: &Customer,
    order: &Order,
    products: &BTreeMap<String, Product>,
) -> ServiceResult<()> {
    let today = Utc::now().date_naive();
    for product_id in order.lines.keys() {
        let product = products
            .get(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

        if !eligibility::is_eligible(owner, product, today) {
            return Err(CoreError::AgeRestricted {
                product_id: product.id.clone(),
                min_age: product.min_age.unwrap_or(0),
                age: eligibility::age_on(owner, today),
            }
            .into());
        }
    }
    Ok(())
}
