//! # Order Repository
//!
//! Order rows plus their line map, with optimistic-concurrency updates.
//!
//! ## Storage Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders                          order_lines                            │
//! │  ──────────────────────          ─────────────────────────              │
//! │  id, customer_id, status,        (order_id, product_id) → quantity      │
//! │  created_on, total_cost_cents,                                          │
//! │  bonus_used_cents, version,      One row per distinct product;          │
//! │  updated_at                      assembled into a BTreeMap on read      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Optimistic Concurrency
//! Updates carry the version the caller read:
//! `UPDATE orders SET ..., version = version + 1 WHERE id = ? AND version = ?`
//! Zero rows affected on an existing order means another writer got there
//! first; the service surfaces that as a retryable conflict instead of
//! double-applying stock or bonus effects.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Order, OrderStatus};

/// Outcome of a versioned order update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update applied.
    Updated,
    /// The order exists but its version moved on.
    Conflict,
    /// No order with that id.
    NotFound,
}

/// The flat `orders` row; lines are loaded separately and merged in.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    customer_id: String,
    status: OrderStatus,
    created_on: NaiveDate,
    total_cost_cents: i64,
    bonus_used_cents: i64,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: BTreeMap<String, i64>) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id,
            lines,
            created_on: self.created_on,
            total_cost_cents: self.total_cost_cents,
            bonus_used_cents: self.bonus_used_cents,
            status: self.status,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, customer_id, status, created_on, total_cost_cents,
           bonus_used_cents, version, updated_at
    FROM orders
"#;

/// Gets an order (row + line map) by ID.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        None => Ok(None),
        Some(row) => {
            let lines = load_lines(conn, &row.id).await?;
            Ok(Some(row.into_order(lines)))
        }
    }
}

/// Finds a customer's draft order, if one exists.
///
/// A customer has at most one draft at a time; the service enforces that by
/// always reusing the existing draft.
pub async fn find_draft_for_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "{SELECT_ORDER} WHERE customer_id = ?1 AND status = 'draft' ORDER BY created_on LIMIT 1"
    ))
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        None => Ok(None),
        Some(row) => {
            let lines = load_lines(conn, &row.id).await?;
            Ok(Some(row.into_order(lines)))
        }
    }
}

/// Lists a customer's orders, newest first.
pub async fn list_by_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{SELECT_ORDER} WHERE customer_id = ?1 ORDER BY created_on DESC, id"
    ))
    .bind(customer_id)
    .fetch_all(&mut *conn)
    .await?;

    assemble(conn, rows).await
}

/// Lists all orders with a given status.
pub async fn list_by_status(
    conn: &mut SqliteConnection,
    status: OrderStatus,
) -> DbResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{SELECT_ORDER} WHERE status = ?1 ORDER BY created_on DESC, id"
    ))
    .bind(status)
    .fetch_all(&mut *conn)
    .await?;

    assemble(conn, rows).await
}

/// Whether the customer has any order still in flight
/// (PROCESSING or SHIPPED).
pub async fn has_active_for_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE customer_id = ?1 AND status IN ('processing', 'shipped')
        "#,
    )
    .bind(customer_id)
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

/// Inserts a new order with its lines.
pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, customer_id = %order.customer_id, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_id, status, created_on, total_cost_cents,
            bonus_used_cents, version, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(order.status)
    .bind(order.created_on)
    .bind(order.total_cost_cents)
    .bind(order.bonus_used_cents)
    .bind(order.version)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    store_lines(conn, &order.id, &order.lines).await
}

/// Updates an order (row + lines) guarded by the version the caller read.
///
/// On success the persisted version is `order.version + 1`; the caller is
/// expected to bump its in-memory copy to match.
pub async fn update(conn: &mut SqliteConnection, order: &Order) -> DbResult<UpdateOutcome> {
    debug!(id = %order.id, version = %order.version, status = %order.status, "Updating order");

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE orders SET
            customer_id = ?2,
            status = ?3,
            total_cost_cents = ?4,
            bonus_used_cents = ?5,
            version = version + 1,
            updated_at = ?6
        WHERE id = ?1 AND version = ?7
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(order.status)
    .bind(order.total_cost_cents)
    .bind(order.bonus_used_cents)
    .bind(now)
    .bind(order.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = ?1")
            .bind(&order.id)
            .fetch_one(&mut *conn)
            .await?;
        return Ok(if exists > 0 {
            UpdateOutcome::Conflict
        } else {
            UpdateOutcome::NotFound
        });
    }

    // Replace the line map wholesale; it is small and owned by the order.
    sqlx::query("DELETE FROM order_lines WHERE order_id = ?1")
        .bind(&order.id)
        .execute(&mut *conn)
        .await?;
    store_lines(conn, &order.id, &order.lines).await?;

    Ok(UpdateOutcome::Updated)
}

/// Moves a single order to a different owner. Returns whether it existed.
///
/// Used by the sentinel reassignment flow; does not touch status, stock or
/// ledger state.
pub async fn reassign_owner(
    conn: &mut SqliteConnection,
    order_id: &str,
    customer_id: &str,
) -> DbResult<bool> {
    debug!(order_id = %order_id, customer_id = %customer_id, "Reassigning order owner");

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET customer_id = ?2, version = version + 1, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(customer_id)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Moves every terminal (DELIVERED / CANCELED) order of a customer to a new
/// owner in one statement. Returns the number of orders moved.
pub async fn reassign_terminal_orders(
    conn: &mut SqliteConnection,
    from_customer_id: &str,
    to_customer_id: &str,
) -> DbResult<u64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET customer_id = ?2, version = version + 1, updated_at = ?3
        WHERE customer_id = ?1 AND status IN ('delivered', 'canceled')
        "#,
    )
    .bind(from_customer_id)
    .bind(to_customer_id)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Line Map Helpers
// =============================================================================

async fn load_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT product_id, quantity FROM order_lines WHERE order_id = ?1")
            .bind(order_id)
            .fetch_all(conn)
            .await?;

    Ok(rows.into_iter().collect())
}

async fn store_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
    lines: &BTreeMap<String, i64>,
) -> DbResult<()> {
    for (product_id, quantity) in lines {
        sqlx::query("INSERT INTO order_lines (order_id, product_id, quantity) VALUES (?1, ?2, ?3)")
            .bind(order_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn assemble(conn: &mut SqliteConnection, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let lines = load_lines(conn, &row.id).await?;
        orders.push(row.into_order(lines));
    }
    Ok(orders)
}

// =============================================================================
// Unit Tests
// =============================================================================
