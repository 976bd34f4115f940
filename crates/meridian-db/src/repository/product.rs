//! # Product Repository
//!
//! Catalog reads and the conditional stock-adjustment write.
//!
//! ## Stock Adjustment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Conditional Stock Update                                │
//! │                                                                         │
//! │  ❌ WRONG: read-modify-write (lost updates oversell stock)             │
//! │     let p = get(id); p.quantity -= 3; save(p);                         │
//! │                                                                         │
//! │  ✅ CORRECT: single conditional statement                              │
//! │     UPDATE products SET quantity = quantity + :delta                   │
//! │     WHERE id = :id AND quantity + :delta >= 0                          │
//! │                                                                         │
//! │  Two confirmations racing on the same product serialize on the row:    │
//! │  whichever loses sees the already-decremented figure and clamps (or    │
//! │  fails) against it. Stock can never go negative.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use meridian_core::Product;

/// Outcome of a conditional stock adjustment.
#[derive(Debug, Clone)]
pub enum StockAdjustment {
    /// The adjustment applied; carries the updated product.
    Adjusted(Product),
    /// No product with that id.
    NotFound,
    /// The decrement would have driven stock below zero.
    WouldGoNegative { available: i64 },
}

/// Gets a product by its ID.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, price_cents, quantity, is_restricted, min_age,
               created_at, updated_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

/// Loads several products at once, keyed by id.
///
/// Missing ids are simply absent from the map; the caller decides whether
/// that is an error. Used by confirmation, which needs every product of an
/// order's line map in one place.
pub async fn get_many(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> DbResult<BTreeMap<String, Product>> {
    let mut products = BTreeMap::new();
    for id in ids {
        if let Some(product) = get(&mut *conn, id).await? {
            products.insert(product.id.clone(), product);
        }
    }
    Ok(products)
}

/// Inserts a new product.
pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, name = %product.name, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, price_cents, quantity, is_restricted, min_age,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price_cents)
    .bind(product.quantity)
    .bind(product.is_restricted)
    .bind(product.min_age)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates a product's catalog fields.
///
/// Deliberately leaves `quantity` alone: stock moves only through
/// [`adjust_stock`], so a catalog edit can never overwrite a concurrent
/// sale's decrement.
pub async fn update(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, "Updating product");

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products SET
            name = ?2,
            price_cents = ?3,
            is_restricted = ?4,
            min_age = ?5,
            updated_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price_cents)
    .bind(product.is_restricted)
    .bind(product.min_age)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", &product.id));
    }

    Ok(())
}

/// Adjusts product stock by a signed delta, refusing to go negative.
///
/// ## Arguments
/// * `delta` - Negative for a sale, positive for restocking / cancellation
pub async fn adjust_stock(
    conn: &mut SqliteConnection,
    id: &str,
    delta: i64,
) -> DbResult<StockAdjustment> {
    debug!(id = %id, delta = %delta, "Adjusting stock");

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity + ?2, updated_at = ?3
        WHERE id = ?1 AND quantity + ?2 >= 0
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // Either the product is missing or the guard refused the decrement.
        return match get(conn, id).await? {
            None => Ok(StockAdjustment::NotFound),
            Some(product) => Ok(StockAdjustment::WouldGoNegative {
                available: product.quantity,
            }),
        };
    }

    match get(conn, id).await? {
        Some(product) => Ok(StockAdjustment::Adjusted(product)),
        None => Ok(StockAdjustment::NotFound),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
