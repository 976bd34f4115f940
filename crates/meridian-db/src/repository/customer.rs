//! # Customer Repository
//!
//! Customer lookups and the handful of writes the order engine needs:
//! registration, deletion when a customer is retired, and the email lookup
//! backing the sentinel "deleted" account.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use meridian_core::{Customer, SENTINEL_CUSTOMER_EMAIL};

/// Gets a customer by ID.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, surname, email, birth_date, is_active, created_at, updated_at
        FROM customers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(customer)
}

/// Gets a customer by their unique email.
pub async fn get_by_email(conn: &mut SqliteConnection, email: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, surname, email, birth_date, is_active, created_at, updated_at
        FROM customers
        WHERE email = ?1
        "#,
    )
    .bind(email)
    .fetch_optional(conn)
    .await?;

    Ok(customer)
}

/// Inserts a new customer.
///
/// Fails with a unique violation when the email is taken.
pub async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
    debug!(id = %customer.id, email = %customer.email, "Inserting customer");

    sqlx::query(
        r#"
        INSERT INTO customers (
            id, name, surname, email, birth_date, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.name)
    .bind(&customer.surname)
    .bind(&customer.email)
    .bind(customer.birth_date)
    .bind(customer.is_active)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Gets or lazily creates the sentinel customer that absorbs the history
/// of deleted accounts.
///
/// The sentinel is inactive, has no birth date and never owns a loyalty
/// account; it exists purely so terminal orders keep a valid owner.
pub async fn ensure_sentinel(conn: &mut SqliteConnection) -> DbResult<Customer> {
    if let Some(existing) = get_by_email(&mut *conn, SENTINEL_CUSTOMER_EMAIL).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let sentinel = Customer {
        id: generate_id(),
        name: "Deleted".to_string(),
        surname: "Customer".to_string(),
        email: SENTINEL_CUSTOMER_EMAIL.to_string(),
        birth_date: None,
        is_active: false,
        created_at: now,
        updated_at: now,
    };
    insert(&mut *conn, &sentinel).await?;

    debug!(id = %sentinel.id, "Sentinel customer created");
    Ok(sentinel)
}

/// Deletes a customer row. Returns whether the customer existed.
///
/// Callers must have detached (reassigned) the customer's orders and
/// removed their loyalty account first; foreign keys refuse otherwise.
pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(id = %id, "Deleting customer");

    let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================
