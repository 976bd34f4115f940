//! # Loyalty Ledger Repository
//!
//! The single funnel for loyalty balance mutations.
//!
//! Every credit and debit goes through this module; there is no direct
//! balance write anywhere else, which is what keeps the non-negative-balance
//! invariant airtight. Debits are conditional updates that refuse to
//! overdraw, mirroring the stock guard in the product repository.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::LoyaltyAccount;

/// Outcome of a conditional ledger debit.
#[derive(Debug, Clone)]
pub enum DebitOutcome {
    /// The debit applied; carries the updated account.
    Debited(LoyaltyAccount),
    /// No account with that id.
    NotFound,
    /// The debit exceeded the balance and was refused.
    InsufficientBalance { balance: i64 },
}

/// Gets an account by its ID.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<LoyaltyAccount>> {
    let account = sqlx::query_as::<_, LoyaltyAccount>(
        r#"
        SELECT id, customer_id, card_number, balance_cents, created_at, updated_at
        FROM loyalty_accounts
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(account)
}

/// Gets the account owned by a customer, if any.
pub async fn get_by_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Option<LoyaltyAccount>> {
    let account = sqlx::query_as::<_, LoyaltyAccount>(
        r#"
        SELECT id, customer_id, card_number, balance_cents, created_at, updated_at
        FROM loyalty_accounts
        WHERE customer_id = ?1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;

    Ok(account)
}

/// Looks an account up by its human-facing card number.
pub async fn get_by_card_number(
    conn: &mut SqliteConnection,
    card_number: &str,
) -> DbResult<Option<LoyaltyAccount>> {
    let account = sqlx::query_as::<_, LoyaltyAccount>(
        r#"
        SELECT id, customer_id, card_number, balance_cents, created_at, updated_at
        FROM loyalty_accounts
        WHERE card_number = ?1
        "#,
    )
    .bind(card_number)
    .fetch_optional(conn)
    .await?;

    Ok(account)
}

/// Inserts a new account.
///
/// Fails with a unique violation when the customer already has one or the
/// card number is taken.
pub async fn insert(conn: &mut SqliteConnection, account: &LoyaltyAccount) -> DbResult<()> {
    debug!(id = %account.id, customer_id = %account.customer_id, "Opening loyalty account");

    sqlx::query(
        r#"
        INSERT INTO loyalty_accounts (
            id, customer_id, card_number, balance_cents, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&account.id)
    .bind(&account.customer_id)
    .bind(&account.card_number)
    .bind(account.balance_cents)
    .bind(account.created_at)
    .bind(account.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Credits an amount to an account.
///
/// `amount_cents` must be non-negative; a zero credit is a no-op the caller
/// should skip. Returns the updated account, or `None` when it is missing.
pub async fn credit(
    conn: &mut SqliteConnection,
    id: &str,
    amount_cents: i64,
) -> DbResult<Option<LoyaltyAccount>> {
    debug!(id = %id, amount = %amount_cents, "Crediting loyalty account");

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE loyalty_accounts
        SET balance_cents = balance_cents + ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(amount_cents)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get(conn, id).await
}

/// Debits an amount from an account, refusing to overdraw.
pub async fn debit(
    conn: &mut SqliteConnection,
    id: &str,
    amount_cents: i64,
) -> DbResult<DebitOutcome> {
    debug!(id = %id, amount = %amount_cents, "Debiting loyalty account");

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE loyalty_accounts
        SET balance_cents = balance_cents - ?2, updated_at = ?3
        WHERE id = ?1 AND balance_cents >= ?2
        "#,
    )
    .bind(id)
    .bind(amount_cents)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return match get(conn, id).await? {
            None => Ok(DebitOutcome::NotFound),
            Some(account) => Ok(DebitOutcome::InsufficientBalance {
                balance: account.balance_cents,
            }),
        };
    }

    match get(conn, id).await? {
        Some(account) => Ok(DebitOutcome::Debited(account)),
        None => Ok(DebitOutcome::NotFound),
    }
}

/// Deletes the account owned by a customer (used when retiring the
/// customer). Returns whether an account existed.
pub async fn delete_for_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM loyalty_accounts WHERE customer_id = ?1")
        .bind(customer_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::{customer, generate_id};
    use meridian_core::Customer;

    async fn seeded_account(conn: &mut SqliteConnection, balance_cents: i64) -> LoyaltyAccount {
        let now = Utc::now();
        let owner = Customer {
            id: generate_id(),
            name: "Jane".to_string(),
            surname: "Doe".to_string(),
            email: format!("{}@example.com", generate_id()),
            birth_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        customer::insert(conn, &owner).await.unwrap();

        let account = LoyaltyAccount {
            id: generate_id(),
            customer_id: owner.id.clone(),
            card_number: format!("MC-{}", &owner.id[..8]),
            balance_cents,
            created_at: now,
            updated_at: now,
        };
        insert(conn, &account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_credit_and_debit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let account = seeded_account(&mut *conn, 1000).await;

        let updated = credit(&mut *conn, &account.id, 500).await.unwrap().unwrap();
        assert_eq!(updated.balance_cents, 1500);

        match debit(&mut *conn, &account.id, 700).await.unwrap() {
            DebitOutcome::Debited(a) => assert_eq!(a.balance_cents, 800),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_debit_refuses_overdraw() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let account = seeded_account(&mut *conn, 300).await;

        match debit(&mut *conn, &account.id, 500).await.unwrap() {
            DebitOutcome::InsufficientBalance { balance } => assert_eq!(balance, 300),
            other => panic!("unexpected outcome: {:?}", other),
        }

        // Balance untouched
        let fetched = get(&mut *conn, &account.id).await.unwrap().unwrap();
        assert_eq!(fetched.balance_cents, 300);
    }

    #[tokio::test]
    async fn test_lookup_by_card_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let account = seeded_account(&mut *conn, 0).await;

        let found = get_by_card_number(&mut *conn, &account.card_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, account.id);
    }
}
