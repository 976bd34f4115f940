//! # Loyalty Service
//!
//! Account management and promotional credit, funneled through the same
//! ledger repository the settlement engine uses. Nothing in the system
//! writes a balance directly, which is what keeps `balance >= 0` a fact
//! rather than a hope.

use chrono::Utc;
use tracing::{debug, info};

use meridian_core::error::CoreError;
use meridian_core::{validation, LoyaltyAccount, Money, ValidationError};
use meridian_db::repository::{customer, generate_id, loyalty};
use meridian_db::{Database, DbError};

use crate::error::{ServiceError, ServiceResult};

/// Loyalty account operations exposed to callers.
#[derive(Debug, Clone)]
pub struct LoyaltyService {
    db: Database,
}

impl LoyaltyService {
    /// Creates a new service over the given database.
    pub fn new(db: Database) -> Self {
        LoyaltyService { db }
    }

    /// Opens a loyalty account for a customer.
    ///
    /// One account per customer; the card number must be unique.
    pub async fn open_account(
        &self,
        customer_id: &str,
        card_number: &str,
    ) -> ServiceResult<LoyaltyAccount> {
        debug!(customer_id = %customer_id, card_number = %card_number, "open_account");

        validation::validate_card_number(card_number).map_err(CoreError::Validation)?;

        let mut tx = self.db.begin().await?;

        customer::get(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        let now = Utc::now();
        let account = LoyaltyAccount {
            id: generate_id(),
            customer_id: customer_id.to_string(),
            card_number: card_number.to_string(),
            balance_cents: 0,
            created_at: now,
            updated_at: now,
        };

        match loyalty::insert(&mut *tx, &account).await {
            Ok(()) => {}
            Err(DbError::UniqueViolation { field }) => {
                return Err(CoreError::Validation(ValidationError::Duplicate {
                    field,
                    value: card_number.to_string(),
                })
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;

        info!(account_id = %account.id, customer_id = %customer_id, "Loyalty account opened");
        Ok(account)
    }

    /// Fetches the account owned by a customer.
    pub async fn account_for(&self, customer_id: &str) -> ServiceResult<LoyaltyAccount> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        loyalty::get_by_customer(&mut *conn, customer_id)
            .await?
            .ok_or_else(|| ServiceError::from(CoreError::AccountNotFound(customer_id.to_string())))
    }

    /// Looks an account up by its card number.
    pub async fn find_by_card_number(&self, card_number: &str) -> ServiceResult<LoyaltyAccount> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        loyalty::get_by_card_number(&mut *conn, card_number)
            .await?
            .ok_or_else(|| ServiceError::from(CoreError::AccountNotFound(card_number.to_string())))
    }

    /// Credits a promotional amount to a customer's account.
    ///
    /// The amount must be strictly positive; settlements and cashback have
    /// their own path through the order engine.
    pub async fn credit(&self, customer_id: &str, amount: Money) -> ServiceResult<LoyaltyAccount> {
        debug!(customer_id = %customer_id, amount = %amount, "promotional credit");

        if !amount.is_positive() {
            return Err(CoreError::Validation(ValidationError::MustBePositive {
                field: "amount".to_string(),
            })
            .into());
        }

        let mut tx = self.db.begin().await?;

        let account = loyalty::get_by_customer(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(customer_id.to_string()))?;

        let updated = loyalty::credit(&mut *tx, &account.id, amount.cents())
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(account.id.clone()))?;

        tx.commit().await?;
        Ok(updated)
    }
}
