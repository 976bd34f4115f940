//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Stable machine-readable codes                  │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  meridian-orders errors (separate crate)                               │
//! │  └── ServiceError     - What API callers see (kind + message)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, amounts, statuses)
//! 3. Errors are enum variants, never String
//! 4. Every error maps to exactly one stable [`ErrorKind`]
//!
//! All of these errors are detected before any mutation is committed; the
//! surrounding transaction rolls back whole, so nothing partially applies.

use serde::Serialize;
use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable machine-readable error codes.
///
/// ## Usage by callers
/// ```rust
/// use meridian_core::error::{CoreError, ErrorKind};
///
/// let err = CoreError::EmptyOrder { order_id: "o-1".into() };
/// assert_eq!(err.kind(), ErrorKind::EmptyOrder);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Non-positive quantity in a cart mutation.
    InvalidQuantity,
    /// Zero available stock for a requested line.
    OutOfStock,
    /// Order / product / customer / account / line absent.
    NotFound,
    /// Eligibility failure on a restricted product.
    AgeRestricted,
    /// Confirm attempted with no lines.
    EmptyOrder,
    /// Operation illegal for the order's current status.
    InvalidState,
    /// Status change not permitted by the state machine.
    InvalidTransition,
    /// Ledger debit exceeding the balance. Settlement always clamps to the
    /// available balance, so this surfacing indicates a ledger invariant
    /// violation, not caller error.
    InsufficientBalance,
    /// Concurrent-write serialization failure; the caller may retry.
    Conflict,
    /// Input validation failed.
    Validation,
    /// Opaque storage-layer failure.
    Storage,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// These are recoverable, local errors: the operation is rejected before any
/// state change is committed.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A cart mutation carried a non-positive quantity.
    #[error("Quantity {quantity} for product {product_id} must be positive")]
    InvalidQuantity { product_id: String, quantity: i64 },

    /// A requested product has exactly zero available stock.
    ///
    /// ## When This Occurs
    /// Only on cart adds. Quantities above a *non-zero* stock level are
    /// clamped with a warning instead (see the cart module).
    #[error("Product {product_id} is out of stock")]
    OutOfStock { product_id: String },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Loyalty account cannot be found.
    #[error("Loyalty account not found: {0}")]
    AccountNotFound(String),

    /// The order has no line for the given product.
    #[error("Order {order_id} has no line for product {product_id}")]
    LineNotFound { order_id: String, product_id: String },

    /// The customer is too young for a restricted product.
    ///
    /// ## When This Occurs
    /// Only on confirmation - cart edits deliberately skip the age check so
    /// a cart can be assembled before the purchase decision is final.
    #[error("Customer age {age} is below the minimum {min_age} for product {product_id}")]
    AgeRestricted {
        product_id: String,
        min_age: i64,
        age: i64,
    },

    /// Confirmation attempted on an order with no lines.
    #[error("Order {order_id} has no lines to confirm")]
    EmptyOrder { order_id: String },

    /// A cart mutation was attempted outside DRAFT.
    #[error("Order {order_id} is {status}, cart is immutable")]
    InvalidState { order_id: String, status: OrderStatus },

    /// A status change the state machine does not permit.
    #[error("Cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A ledger debit exceeded the account balance.
    #[error("Account {account_id} balance {balance} cannot cover debit of {requested}")]
    InsufficientBalance {
        account_id: String,
        balance: i64,
        requested: i64,
    },

    /// A concurrent writer updated the same record first.
    #[error("Concurrent update detected for {entity} {id}, retry the operation")]
    Conflict { entity: &'static str, id: String },

    /// A customer cannot be retired in their current situation.
    #[error("Customer {customer_id} cannot be retired: {reason}")]
    RetireBlocked { customer_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// The stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            CoreError::OutOfStock { .. } => ErrorKind::OutOfStock,
            CoreError::OrderNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::AccountNotFound(_)
            | CoreError::LineNotFound { .. } => ErrorKind::NotFound,
            CoreError::AgeRestricted { .. } => ErrorKind::AgeRestricted,
            CoreError::EmptyOrder { .. } => ErrorKind::EmptyOrder,
            CoreError::InvalidState { .. } => ErrorKind::InvalidState,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CoreError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            CoreError::Conflict { .. } | CoreError::RetireBlocked { .. } => ErrorKind::Conflict,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when input doesn't meet structural requirements, before
/// business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate email or card number).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::AgeRestricted {
            product_id: "p-42".to_string(),
            min_age: 18,
            age: 16,
        };
        assert_eq!(
            err.to_string(),
            "Customer age 16 is below the minimum 18 for product p-42"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::OrderNotFound("o-1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::LineNotFound {
                order_id: "o-1".into(),
                product_id: "p-1".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Draft
            }
            .kind(),
            ErrorKind::InvalidTransition
        );
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::AgeRestricted).unwrap();
        assert_eq!(json, "\"AGE_RESTRICTED\"");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
