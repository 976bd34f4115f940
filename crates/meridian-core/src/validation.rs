//! # Validation Module
//!
//! Business rule validation for catalog and cart inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Service operations (Rust)                                    │
//! │  └── THIS MODULE: structural rules on incoming values                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Domain logic                                                 │
//! │  └── State machine, clamping, settlement invariants                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / UNIQUE / CHECK / foreign key constraints               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::Product;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `MAX_LINE_QUANTITY`
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in cents.
///
/// Prices are strictly positive; a free product would make the settlement
/// arithmetic meaningless.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a loyalty card number.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 32 characters
/// - Alphanumeric plus hyphens
pub fn validate_card_number(card_number: &str) -> ValidationResult<()> {
    let card_number = card_number.trim();

    if card_number.is_empty() {
        return Err(ValidationError::Required {
            field: "card_number".to_string(),
        });
    }

    if card_number.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "card_number".to_string(),
            max: 32,
        });
    }

    if !card_number
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "card_number".to_string(),
            reason: "must contain only letters, numbers and hyphens".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates a product's field combination.
///
/// ## Rules
/// - Price strictly positive
/// - Stock never negative
/// - A restricted product must carry a positive minimum age
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_price_cents(product.price_cents)?;

    if product.quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if product.is_restricted {
        match product.min_age {
            Some(age) if age > 0 => {}
            _ => {
                return Err(ValidationError::MustBePositive {
                    field: "min_age".to_string(),
                })
            }
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
