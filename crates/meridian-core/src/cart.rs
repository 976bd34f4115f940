//! # Cart Line Math
//!
//! Pure mutations of a draft order's line map: merging requested quantities,
//! clamping to available stock, removing lines, and recomputing the priced
//! total.
//!
//! ## Clamping Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Requested quantity vs available stock                                  │
//! │                                                                         │
//! │  stock = 0   ──► OutOfStock error (the line cannot exist at all)       │
//! │  req <= stock ──► line kept as requested                               │
//! │  req >  stock ──► line clamped to stock + ClampWarning on the          │
//! │                   successful result (never an error)                   │
//! │                                                                         │
//! │  Clamping only ever lowers a quantity; it never raises stock.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same policy is applied twice: when lines are merged into a draft cart
//! and again at confirmation time, when stock may have moved since the cart
//! was assembled.
//!
//! All functions here are pure with respect to storage: callers load the
//! products, apply the mutation, and persist the result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Order, OrderStatus, Product};
use crate::validation::validate_quantity;
use crate::MAX_CART_LINES;

// =============================================================================
// Clamp Warning
// =============================================================================

/// A non-fatal notice that a requested quantity was reduced to the stock
/// actually available.
///
/// Warnings travel on *successful* results; callers inspect the list rather
/// than catching an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClampWarning {
    pub product_id: String,
    /// What the cart asked for.
    pub requested: i64,
    /// What the stock level allowed.
    pub supplied: i64,
}

// =============================================================================
// Draft Guard
// =============================================================================

/// Fails with `InvalidState` unless the order's cart is still mutable.
pub fn ensure_draft(order: &Order) -> CoreResult<()> {
    if order.status != OrderStatus::Draft {
        return Err(CoreError::InvalidState {
            order_id: order.id.clone(),
            status: order.status,
        });
    }
    Ok(())
}

// =============================================================================
// Line Mutations
// =============================================================================

/// Merges an additional quantity of `product` into the draft order's lines.
///
/// ## Behavior
/// - Quantity must be positive (`InvalidQuantity`)
/// - Stock of exactly 0 fails `OutOfStock`
/// - The merged total (existing + delta) is clamped to available stock,
///   returning a [`ClampWarning`] when that happens
/// - A merged total of <= 0 removes the line entirely
///
/// ## Returns
/// `Ok(Some(warning))` when the quantity was clamped, `Ok(None)` otherwise.
pub fn add_line(
    order: &mut Order,
    product: &Product,
    quantity: i64,
) -> CoreResult<Option<ClampWarning>> {
    ensure_draft(order)?;

    if quantity <= 0 {
        return Err(CoreError::InvalidQuantity {
            product_id: product.id.clone(),
            quantity,
        });
    }
    validate_quantity(quantity)?;

    if !product.in_stock() {
        return Err(CoreError::OutOfStock {
            product_id: product.id.clone(),
        });
    }

    let current = order.line_quantity(&product.id);
    if current == 0 && order.lines.len() >= MAX_CART_LINES {
        return Err(CoreError::Validation(
            crate::error::ValidationError::OutOfRange {
                field: "cart lines".to_string(),
                min: 0,
                max: MAX_CART_LINES as i64,
            },
        ));
    }

    let requested = current + quantity;
    let (supplied, warning) = clamp_to_stock(&product.id, requested, product.quantity);

    if supplied <= 0 {
        order.lines.remove(&product.id);
    } else {
        order.lines.insert(product.id.clone(), supplied);
    }

    Ok(warning)
}

/// Removes a line from the draft order.
///
/// The line must exist; callers recompute the total afterwards.
pub fn remove_line(order: &mut Order, product_id: &str) -> CoreResult<()> {
    ensure_draft(order)?;

    if order.lines.remove(product_id).is_none() {
        return Err(CoreError::LineNotFound {
            order_id: order.id.clone(),
            product_id: product_id.to_string(),
        });
    }
    Ok(())
}

/// Clamps every line of an order to the current stock of its product.
///
/// Used at confirmation: stock may have moved since the cart was assembled,
/// and the decremented quantities must match what is actually available.
/// Lines clamped all the way to zero are dropped (with a warning).
///
/// ## Returns
/// The clamped line map plus the warnings collected along the way.
pub fn clamp_lines_to_stock(
    lines: &BTreeMap<String, i64>,
    products: &BTreeMap<String, Product>,
) -> CoreResult<(BTreeMap<String, i64>, Vec<ClampWarning>)> {
    let mut clamped = BTreeMap::new();
    let mut warnings = Vec::new();

    for (product_id, &requested) in lines {
        let product = products
            .get(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

        let (supplied, warning) = clamp_to_stock(product_id, requested, product.quantity);
        if let Some(w) = warning {
            warnings.push(w);
        }
        if supplied > 0 {
            clamped.insert(product_id.clone(), supplied);
        }
    }

    Ok((clamped, warnings))
}

/// Recomputes the catalog-priced sum of a line map.
///
/// This is the pre-bonus total: `Σ price(p) × qty(p)` over all lines.
pub fn priced_total(
    lines: &BTreeMap<String, i64>,
    products: &BTreeMap<String, Product>,
) -> CoreResult<Money> {
    let mut total = Money::zero();
    for (product_id, &quantity) in lines {
        let product = products
            .get(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;
        total += product.price().multiply_quantity(quantity);
    }
    Ok(total)
}

/// Clamp a single requested quantity against available stock.
fn clamp_to_stock(product_id: &str, requested: i64, available: i64) -> (i64, Option<ClampWarning>) {
    if requested > available {
        let supplied = available.max(0);
        (
            supplied,
            Some(ClampWarning {
                product_id: product_id.to_string(),
                requested,
                supplied,
            }),
        )
    } else {
        (requested, None)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
