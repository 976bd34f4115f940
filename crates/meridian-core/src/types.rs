//! # Domain Types
//!
//! Core domain types for the order-taking backend.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │ LoyaltyAccount  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  price_cents    │   │  lines (map)    │   │  customer_id    │       │
//! │  │  quantity       │   │  total_cost     │   │  card_number    │       │
//! │  │  min_age        │   │  bonus_used     │   │  balance_cents  │       │
//! │  └─────────────────┘   │  status         │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌────────────────────────────────────────┐      │
//! │  │    Customer     │   │             OrderStatus                │      │
//! │  │  ─────────────  │   │  ──────────────────────────────────    │      │
//! │  │  id (UUID)      │   │  Draft → Processing → Shipped →        │      │
//! │  │  birth_date     │   │  Delivered, non-terminal → Canceled    │      │
//! │  │  is_active      │   └────────────────────────────────────────┘      │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities reference each other by id only; the repository layer resolves
//! the graph with explicit lookups. An `Order` exclusively owns its `lines`
//! map, and snapshots clone it so an in-flight response can never alias the
//! persisted record.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
///
/// ## State Machine
/// ```text
/// Draft ──► Processing ──► Shipped ──► Delivered
///   │            │            │
///   └────────────┴────────────┴──────► Canceled
/// ```
///
/// Draft is the only state in which the line map may be mutated; every
/// other state is append-only with respect to `lines`. Delivered and
/// Canceled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Cart being assembled (items may be added/removed).
    Draft,
    /// Confirmed: stock locked in, bonus settled, cashback paid.
    Processing,
    /// Handed to fulfilment.
    Shipped,
    /// Received by the customer (terminal).
    Delivered,
    /// Abandoned or reversed (terminal).
    Canceled,
}

impl OrderStatus {
    /// Whether this status permits no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Cancellation is reachable from every non-terminal state; the forward
    /// path advances one step at a time. Repeating a transition is illegal
    /// by construction (no state maps to itself).
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Draft, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Draft, Canceled)
                | (Processing, Canceled)
                | (Shipped, Canceled)
        )
    }

    /// Stable lowercase name, matching the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Draft
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Unit price in cents. Always > 0.
    pub price_cents: i64,

    /// Available stock. Never negative; decremented only through the
    /// conditional stock-adjustment operation.
    pub quantity: i64,

    /// Whether the product carries an age restriction.
    pub is_restricted: bool,

    /// Minimum purchaser age. Set (and > 0) whenever `is_restricted` is.
    pub min_age: Option<i64>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether any stock is available at all.
    #[inline]
    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer account.
///
/// A missing birth date is treated as age 0 by the eligibility policy,
/// i.e. maximally restricted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub surname: String,
    /// Unique; also the lookup key for the sentinel "deleted" account.
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Loyalty Account
// =============================================================================

/// A customer's loyalty balance ("bonus card").
///
/// One-to-one with a customer. The balance is mutated exclusively through
/// the ledger's credit/debit operations, which maintain `balance >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LoyaltyAccount {
    pub id: String,
    pub customer_id: String,
    /// Human-facing card number, unique across accounts.
    pub card_number: String,
    /// Current balance in cents. Never negative.
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    /// Returns the balance as a Money type.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A shopping cart evolving into a confirmed order.
///
/// ## Invariant
/// `total_cost + bonus_used` equals the catalog-priced sum of `lines` at the
/// last recompute. Both amounts are always >= 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,

    /// Owning customer.
    pub customer_id: String,

    /// product-id → requested quantity. Keys are unique; iteration order is
    /// deterministic but carries no semantics. Owned by the order and cloned
    /// into snapshots.
    pub lines: BTreeMap<String, i64>,

    /// Date the draft was created.
    pub created_on: NaiveDate,

    /// Cost still charged to the customer, in cents. >= 0.
    pub total_cost_cents: i64,

    /// Loyalty balance currently applied to this order, in cents. >= 0.
    pub bonus_used_cents: i64,

    pub status: OrderStatus,

    /// Optimistic-concurrency counter; bumped on every persisted update.
    pub version: i64,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the charged total as Money.
    #[inline]
    pub fn total_cost(&self) -> Money {
        Money::from_cents(self.total_cost_cents)
    }

    /// Returns the applied bonus as Money.
    #[inline]
    pub fn bonus_used(&self) -> Money {
        Money::from_cents(self.bonus_used_cents)
    }

    /// Current quantity of a line, 0 when absent.
    #[inline]
    pub fn line_quantity(&self, product_id: &str) -> i64 {
        self.lines.get(product_id).copied().unwrap_or(0)
    }

    /// Whether the cart holds no lines.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
