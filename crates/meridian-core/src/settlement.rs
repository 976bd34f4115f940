//! # Loyalty Settlement
//!
//! Reconciliation of an order's applied bonus against its recomputed total,
//! plus the confirmation cashback.
//!
//! ## The Reconciliation Problem
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  An order may already hold bonus (`bonus_used`) from an earlier        │
//! │  settlement when its pre-bonus total changes (line removed, quantities │
//! │  clamped). The account balance no longer contains those held funds,    │
//! │  so "how much bonus could apply" must count both pools:                │
//! │                                                                        │
//! │      desired = min(final_cost, balance + previously_used)              │
//! │      delta   = desired - previously_used                               │
//! │                                                                        │
//! │  delta > 0 ──► debit the account, grow bonus_used                      │
//! │  delta < 0 ──► credit the account, shrink bonus_used                   │
//! │  delta = 0 ──► nothing to do (idempotence)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The function is pure: it returns a [`Settlement`] plan and the service
//! layer applies the debit/credit through the ledger inside the surrounding
//! transaction. Running the same plan computation twice with unchanged
//! inputs yields a no-op, and `bonus_used` can never exceed the account's
//! original balance plus whatever the order already holds.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::CASHBACK_RATE_BPS;

// =============================================================================
// Settlement Plan
// =============================================================================

/// The outcome of reconciling bonus usage with a recomputed order total.
///
/// Exactly one of `debit` / `credit` is non-zero (both zero when the
/// settlement is already converged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Amount to take from the loyalty account.
    pub debit: Money,
    /// Amount to return to the loyalty account.
    pub credit: Money,
    /// The order's new `bonus_used`.
    pub bonus_used: Money,
    /// The order's new `total_cost` (net amount charged). Floors at 0.
    pub total_cost: Money,
}

impl Settlement {
    /// Whether the plan changes nothing.
    pub fn is_noop(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Computes the settlement for an order whose pre-bonus total is
/// `final_cost`, which currently holds `previously_used` of bonus, against
/// an account with `balance` available.
///
/// ## Properties
/// - Idempotent: reconciling twice with the same `final_cost` is a no-op
/// - `bonus_used <= final_cost` and `bonus_used <= balance + previously_used`
/// - `total_cost = final_cost - bonus_used >= 0`
/// - A zero (or negative) `final_cost` refunds everything held
pub fn reconcile(final_cost: Money, previously_used: Money, balance: Money) -> Settlement {
    if final_cost <= Money::zero() {
        return Settlement {
            debit: Money::zero(),
            credit: previously_used,
            bonus_used: Money::zero(),
            total_cost: Money::zero(),
        };
    }

    // The maximum bonus this order could apply without double counting the
    // funds it already holds.
    let desired = final_cost.min(balance + previously_used);
    let delta = desired - previously_used;

    if delta.is_positive() {
        let debit = balance.min(delta);
        let bonus_used = previously_used + debit;
        Settlement {
            debit,
            credit: Money::zero(),
            bonus_used,
            total_cost: final_cost.saturating_sub_zero(bonus_used),
        }
    } else if delta.is_negative() {
        let credit = previously_used.min(Money::zero() - delta);
        let bonus_used = previously_used - credit;
        Settlement {
            debit: Money::zero(),
            credit,
            bonus_used,
            total_cost: final_cost.saturating_sub_zero(bonus_used),
        }
    } else {
        Settlement {
            debit: Money::zero(),
            credit: Money::zero(),
            bonus_used: previously_used,
            total_cost: final_cost.saturating_sub_zero(previously_used),
        }
    }
}

// =============================================================================
// Cashback
// =============================================================================

/// Cashback owed on a confirmed order.
///
/// Computed on the *net* amount actually charged - after settlement has
/// already reduced the total by any bonus applied. Paid once, on the
/// DRAFT → PROCESSING transition only.
pub fn cashback(net_total: Money) -> Money {
    net_total.apply_rate_bps(CASHBACK_RATE_BPS)
}

// =============================================================================
// Unit Tests
// =============================================================================
