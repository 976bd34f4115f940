//! # Order Snapshots
//!
//! The response shape every operation returns: the order's persisted state
//! plus any clamp warnings collected along the way.
//!
//! The snapshot clones the order's line map, so mutating an in-flight
//! response can never alias the record the engine persisted.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use meridian_core::{ClampWarning, Order, OrderStatus};

/// A point-in-time view of an order.
///
/// ## Serialization
/// ```json
/// {
///   "id": "….",
///   "customerId": "…",
///   "lines": { "product-id": 2 },
///   "createdOn": "2026-08-04",
///   "totalCostCents": 4000,
///   "bonusUsedCents": 3000,
///   "status": "processing",
///   "warnings": [ { "productId": "…", "requested": 15, "supplied": 10 } ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub id: String,
    pub customer_id: String,
    pub lines: BTreeMap<String, i64>,
    pub created_on: NaiveDate,
    pub total_cost_cents: i64,
    pub bonus_used_cents: i64,
    pub status: OrderStatus,
    /// Non-fatal clamp notices from this operation. Empty on reads.
    pub warnings: Vec<ClampWarning>,
}

impl OrderSnapshot {
    /// Builds a snapshot of an order with the given warnings attached.
    pub fn of(order: &Order, warnings: Vec<ClampWarning>) -> Self {
        OrderSnapshot {
            id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            lines: order.lines.clone(),
            created_on: order.created_on,
            total_cost_cents: order.total_cost_cents,
            bonus_used_cents: order.bonus_used_cents,
            status: order.status,
            warnings,
        }
    }
}

impl From<&Order> for OrderSnapshot {
    fn from(order: &Order) -> Self {
        OrderSnapshot::of(order, Vec::new())
    }
}
