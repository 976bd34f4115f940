//! # Repository Module
//!
//! Database repository functions for Meridian Store.
//!
//! ## Repository Pattern, Transaction-First
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every function here takes a `&mut SqliteConnection` instead of        │
//! │  holding a pool. The caller decides the transaction boundary:          │
//! │                                                                         │
//! │  OrderService::confirm                                                  │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       ├── order::get(&mut *tx, ...)                                 │
//! │       ├── product::adjust_stock(&mut *tx, ...)   (per line)         │
//! │       ├── loyalty::debit(&mut *tx, ...)                             │
//! │       ├── order::update(&mut *tx, ...)                              │
//! │       └── tx.commit().await?                                           │
//! │                                                                         │
//! │  An early return drops the transaction → automatic rollback,           │
//! │  so partial stock/ledger application can never be observed.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock and balance mutations are conditional single-statement updates
//! (`... WHERE quantity >= ?`), so two orders racing on the same product can
//! never oversell it, regardless of interleaving.
//!
//! ## Available Repositories
//!
//! - [`customer`] - Customer lookups, the sentinel account, deletion
//! - [`product`] - Catalog reads and conditional stock adjustment
//! - [`order`] - Order rows + line map, optimistic-concurrency updates
//! - [`loyalty`] - The loyalty ledger: credit / conditional debit

pub mod customer;
pub mod loyalty;
pub mod order;
pub mod product;

/// Generates a new entity ID.
///
/// UUID v4: globally unique without coordination.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
