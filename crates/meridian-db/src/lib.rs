//! # meridian-db: Database Layer for Meridian Store
//!
//! This crate provides database access for the order backend.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian Store Data Flow                           │
//! │                                                                         │
//! │  OrderService operation (confirm, add_to_cart, ...)                    │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    meridian-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  repository:: │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  order        │    │  (embedded)  │  │   │
//! │  │   │               │    │  product      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  customer     │    │ 001_init.sql │  │   │
//! │  │   │ Transactions  │    │  loyalty      │    │ 002_idx.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository functions (customer, product, order, loyalty)
//!
//! ## Transactions
//!
//! Every repository function takes a `&mut SqliteConnection`, so a caller
//! can span customers, products, orders and the loyalty ledger with one
//! transaction and commit (or roll back) the whole flow atomically:
//!
//! ```rust,ignore
//! let mut tx = db.begin().await?;
//! let order = repository::order::get(&mut *tx, &order_id).await?;
//! repository::product::adjust_stock(&mut *tx, &product_id, -3).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::loyalty::DebitOutcome;
pub use repository::order::UpdateOutcome;
pub use repository::product::StockAdjustment;
