//! # meridian-orders: Order Lifecycle & Settlement Engine
//!
//! The orchestration layer of Meridian Store. This crate wires the pure
//! business logic of `meridian-core` to the repositories of `meridian-db`,
//! exposing the operations a controller layer would call.
//!
//! ## The Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_or_get_draft ──► add_to_cart / remove_from_cart  (DRAFT)       │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                               confirm                                   │
//! │        eligibility ► clamp ► stock ► settle ► cashback  (PROCESSING)    │
//! │                                   │                                     │
//! │                     set_status ───┼──► SHIPPED ──► DELIVERED            │
//! │                                   │                                     │
//! │                               cancel ──► stock + bonus restored         │
//! │                                          (CANCELED)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation runs inside one database transaction: the order row, the
//! touched product rows and the loyalty-account row commit together or not
//! at all. Clamp warnings are data on successful snapshots, never errors.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod loyalty;
pub mod service;
pub mod snapshot;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ServiceError, ServiceResult};
pub use loyalty::LoyaltyService;
pub use service::OrderService;
pub use snapshot::OrderSnapshot;
