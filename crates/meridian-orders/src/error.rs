//! # Service Error Type
//!
//! The error type callers of the order engine see.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Meridian Store                         │
//! │                                                                         │
//! │  Business rule broken                Storage broke                      │
//! │  ────────────────────                ─────────────                      │
//! │  CoreError (typed, recoverable)      DbError (fatal)                    │
//! │        │                                  │                             │
//! │        └────────────► ServiceError ◄──────┘                             │
//! │                            │                                            │
//! │                            ▼                                            │
//! │          kind() → stable code     Display → human message               │
//! │                                                                         │
//! │  Every business error is raised before the transaction commits, so     │
//! │  a failed operation leaves no partial state behind.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage errors deliberately collapse to the single opaque
//! [`ErrorKind::Storage`]: callers can retry or alert, but the details are
//! operational, not actionable input feedback.

use thiserror::Error;

use meridian_core::error::{CoreError, ErrorKind};
use meridian_db::DbError;

/// Unified error for all order-engine operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The storage layer failed.
    #[error("Storage failure: {0}")]
    Storage(#[from] DbError),
}

impl ServiceError {
    /// The stable machine-readable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Core(err) => err.kind(),
            ServiceError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
