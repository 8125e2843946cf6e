//! Error types for the expiring store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for store construction.
///
/// Access operations never fail; a missing key is reported as `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Configuration cannot drive a store
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime available to host the reclaimer
    #[error("No tokio runtime available: the reclaimer must be spawned from within a runtime")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for the store.
pub type Result<T> = std::result::Result<T, StoreError>;
