//! TTL Store - A concurrency-safe expiring key-value store
//!
//! Entries expire after a configurable period of inactivity and are removed
//! by a background reclaimer running on the caller's tokio runtime.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{ExpiringStore, StoreStats};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
