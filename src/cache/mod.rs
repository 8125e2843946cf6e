//! Cache Module
//!
//! Provides the expiring key-value store and its building blocks.

mod entry;
mod reentrancy;
mod stats;
mod store;


// Re-export public types
pub use stats::StoreStats;
pub use store::ExpiringStore;
