//! Background Tasks Module
//!
//! Contains the background task that runs alongside each store.
//!
//! # Tasks
//! - Reclaimer: Removes stale entries every sweep interval

mod reclaimer;

pub use reclaimer::{spawn_reclaimer, CancelSignal, Reclaim};
