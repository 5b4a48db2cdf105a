//! quiesce-core library.
//!
//! Convergence tracking for identity-sync driver caches: snapshot a
//! driver's transaction cache, remember what the first look showed, and
//! decide on later looks whether the watched transaction has drained.

pub mod config;
pub mod error;
pub mod provider;
pub mod round;
pub mod snapshot;
pub mod tracker;
