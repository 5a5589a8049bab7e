//! Strategy-dispatch client for a hierarchical coordination service.
//!
//! A [`UsualClient`] exposes one operation set (read, write, delete and
//! transactions on slash-separated paths) and routes every call through the
//! active [`ExecStrategy`]. Strategies are built lazily, one per
//! [`StrategyType`], and switched at runtime without touching call sites.

mod client;
mod config;
pub(crate) mod constants;
mod coordinator;
mod errors;
mod provider;
mod strategy;
mod transaction;
pub mod utils;

pub use client::*;
pub use config::*;
pub use constants::ANY_VERSION;
pub use coordinator::*;
pub use errors::*;
pub use provider::*;
pub use strategy::*;
pub use transaction::*;
pub use utils::*;


//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
