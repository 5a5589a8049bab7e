//! Strategy-dispatch client for the coordination service
//!
//! - [`UsualClient`] - Stable operation set routed through a switchable strategy
//! - [`ClientBuilder`] - Settings-driven client construction
//! - [`BaseClient`] / [`NamespaceClient`] - Namespace root and connection lifecycle
//! - [`ClientContext`] - Immutable per-client state
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//!
//! use d_coord::ClientBuilder;
//! use d_coord::ClientSettings;
//! use d_coord::CreateMode;
//! use d_coord::MemoryCoordinator;
//! use d_coord::StrategyType;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = ClientBuilder::new(ClientSettings::default())
//!         .root_path("/app/shard1")
//!         .strategy(StrategyType::SyncRetry)
//!         .build(Arc::new(MemoryCoordinator::new()))
//!         .await
//!         .unwrap();
//!
//!     client.create_path("/app/shard1/nodeA", "v1", CreateMode::Persistent).await.unwrap();
//!     assert_eq!(client.get_string("/app/shard1/nodeA").await.unwrap(), "v1");
//!
//!     // switch policy without touching call sites
//!     client.select_strategy(StrategyType::Contend);
//!     client.delete_leaf("/app/shard1").await.unwrap();
//!     client.close().await.unwrap();
//! }
//! ```

mod base;
mod builder;
mod context;
mod usual_client;

pub use base::*;
pub use builder::*;
pub use context::*;
pub use usual_client::*;

#[cfg(test)]
mod base_test;
#[cfg(test)]
mod usual_client_test;
