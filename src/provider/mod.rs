//! Primitive operations bound to one namespace root and connection.
//!
//! Strategies never talk to the [`Coordinator`](crate::Coordinator) directly;
//! they compose the calls a [`TransactionProvider`] exposes. The client builds
//! a fresh provider every time a new strategy kind is activated, so the
//! strategy is bound to the connection and authorities current at that time.

mod base_provider;
pub use base_provider::*;


use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Acl;
use crate::Coordinator;
use crate::CreateMode;
use crate::Result;
use crate::Transaction;
use crate::Watcher;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionProvider: Send + Sync + 'static {
    fn root_node(&self) -> String;

    /// Resolves `key` against the root node.
    fn real_path(
        &self,
        key: &str,
    ) -> String;

    fn holder(&self) -> Arc<dyn Coordinator>;

    /// ACL applied to every node created through this provider
    fn acl(&self) -> Acl;

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>>;

    async fn exists(
        &self,
        key: &str,
    ) -> Result<bool>;

    async fn exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool>;

    /// Child names of `key`, sorted.
    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>>;

    /// Returns the actual created path.
    async fn create(
        &self,
        key: &str,
        value: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String>;

    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<()>;

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Empty transaction bound to this provider's root and connection
    fn transaction(&self) -> Transaction;
}
