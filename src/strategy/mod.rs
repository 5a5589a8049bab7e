//! Execution strategies.
//!
//! Every strategy exposes the same [`ExecStrategy`] operation set over a
//! [`TransactionProvider`]; they differ only in how they handle retries and
//! contention around those calls:
//!
//! | Type                  | Behaviour                                               |
//! |-----------------------|---------------------------------------------------------|
//! | `USUAL`               | one provider call per operation                         |
//! | `CONTEND`             | writes under a distributed lock, races tolerated        |
//! | `TRANSACTION_CONTEND` | as `CONTEND`, multi-node writes in one transaction      |
//! | `SYNC_RETRY`          | retryable failures retried inline with backoff          |
//! | `ASYNC_RETRY`         | failed writes handed to a background retry task         |

mod async_retry;
mod contention;
mod strategy_type;
mod sync_retry;
mod transaction_contend;
mod usual;

pub use async_retry::*;
pub use contention::*;
pub use strategy_type::*;
pub use sync_retry::*;
pub use transaction_contend::*;
pub use usual::*;

#[cfg(test)]
mod usual_test;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::CreateMode;
use crate::DelayRetryPolicy;
use crate::Result;
use crate::Transaction;
use crate::TransactionProvider;
use crate::Watcher;

/// Receives `(path, payload or error)`; invoked exactly once per call.
pub type DataCallback = Box<dyn FnOnce(String, Result<Vec<u8>>) + Send + 'static>;

/// Receives `(path, outcome)`; invoked exactly once per call.
pub type VoidCallback = Box<dyn FnOnce(String, Result<()>) + Send + 'static>;

/// Operation set shared by every execution policy.
///
/// Keys are resolved against the provider's root node. Every call may fail
/// with a service error or [`Error::Interrupted`](crate::Error::Interrupted).
///
/// Callback variants hand the outcome to the callback exactly once, either
/// before returning or later from a background task; their own return value
/// only reports failures that prevented dispatching the call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExecStrategy: Send + Sync + 'static {
    /// Provider this strategy was built on
    fn provider(&self) -> Arc<dyn TransactionProvider>;

    async fn get_data_string(
        &self,
        key: &str,
    ) -> Result<String>;

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>>;

    async fn get_data_with_callback(
        &self,
        key: &str,
        callback: DataCallback,
    ) -> Result<()>;

    async fn check_exists(
        &self,
        key: &str,
    ) -> Result<bool>;

    async fn check_exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool>;

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>>;

    /// Creates `key` only; its parent must exist.
    async fn create_current_only(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()>;

    /// Creates missing ancestors below the root as empty persistent nodes, then `key`.
    async fn create_all_need_path(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()>;

    async fn update(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()>;

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()>;

    async fn delete_only_current_with_callback(
        &self,
        key: &str,
        callback: VoidCallback,
    ) -> Result<()>;

    /// Deletes everything below `key`, then `key` itself.
    async fn delete_all_children(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Deletes the subtree at `key`, then every ancestor up to and including
    /// the root that was left without children.
    async fn delete_current_branch(
        &self,
        key: &str,
    ) -> Result<()>;

    fn transaction(&self) -> Transaction;
}

/// Everything a strategy may be built from
#[derive(Clone)]
pub struct StrategyContext {
    pub provider: Arc<dyn TransactionProvider>,
    /// Consumed by the retrying strategies only
    pub retry_policy: DelayRetryPolicy,
    /// Cancelled when the owning client shuts down
    pub cancel: CancellationToken,
}

/// Builds the strategy for a [`StrategyType`].
pub trait StrategyFactory: Send + Sync + 'static {
    fn create(
        &self,
        kind: StrategyType,
        ctx: StrategyContext,
    ) -> Box<dyn ExecStrategy>;
}

impl<F> StrategyFactory for F
where
    F: Fn(StrategyType, StrategyContext) -> Box<dyn ExecStrategy> + Send + Sync + 'static,
{
    fn create(
        &self,
        kind: StrategyType,
        ctx: StrategyContext,
    ) -> Box<dyn ExecStrategy> {
        self(kind, ctx)
    }
}

/// Maps every [`StrategyType`] to the strategy of the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategyFactory;

impl StrategyFactory for DefaultStrategyFactory {
    fn create(
        &self,
        kind: StrategyType,
        ctx: StrategyContext,
    ) -> Box<dyn ExecStrategy> {
        match kind {
            StrategyType::Usual => Box::new(UsualStrategy::new(ctx.provider)),
            StrategyType::Contend => Box::new(ContentionStrategy::new(ctx.provider, ctx.cancel)),
            StrategyType::TransactionContend => Box::new(TransactionContendStrategy::new(ctx.provider, ctx.cancel)),
            StrategyType::SyncRetry => Box::new(SyncRetryStrategy::new(ctx.provider, ctx.retry_policy, ctx.cancel)),
            StrategyType::AsyncRetry => Box::new(AsyncRetryStrategy::new(ctx.provider, ctx.retry_policy, ctx.cancel)),
        }
    }
}
