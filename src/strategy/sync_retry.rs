use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::DataCallback;
use super::ExecStrategy;
use super::UsualStrategy;
use super::VoidCallback;
use crate::async_task::retry_with_backoff;
use crate::CreateMode;
use crate::DelayRetryPolicy;
use crate::Result;
use crate::Transaction;
use crate::TransactionProvider;
use crate::Watcher;

/// Retries every call inline while the failure is retryable.
///
/// The caller is blocked for the whole retry sequence. Shutting the client
/// down interrupts a pending backoff with `Error::Interrupted`.
pub struct SyncRetryStrategy {
    pub(crate) usual: UsualStrategy,
    pub(crate) policy: DelayRetryPolicy,
    pub(crate) cancel: CancellationToken,
}

impl SyncRetryStrategy {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        policy: DelayRetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            usual: UsualStrategy::new(provider),
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> DelayRetryPolicy {
        self.policy
    }
}

#[async_trait]
impl ExecStrategy for SyncRetryStrategy {
    fn provider(&self) -> Arc<dyn TransactionProvider> {
        self.usual.provider()
    }

    async fn get_data_string(
        &self,
        key: &str,
    ) -> Result<String> {
        retry_with_backoff("get_data_string", || self.usual.get_data_string(key), self.policy, &self.cancel).await
    }

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        retry_with_backoff("get_data", || self.usual.get_data(key), self.policy, &self.cancel).await
    }

    async fn get_data_with_callback(
        &self,
        key: &str,
        callback: DataCallback,
    ) -> Result<()> {
        let result = self.get_data(key).await;
        callback(self.usual.provider().real_path(key), result);
        Ok(())
    }

    async fn check_exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        retry_with_backoff("check_exists", || self.usual.check_exists(key), self.policy, &self.cancel).await
    }

    async fn check_exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        retry_with_backoff(
            "check_exists_with_watcher",
            || self.usual.check_exists_with_watcher(key, watcher.clone()),
            self.policy,
            &self.cancel,
        )
        .await
    }

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        retry_with_backoff("get_children", || self.usual.get_children(key), self.policy, &self.cancel).await
    }

    async fn create_current_only(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        retry_with_backoff(
            "create_current_only",
            || self.usual.create_current_only(key, value, mode),
            self.policy,
            &self.cancel,
        )
        .await
    }

    async fn create_all_need_path(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        retry_with_backoff(
            "create_all_need_path",
            || self.usual.create_all_need_path(key, value, mode),
            self.policy,
            &self.cancel,
        )
        .await
    }

    async fn update(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        retry_with_backoff("update", || self.usual.update(key, value), self.policy, &self.cancel).await
    }

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()> {
        retry_with_backoff("delete_only_current", || self.usual.delete_only_current(key), self.policy, &self.cancel).await
    }

    async fn delete_only_current_with_callback(
        &self,
        key: &str,
        callback: VoidCallback,
    ) -> Result<()> {
        let result = self.delete_only_current(key).await;
        callback(self.usual.provider().real_path(key), result);
        Ok(())
    }

    async fn delete_all_children(
        &self,
        key: &str,
    ) -> Result<()> {
        retry_with_backoff("delete_all_children", || self.usual.delete_all_children(key), self.policy, &self.cancel).await
    }

    async fn delete_current_branch(
        &self,
        key: &str,
    ) -> Result<()> {
        retry_with_backoff(
            "delete_current_branch",
            || self.usual.delete_current_branch(key),
            self.policy,
            &self.cancel,
        )
        .await
    }

    fn transaction(&self) -> Transaction {
        self.usual.transaction()
    }
}
