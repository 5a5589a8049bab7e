use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use super::DataCallback;
use super::ExecStrategy;
use super::SyncRetryStrategy;
use super::UsualStrategy;
use super::VoidCallback;
use crate::async_task::exhausted;
use crate::async_task::resume_with_backoff;
use crate::async_task::spawn_task;
use crate::CreateMode;
use crate::DelayRetryPolicy;
use crate::Error;
use crate::Result;
use crate::Transaction;
use crate::TransactionProvider;
use crate::Watcher;

/// Single-node writes are tried once inline; a retryable failure is handed to
/// a background task that spends the rest of the retry budget, and the call
/// returns `Ok(())` right away.
///
/// Reads and the subtree deletes block and retry like [`SyncRetryStrategy`],
/// so callers see the tree as it is once they return. Callback variants
/// deliver the final outcome from the background task.
pub struct AsyncRetryStrategy {
    sync: SyncRetryStrategy,
    usual: Arc<UsualStrategy>,
}

impl AsyncRetryStrategy {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        policy: DelayRetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sync: SyncRetryStrategy::new(provider.clone(), policy, cancel),
            usual: Arc::new(UsualStrategy::new(provider)),
        }
    }

    fn real_path(
        &self,
        key: &str,
    ) -> String {
        self.usual.provider().real_path(key)
    }

    /// Continues after the inline attempt failed with the retryable `first`.
    ///
    /// The inline attempt counts against the retry budget. With a zero budget
    /// `done` receives [`Error::RetryExhausted`] right away and its result is
    /// returned; otherwise the remaining retries run in a spawned task that
    /// hands the final outcome to `done`.
    fn retry_in_background<T, F, Fut, D>(
        &self,
        name: &'static str,
        first: Error,
        mut op: F,
        done: D,
    ) -> Result<()>
    where
        T: Send + 'static,
        F: FnMut(Arc<UsualStrategy>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        D: FnOnce(Result<T>) -> Result<()> + Send + 'static,
    {
        let policy = self.sync.policy;
        if policy.retry_count == 0 {
            warn!("{name} failed and retrying is disabled: {:?}", first);
            return done(Err(exhausted(1, first)));
        }

        info!("{name} failed, retrying in background");
        let usual = self.usual.clone();
        let cancel = self.sync.cancel.clone();
        spawn_task(name, move || async move {
            let result = resume_with_backoff(name, || op(usual.clone()), policy, &cancel, first).await;
            done(result)
        });
        Ok(())
    }

    /// First attempt inline; on a retryable failure continue in the background.
    async fn write<F, Fut>(
        &self,
        name: &'static str,
        mut op: F,
    ) -> Result<()>
    where
        F: FnMut(Arc<UsualStrategy>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let first = op(self.usual.clone()).await;
        match first {
            Err(e) if e.is_retryable() => {
                warn!("{name} first attempt failed: {:?}", e);
                self.retry_in_background(name, e, op, |result| result)
            }
            other => other,
        }
    }
}

#[async_trait]
impl ExecStrategy for AsyncRetryStrategy {
    fn provider(&self) -> Arc<dyn TransactionProvider> {
        self.usual.provider()
    }

    async fn get_data_string(
        &self,
        key: &str,
    ) -> Result<String> {
        self.sync.get_data_string(key).await
    }

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.sync.get_data(key).await
    }

    async fn get_data_with_callback(
        &self,
        key: &str,
        callback: DataCallback,
    ) -> Result<()> {
        let path = self.real_path(key);
        match self.usual.get_data(key).await {
            Err(e) if e.is_retryable() => {
                let key = key.to_string();
                self.retry_in_background(
                    "get_data_with_callback",
                    e,
                    move |usual| {
                        let key = key.clone();
                        async move { usual.get_data(&key).await }
                    },
                    move |result| {
                        callback(path, result);
                        Ok(())
                    },
                )
            }
            result => {
                callback(path, result);
                Ok(())
            }
        }
    }

    async fn check_exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.sync.check_exists(key).await
    }

    async fn check_exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.sync.check_exists_with_watcher(key, watcher).await
    }

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        self.sync.get_children(key).await
    }

    async fn create_current_only(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.write("create_current_only", move |usual| {
            let (key, value) = (key.clone(), value.clone());
            async move { usual.create_current_only(&key, &value, mode).await }
        })
        .await
    }

    async fn create_all_need_path(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.write("create_all_need_path", move |usual| {
            let (key, value) = (key.clone(), value.clone());
            async move { usual.create_all_need_path(&key, &value, mode).await }
        })
        .await
    }

    async fn update(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.write("update", move |usual| {
            let (key, value) = (key.clone(), value.clone());
            async move { usual.update(&key, &value).await }
        })
        .await
    }

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()> {
        let key = key.to_string();
        self.write("delete_only_current", move |usual| {
            let key = key.clone();
            async move { usual.delete_only_current(&key).await }
        })
        .await
    }

    async fn delete_only_current_with_callback(
        &self,
        key: &str,
        callback: VoidCallback,
    ) -> Result<()> {
        let path = self.real_path(key);
        match self.usual.delete_only_current(key).await {
            Err(e) if e.is_retryable() => {
                let key = key.to_string();
                self.retry_in_background(
                    "delete_only_current_with_callback",
                    e,
                    move |usual| {
                        let key = key.clone();
                        async move { usual.delete_only_current(&key).await }
                    },
                    move |result| {
                        callback(path, result);
                        Ok(())
                    },
                )
            }
            result => {
                callback(path, result);
                Ok(())
            }
        }
    }

    async fn delete_all_children(
        &self,
        key: &str,
    ) -> Result<()> {
        self.sync.delete_all_children(key).await
    }

    async fn delete_current_branch(
        &self,
        key: &str,
    ) -> Result<()> {
        self.sync.delete_current_branch(key).await
    }

    fn transaction(&self) -> Transaction {
        self.usual.transaction()
    }
}
