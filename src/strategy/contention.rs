use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::DataCallback;
use super::ExecStrategy;
use super::UsualStrategy;
use super::VoidCallback;
use crate::constants::ANY_VERSION;
use crate::constants::LOCK_ROOT;
use crate::constants::LOCK_WAIT_POLL_MS;
use crate::Acl;
use crate::Coordinator;
use crate::CreateMode;
use crate::Error;
use crate::Result;
use crate::Transaction;
use crate::TransactionProvider;
use crate::Watcher;

/// Exclusive lock held as one ephemeral node under [`LOCK_ROOT`].
///
/// One lock per namespace root. The node disappears with the session, so a
/// crashed holder never blocks other clients for longer than its session.
pub struct ContentionLock {
    holder: Arc<dyn Coordinator>,
    lock_path: String,
    cancel: CancellationToken,
}

impl ContentionLock {
    pub fn new(
        holder: Arc<dyn Coordinator>,
        root_node: &str,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            holder,
            lock_path: lock_path_for(root_node),
            cancel,
        }
    }

    pub fn lock_path(&self) -> &str {
        &self.lock_path
    }

    /// Waits until the lock node could be created by this session.
    pub async fn acquire(&self) -> Result<()> {
        match self.holder.create(LOCK_ROOT, Vec::new(), Acl::Open, CreateMode::Persistent).await {
            Ok(_) => {}
            Err(e) if e.is_node_exists() => {}
            Err(e) => return Err(e),
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
            match self
                .holder
                .create(&self.lock_path, Vec::new(), Acl::Open, CreateMode::Ephemeral)
                .await
            {
                Ok(_) => {
                    trace!(lock = %self.lock_path, "lock acquired");
                    return Ok(());
                }
                Err(e) if e.is_node_exists() => {}
                Err(e) => return Err(e),
            }

            let released = Arc::new(Notify::new());
            let notifier = released.clone();
            let watcher: Watcher = Arc::new(move |_| notifier.notify_one());
            if !self.holder.exists_with_watcher(&self.lock_path, watcher).await? {
                continue;
            }

            debug!(lock = %self.lock_path, "waiting for contention lock");
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Interrupted),
                _ = released.notified() => {}
                _ = sleep(Duration::from_millis(LOCK_WAIT_POLL_MS)) => {}
            }
        }
    }

    pub async fn release(&self) -> Result<()> {
        match self.holder.delete(&self.lock_path, ANY_VERSION).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_no_node() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Runs `op` while holding the lock; the lock is released whatever `op` returns.
    pub async fn run<T, Fut>(
        &self,
        op: Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.acquire().await?;
        let result = op.await;
        if let Err(e) = self.release().await {
            warn!(lock = %self.lock_path, "failed to release contention lock: {:?}", e);
        }
        result
    }
}

/// `/app/shard1` locks on `/_locks/%2Fapp%2Fshard1`.
///
/// The root path is percent-encoded (`%` and `/` only), so distinct roots
/// never share a lock node.
pub(crate) fn lock_path_for(root_node: &str) -> String {
    let mut name = String::with_capacity(root_node.len() + 8);
    for c in root_node.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            c => name.push(c),
        }
    }
    format!("{LOCK_ROOT}/{name}")
}

/// Treats the error a concurrent writer would cause as success.
pub(crate) fn tolerate(
    result: Result<()>,
    raced: fn(&Error) -> bool,
) -> Result<()> {
    match result {
        Err(e) if raced(&e) => {
            debug!("ignored contention race: {:?}", e);
            Ok(())
        }
        other => other,
    }
}

/// Serializes writes through a [`ContentionLock`]; reads go straight through.
///
/// A create that finds the node already there, or a delete that finds it
/// gone, means another client won the race and counts as success.
pub struct ContentionStrategy {
    pub(crate) usual: UsualStrategy,
    pub(crate) lock: ContentionLock,
}

impl ContentionStrategy {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        cancel: CancellationToken,
    ) -> Self {
        let lock = ContentionLock::new(provider.holder(), &provider.root_node(), cancel);
        Self {
            usual: UsualStrategy::new(provider),
            lock,
        }
    }

    pub fn lock(&self) -> &ContentionLock {
        &self.lock
    }
}

#[async_trait]
impl ExecStrategy for ContentionStrategy {
    fn provider(&self) -> Arc<dyn TransactionProvider> {
        self.usual.provider()
    }

    async fn get_data_string(
        &self,
        key: &str,
    ) -> Result<String> {
        self.usual.get_data_string(key).await
    }

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.usual.get_data(key).await
    }

    async fn get_data_with_callback(
        &self,
        key: &str,
        callback: DataCallback,
    ) -> Result<()> {
        self.usual.get_data_with_callback(key, callback).await
    }

    async fn check_exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.usual.check_exists(key).await
    }

    async fn check_exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.usual.check_exists_with_watcher(key, watcher).await
    }

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        self.usual.get_children(key).await
    }

    async fn create_current_only(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let result = self.lock.run(self.usual.create_current_only(key, value, mode)).await;
        tolerate(result, Error::is_node_exists)
    }

    async fn create_all_need_path(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let result = self.lock.run(self.usual.create_all_need_path(key, value, mode)).await;
        tolerate(result, Error::is_node_exists)
    }

    async fn update(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.lock.run(self.usual.update(key, value)).await
    }

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()> {
        let result = self.lock.run(self.usual.delete_only_current(key)).await;
        tolerate(result, Error::is_no_node)
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
        let result = self.lock.run(self.usual.delete_all_children(key)).await;
        tolerate(result, Error::is_no_node)
    }

    async fn delete_current_branch(
        &self,
        key: &str,
    ) -> Result<()> {
        let result = self.lock.run(self.usual.delete_current_branch(key)).await;
        tolerate(result, Error::is_no_node)
    }

    fn transaction(&self) -> Transaction {
        self.usual.transaction()
    }
}
