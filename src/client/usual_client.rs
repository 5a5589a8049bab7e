use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;

use super::BaseClient;
use crate::constants::WATCHED;
use crate::BaseProvider;
use crate::CreateMode;
use crate::DataCallback;
use crate::Error;
use crate::ExecStrategy;
use crate::Result;
use crate::StrategyContext;
use crate::StrategyFactory;
use crate::StrategyType;
use crate::Transaction;
use crate::TransactionProvider;
use crate::VoidCallback;
use crate::Watcher;

/// A built strategy together with the kind it was built for
pub struct CachedStrategy {
    kind: StrategyType,
    strategy: Box<dyn ExecStrategy>,
}

impl CachedStrategy {
    pub fn kind(&self) -> StrategyType {
        self.kind
    }

    pub fn strategy(&self) -> &dyn ExecStrategy {
        self.strategy.as_ref()
    }
}

impl fmt::Debug for CachedStrategy {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CachedStrategy").field("kind", &self.kind).finish()
    }
}

/// Stable operation set whose execution policy can be switched at runtime.
///
/// One strategy per [`StrategyType`] is built lazily and reused until
/// [`close`](UsualClient::close). Selecting a kind makes it the active
/// strategy every call is forwarded to. Calls that touch the namespace root
/// keep the base client's root-exists flag in step:
///
/// - creating the root only ensures the namespace
/// - deleting the root deletes the namespace
/// - deleting all children of the root, or a branch that empties it,
///   clears the flag
pub struct UsualClient {
    base: Arc<dyn BaseClient>,
    factory: Arc<dyn StrategyFactory>,
    strategies: DashMap<StrategyType, Arc<CachedStrategy>>,
    active: ArcSwapOption<CachedStrategy>,
    /// Serializes `select_strategy` with itself and with `close`
    switch_lock: Mutex<()>,
}

impl fmt::Debug for UsualClient {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("UsualClient")
            .field("root_node", &self.base.root_node())
            .field("active", &self.strategy_type())
            .field("cached", &self.strategies.len())
            .finish()
    }
}

impl UsualClient {
    pub fn new(
        base: Arc<dyn BaseClient>,
        factory: Arc<dyn StrategyFactory>,
    ) -> Self {
        Self {
            base,
            factory,
            strategies: DashMap::new(),
            active: ArcSwapOption::empty(),
            switch_lock: Mutex::new(()),
        }
    }

    pub fn base(&self) -> &Arc<dyn BaseClient> {
        &self.base
    }

    /// Activates the strategy for `kind`, building it on first use.
    ///
    /// Concurrent first selections of the same kind build exactly one
    /// instance. Readers only ever observe a fully built strategy.
    pub fn select_strategy(
        &self,
        kind: StrategyType,
    ) {
        // `close` clears the cache under the same lock
        let _guard = self.switch_lock.lock();
        if let Some(cached) = self.cached(kind) {
            self.active.store(Some(cached));
            return;
        }

        let provider: Arc<dyn TransactionProvider> = Arc::new(BaseProvider::new(
            self.base.root_node(),
            self.base.holder(),
            WATCHED,
            self.base.authorities(),
        ));
        let ctx = StrategyContext {
            provider,
            retry_policy: self.base.delay_retry_policy(),
            cancel: self.base.cancel_token(),
        };
        let built = Arc::new(CachedStrategy {
            kind,
            strategy: self.factory.create(kind, ctx),
        });
        self.strategies.insert(kind, built.clone());
        self.active.store(Some(built));
        debug!(%kind, "strategy built and activated");
    }

    /// Active strategy, if any kind was selected since construction or the last close.
    pub fn strategy(&self) -> Option<Arc<CachedStrategy>> {
        self.active.load_full()
    }

    pub fn strategy_type(&self) -> Option<StrategyType> {
        self.active.load_full().map(|s| s.kind)
    }

    /// Number of strategies built so far
    pub fn cached_strategies(&self) -> usize {
        self.strategies.len()
    }

    fn cached(
        &self,
        kind: StrategyType,
    ) -> Option<Arc<CachedStrategy>> {
        self.strategies.get(&kind).map(|entry| entry.value().clone())
    }

    fn active(&self) -> Result<Arc<CachedStrategy>> {
        self.active.load_full().ok_or(Error::NoActiveStrategy)
    }

    fn is_root(
        &self,
        path: &str,
    ) -> bool {
        path == self.base.root_node()
    }

    pub async fn get_string(
        &self,
        path: &str,
    ) -> Result<String> {
        self.active()?.strategy.get_data_string(path).await
    }

    pub async fn get_data(
        &self,
        path: &str,
    ) -> Result<Vec<u8>> {
        self.active()?.strategy.get_data(path).await
    }

    /// `callback` is invoked exactly once, also when no strategy is active.
    pub async fn get_data_with_callback(
        &self,
        path: &str,
        callback: DataCallback,
    ) -> Result<()> {
        match self.active() {
            Ok(active) => active.strategy.get_data_with_callback(path, callback).await,
            Err(e) => {
                callback(path.to_string(), Err(Error::NoActiveStrategy));
                Err(e)
            }
        }
    }

    pub async fn exists(
        &self,
        path: &str,
    ) -> Result<bool> {
        self.active()?.strategy.check_exists(path).await
    }

    pub async fn exists_with_watcher(
        &self,
        path: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.active()?.strategy.check_exists_with_watcher(path, watcher).await
    }

    pub async fn get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        self.active()?.strategy.get_children(path).await
    }

    /// Creates `path`; its parent must exist.
    pub async fn create_leaf(
        &self,
        path: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let active = self.active()?;
        self.base.create_namespace().await?;
        if self.is_root(path) {
            return Ok(());
        }
        active.strategy.create_current_only(path, value, mode).await
    }

    /// Creates `path` and any missing ancestors.
    pub async fn create_path(
        &self,
        path: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let active = self.active()?;
        self.base.create_namespace().await?;
        if self.is_root(path) {
            return Ok(());
        }
        active.strategy.create_all_need_path(path, value, mode).await
    }

    pub async fn update(
        &self,
        path: &str,
        value: &str,
    ) -> Result<()> {
        self.active()?.strategy.update(path, value).await
    }

    pub async fn delete_leaf(
        &self,
        path: &str,
    ) -> Result<()> {
        let active = self.active()?;
        if self.is_root(path) {
            return self.base.delete_namespace().await;
        }
        active.strategy.delete_only_current(path).await
    }

    /// `callback` is invoked exactly once, also for the root and when no
    /// strategy is active.
    pub async fn delete_leaf_with_callback(
        &self,
        path: &str,
        callback: VoidCallback,
    ) -> Result<()> {
        let active = match self.active() {
            Ok(active) => active,
            Err(e) => {
                callback(path.to_string(), Err(Error::NoActiveStrategy));
                return Err(e);
            }
        };
        if self.is_root(path) {
            let result = self.base.delete_namespace().await;
            callback(path.to_string(), result);
            return Ok(());
        }
        active.strategy.delete_only_current_with_callback(path, callback).await
    }

    /// Deletes `path` with everything below it.
    pub async fn delete_all_children(
        &self,
        path: &str,
    ) -> Result<()> {
        self.active()?.strategy.delete_all_children(path).await?;
        if self.is_root(path) {
            self.base.set_root_exist(false);
        }
        Ok(())
    }

    /// Deletes `path` and every ancestor it leaves empty, the root included.
    pub async fn delete_branch(
        &self,
        path: &str,
    ) -> Result<()> {
        let active = self.active()?;
        active.strategy.delete_current_branch(path).await?;
        let root = self.base.root_node();
        if !active.strategy.check_exists(&root).await? {
            self.base.set_root_exist(false);
        }
        Ok(())
    }

    pub fn transaction(&self) -> Result<Transaction> {
        Ok(self.active()?.strategy.transaction())
    }

    /// Drops every cached strategy, then shuts the base client down.
    ///
    /// Local state is cleared even when the base client fails to close.
    pub async fn close(&self) -> Result<()> {
        {
            let _guard = self.switch_lock.lock();
            self.strategies.clear();
            self.active.store(None);
        }
        info!(root = %self.base.root_node(), "strategy cache cleared");
        self.base.close().await
    }
}
