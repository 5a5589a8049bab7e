use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ancestors_in_namespace;
use super::collect_subtree;
use super::contention::tolerate;
use super::ContentionStrategy;
use super::DataCallback;
use super::ExecStrategy;
use super::VoidCallback;
use crate::utils::path;
use crate::CreateMode;
use crate::Error;
use crate::Result;
use crate::Transaction;
use crate::TransactionProvider;
use crate::Watcher;

/// Contended execution where every multi-node write is a single transaction.
///
/// Either the whole path is created (or the whole branch removed) or nothing
/// changes, so a failure halfway never leaves dangling intermediate nodes.
pub struct TransactionContendStrategy {
    contention: ContentionStrategy,
}

impl TransactionContendStrategy {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            contention: ContentionStrategy::new(provider, cancel),
        }
    }

    fn provider_ref(&self) -> Arc<dyn TransactionProvider> {
        self.contention.provider()
    }

    async fn create_path_in_transaction(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let provider = self.provider_ref();
        let target = provider.real_path(key);
        let mut transaction = provider.transaction();
        for ancestor in ancestors_in_namespace(provider.as_ref(), &target) {
            if !provider.exists(&ancestor).await? {
                transaction.create(&ancestor, Vec::new(), CreateMode::Persistent);
            }
        }
        transaction.create(&target, value, mode);
        debug!(%target, ops = transaction.ops().len(), "create path in transaction");
        transaction.commit().await?;
        Ok(())
    }

    async fn delete_subtree_in_transaction(
        &self,
        key: &str,
        with_empty_ancestors: bool,
    ) -> Result<()> {
        let provider = self.provider_ref();
        let target = provider.real_path(key);
        let mut transaction = provider.transaction();
        for node in collect_subtree(provider.as_ref(), &target).await? {
            transaction.delete(&node);
        }

        if with_empty_ancestors {
            let root = provider.root_node();
            let mut removed = target.clone();
            let mut current = path::parent(&target).map(str::to_string);
            while let Some(parent) = current {
                if !path::is_under(&parent, &root) {
                    break;
                }
                let children = provider.get_children(&parent).await?;
                // still holds something besides the branch being removed
                if children.iter().any(|c| c != path::node_name(&removed)) {
                    break;
                }
                transaction.delete(&parent);
                if parent == root {
                    break;
                }
                current = path::parent(&parent).map(str::to_string);
                removed = parent;
            }
        }

        debug!(%target, ops = transaction.ops().len(), "delete branch in transaction");
        transaction.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ExecStrategy for TransactionContendStrategy {
    fn provider(&self) -> Arc<dyn TransactionProvider> {
        self.provider_ref()
    }

    async fn get_data_string(
        &self,
        key: &str,
    ) -> Result<String> {
        self.contention.get_data_string(key).await
    }

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.contention.get_data(key).await
    }

    async fn get_data_with_callback(
        &self,
        key: &str,
        callback: DataCallback,
    ) -> Result<()> {
        self.contention.get_data_with_callback(key, callback).await
    }

    async fn check_exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.contention.check_exists(key).await
    }

    async fn check_exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.contention.check_exists_with_watcher(key, watcher).await
    }

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        self.contention.get_children(key).await
    }

    async fn create_current_only(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        self.contention.create_current_only(key, value, mode).await
    }

    async fn create_all_need_path(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let result = self
            .contention
            .lock
            .run(self.create_path_in_transaction(key, value, mode))
            .await;
        tolerate(result, Error::is_node_exists)
    }

    async fn update(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.contention.update(key, value).await
    }

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()> {
        self.contention.delete_only_current(key).await
    }

    async fn delete_only_current_with_callback(
        &self,
        key: &str,
        callback: VoidCallback,
    ) -> Result<()> {
        self.contention.delete_only_current_with_callback(key, callback).await
    }

    async fn delete_all_children(
        &self,
        key: &str,
    ) -> Result<()> {
        let result = self
            .contention
            .lock
            .run(self.delete_subtree_in_transaction(key, false))
            .await;
        tolerate(result, Error::is_no_node)
    }

    async fn delete_current_branch(
        &self,
        key: &str,
    ) -> Result<()> {
        let result = self
            .contention
            .lock
            .run(self.delete_subtree_in_transaction(key, true))
            .await;
        tolerate(result, Error::is_no_node)
    }

    fn transaction(&self) -> Transaction {
        self.contention.transaction()
    }
}
