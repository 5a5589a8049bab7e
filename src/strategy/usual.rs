use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::trace;

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

/// Plain execution: one provider call per primitive, errors returned as they are.
pub struct UsualStrategy {
    provider: Arc<dyn TransactionProvider>,
}

impl UsualStrategy {
    pub fn new(provider: Arc<dyn TransactionProvider>) -> Self {
        Self { provider }
    }
}

/// Every node of the subtree rooted at `path`, children before parents.
pub(crate) async fn collect_subtree(
    provider: &dyn TransactionProvider,
    path: &str,
) -> Result<Vec<String>> {
    let mut pending = vec![path.to_string()];
    let mut visited = Vec::new();
    while let Some(current) = pending.pop() {
        for child in provider.get_children(&current).await? {
            pending.push(path::join(&current, &child));
        }
        visited.push(current);
    }
    // pre-order reversed puts every descendant ahead of its ancestors
    visited.reverse();
    Ok(visited)
}

/// Ancestors of `path` that lie inside the provider's namespace, top-down.
///
/// Nodes above the root cannot be addressed through a provider.
pub(crate) fn ancestors_in_namespace(
    provider: &dyn TransactionProvider,
    path: &str,
) -> Vec<String> {
    let root = provider.root_node();
    path::ancestors(path).into_iter().filter(|a| path::is_under(a, &root)).collect()
}

pub(crate) fn decode(
    key: &str,
    data: Vec<u8>,
) -> Result<String> {
    String::from_utf8(data).map_err(|_| Error::InvalidData(key.to_string()))
}

#[async_trait]
impl ExecStrategy for UsualStrategy {
    fn provider(&self) -> Arc<dyn TransactionProvider> {
        self.provider.clone()
    }

    async fn get_data_string(
        &self,
        key: &str,
    ) -> Result<String> {
        decode(key, self.get_data(key).await?)
    }

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.provider.get_data(key).await
    }

    async fn get_data_with_callback(
        &self,
        key: &str,
        callback: DataCallback,
    ) -> Result<()> {
        let result = self.get_data(key).await;
        callback(self.provider.real_path(key), result);
        Ok(())
    }

    async fn check_exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.provider.exists(key).await
    }

    async fn check_exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.provider.exists_with_watcher(key, watcher).await
    }

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        self.provider.get_children(key).await
    }

    async fn create_current_only(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        self.provider.create(key, value.as_bytes().to_vec(), mode).await?;
        Ok(())
    }

    async fn create_all_need_path(
        &self,
        key: &str,
        value: &str,
        mode: CreateMode,
    ) -> Result<()> {
        let target = self.provider.real_path(key);
        for ancestor in ancestors_in_namespace(self.provider.as_ref(), &target) {
            match self.provider.create(&ancestor, Vec::new(), CreateMode::Persistent).await {
                Ok(_) => trace!(%ancestor, "created missing ancestor"),
                Err(e) if e.is_node_exists() => {}
                Err(e) => return Err(e),
            }
        }
        self.provider.create(&target, value.as_bytes().to_vec(), mode).await?;
        Ok(())
    }

    async fn update(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.provider.update(key, value.as_bytes().to_vec()).await
    }

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()> {
        self.provider.delete_only_current(key).await
    }

    async fn delete_only_current_with_callback(
        &self,
        key: &str,
        callback: VoidCallback,
    ) -> Result<()> {
        let result = self.delete_only_current(key).await;
        callback(self.provider.real_path(key), result);
        Ok(())
    }

    async fn delete_all_children(
        &self,
        key: &str,
    ) -> Result<()> {
        let target = self.provider.real_path(key);
        let nodes = collect_subtree(self.provider.as_ref(), &target).await?;
        debug!(%target, count = nodes.len(), "delete_all_children");
        for node in nodes {
            self.provider.delete_only_current(&node).await?;
        }
        Ok(())
    }

    async fn delete_current_branch(
        &self,
        key: &str,
    ) -> Result<()> {
        let target = self.provider.real_path(key);
        self.delete_all_children(&target).await?;

        let root = self.provider.root_node();
        let mut current = path::parent(&target).map(str::to_string);
        while let Some(parent) = current {
            if !path::is_under(&parent, &root) {
                break;
            }
            if !self.provider.get_children(&parent).await?.is_empty() {
                break;
            }
            match self.provider.delete_only_current(&parent).await {
                Ok(()) => debug!(%parent, "deleted emptied ancestor"),
                Err(e) if e.is_no_node() => {}
                Err(e) => return Err(e),
            }
            if parent == root {
                break;
            }
            current = path::parent(&parent).map(str::to_string);
        }
        Ok(())
    }

    fn transaction(&self) -> Transaction {
        self.provider.transaction()
    }
}
