use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::TransactionProvider;
use crate::constants::ANY_VERSION;
use crate::utils::path;
use crate::Acl;
use crate::AuthEntry;
use crate::Coordinator;
use crate::CreateMode;
use crate::Result;
use crate::Transaction;
use crate::Watcher;

/// Default provider: resolves keys against the root and forwards to the connection handle.
#[derive(Clone)]
pub struct BaseProvider {
    root_node: String,
    holder: Arc<dyn Coordinator>,
    watched: bool,
    authorities: Vec<AuthEntry>,
}

impl BaseProvider {
    pub fn new(
        root_node: impl Into<String>,
        holder: Arc<dyn Coordinator>,
        watched: bool,
        authorities: Vec<AuthEntry>,
    ) -> Self {
        Self {
            root_node: root_node.into(),
            holder,
            watched,
            authorities,
        }
    }

    pub fn is_watched(&self) -> bool {
        self.watched
    }

    pub fn authorities(&self) -> &[AuthEntry] {
        &self.authorities
    }
}

#[async_trait]
impl TransactionProvider for BaseProvider {
    fn root_node(&self) -> String {
        self.root_node.clone()
    }

    fn real_path(
        &self,
        key: &str,
    ) -> String {
        path::real_path(&self.root_node, key)
    }

    fn holder(&self) -> Arc<dyn Coordinator> {
        self.holder.clone()
    }

    fn acl(&self) -> Acl {
        if self.authorities.is_empty() {
            Acl::Open
        } else {
            Acl::Creator(self.authorities.clone())
        }
    }

    async fn get_data(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.holder.get_data(&self.real_path(key), self.watched).await
    }

    async fn exists(
        &self,
        key: &str,
    ) -> Result<bool> {
        self.holder.exists(&self.real_path(key), self.watched).await
    }

    async fn exists_with_watcher(
        &self,
        key: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.holder.exists_with_watcher(&self.real_path(key), watcher).await
    }

    async fn get_children(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        let mut children = self.holder.get_children(&self.real_path(key), self.watched).await?;
        children.sort();
        Ok(children)
    }

    async fn create(
        &self,
        key: &str,
        value: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String> {
        let path = self.real_path(key);
        trace!(%path, ?mode, "provider create");
        self.holder.create(&path, value, self.acl(), mode).await
    }

    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<()> {
        self.holder.set_data(&self.real_path(key), value, ANY_VERSION).await
    }

    async fn delete_only_current(
        &self,
        key: &str,
    ) -> Result<()> {
        let path = self.real_path(key);
        trace!(%path, "provider delete");
        self.holder.delete(&path, ANY_VERSION).await
    }

    fn transaction(&self) -> Transaction {
        Transaction::new(self.root_node.clone(), self.holder.clone(), self.acl())
    }
}
