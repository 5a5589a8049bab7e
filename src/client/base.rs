use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::ClientContext;
use crate::collect_subtree;
use crate::constants::ANY_VERSION;
use crate::utils::path;
use crate::Acl;
use crate::AuthEntry;
use crate::BaseProvider;
use crate::Coordinator;
use crate::CreateMode;
use crate::DelayRetryPolicy;
use crate::Result;

/// Connection, namespace and lifecycle services the dispatch facade builds on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BaseClient: Send + Sync + 'static {
    /// Namespace root every managed node lives under
    fn root_node(&self) -> String;

    fn holder(&self) -> Arc<dyn Coordinator>;

    fn authorities(&self) -> Vec<AuthEntry>;

    fn delay_retry_policy(&self) -> DelayRetryPolicy;

    fn cancel_token(&self) -> CancellationToken;

    /// Registers the configured authorities with the connection.
    async fn start(&self) -> Result<()>;

    /// Makes sure the root path exists. Cheap once the root is known to exist.
    async fn create_namespace(&self) -> Result<()>;

    /// Removes the root and everything below it.
    async fn delete_namespace(&self) -> Result<()>;

    fn set_root_exist(
        &self,
        exist: bool,
    );

    fn is_root_exist(&self) -> bool;

    /// Aborts pending waits, then closes the connection.
    async fn close(&self) -> Result<()>;
}

/// [`BaseClient`] over a [`ClientContext`], tracking whether the root exists.
pub struct NamespaceClient {
    ctx: Arc<ClientContext>,
    root_exist: AtomicBool,
}

impl NamespaceClient {
    pub fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            ctx,
            root_exist: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    fn acl(&self) -> Acl {
        if self.ctx.authorities.is_empty() {
            Acl::Open
        } else {
            Acl::Creator(self.ctx.authorities.clone())
        }
    }
}

#[async_trait]
impl BaseClient for NamespaceClient {
    fn root_node(&self) -> String {
        self.ctx.root_path.clone()
    }

    fn holder(&self) -> Arc<dyn Coordinator> {
        self.ctx.holder.clone()
    }

    fn authorities(&self) -> Vec<AuthEntry> {
        self.ctx.authorities.clone()
    }

    fn delay_retry_policy(&self) -> DelayRetryPolicy {
        self.ctx.retry_policy
    }

    fn cancel_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    async fn start(&self) -> Result<()> {
        for auth in &self.ctx.authorities {
            debug!(scheme = %auth.scheme, "register authority");
            self.ctx.holder.add_auth(auth.clone()).await?;
        }
        Ok(())
    }

    async fn create_namespace(&self) -> Result<()> {
        if self.is_root_exist() {
            return Ok(());
        }

        let root = &self.ctx.root_path;
        let mut segments = path::ancestors(root);
        if root != crate::constants::PATH_SEPARATOR {
            segments.push(root.clone());
        }
        for segment in segments {
            match self
                .ctx
                .holder
                .create(&segment, Vec::new(), self.acl(), CreateMode::Persistent)
                .await
            {
                Ok(_) => debug!(%segment, "created namespace segment"),
                Err(e) if e.is_node_exists() => {}
                Err(e) => return Err(e),
            }
        }

        info!(%root, "namespace ready");
        self.set_root_exist(true);
        Ok(())
    }

    async fn delete_namespace(&self) -> Result<()> {
        let root = &self.ctx.root_path;
        let provider = BaseProvider::new(root.clone(), self.ctx.holder.clone(), false, self.authorities());
        let nodes = match collect_subtree(&provider, root).await {
            Ok(nodes) => nodes,
            Err(e) if e.is_no_node() => Vec::new(),
            Err(e) => return Err(e),
        };

        for node in nodes {
            // "/" itself can never be removed
            if node == crate::constants::PATH_SEPARATOR {
                continue;
            }
            match self.ctx.holder.delete(&node, ANY_VERSION).await {
                Ok(()) => {}
                Err(e) if e.is_no_node() => {}
                Err(e) => return Err(e),
            }
        }

        info!(%root, "namespace deleted");
        self.set_root_exist(false);
        Ok(())
    }

    fn set_root_exist(
        &self,
        exist: bool,
    ) {
        let previous = self.root_exist.swap(exist, Ordering::SeqCst);
        if previous != exist {
            debug!(root = %self.ctx.root_path, exist, "root state changed");
        }
    }

    fn is_root_exist(&self) -> bool {
        self.root_exist.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.ctx.cancel.cancel();
        info!(root = %self.ctx.root_path, "closing client");
        self.ctx.holder.close().await
    }
}
