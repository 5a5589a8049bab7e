//! Multi-operation transactions.
//!
//! A [`Transaction`] collects ordered operations against one namespace and
//! submits them in a single all-or-nothing `multi` call on commit.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::constants::ANY_VERSION;
use crate::utils::path;
use crate::Acl;
use crate::Coordinator;
use crate::CreateMode;
use crate::Op;
use crate::OpResult;
use crate::Result;

pub struct Transaction {
    root_node: String,
    holder: Arc<dyn Coordinator>,
    acl: Acl,
    ops: Vec<Op>,
}

impl fmt::Debug for Transaction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("root_node", &self.root_node)
            .field("ops", &self.ops)
            .finish()
    }
}

impl Transaction {
    pub fn new(
        root_node: impl Into<String>,
        holder: Arc<dyn Coordinator>,
        acl: Acl,
    ) -> Self {
        Self {
            root_node: root_node.into(),
            holder,
            acl,
            ops: Vec::new(),
        }
    }

    /// Fails the commit unless `key` exists.
    pub fn check(
        &mut self,
        key: &str,
    ) -> &mut Self {
        let path = self.real_path(key);
        self.ops.push(Op::Check {
            path,
            version: ANY_VERSION,
        });
        self
    }

    pub fn create(
        &mut self,
        key: &str,
        value: impl Into<Vec<u8>>,
        mode: CreateMode,
    ) -> &mut Self {
        let path = self.real_path(key);
        self.ops.push(Op::Create {
            path,
            data: value.into(),
            acl: self.acl.clone(),
            mode,
        });
        self
    }

    pub fn set_data(
        &mut self,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        let path = self.real_path(key);
        self.ops.push(Op::SetData {
            path,
            data: value.into(),
            version: ANY_VERSION,
        });
        self
    }

    pub fn delete(
        &mut self,
        key: &str,
    ) -> &mut Self {
        let path = self.real_path(key);
        self.ops.push(Op::Delete {
            path,
            version: ANY_VERSION,
        });
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn root_node(&self) -> &str {
        &self.root_node
    }

    /// Submits every collected op; none is applied if any fails.
    pub async fn commit(self) -> Result<Vec<OpResult>> {
        debug!(root = %self.root_node, ops = self.ops.len(), "commit transaction");
        if self.ops.is_empty() {
            return Ok(Vec::new());
        }
        self.holder.multi(self.ops).await
    }

    fn real_path(
        &self,
        key: &str,
    ) -> String {
        path::real_path(&self.root_node, key)
    }
}
