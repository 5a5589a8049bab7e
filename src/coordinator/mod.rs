//! Connection handle to the coordination service.
//!
//! [`Coordinator`] is the primitive call surface every provider, strategy and
//! transaction is built on. The wire protocol lives behind it;
//! [`MemoryCoordinator`] is the in-process implementation used for embedding
//! and tests.

mod memory;
pub use memory::*;


use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Node lifetime and naming semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CreateMode {
    #[default]
    Persistent,
    PersistentSequential,
    /// Removed when the session that created it closes
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Credential registered with a connection, e.g. `digest` / `user:password`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    pub scheme: String,
    pub auth: String,
}

impl AuthEntry {
    pub fn new(
        scheme: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            auth: auth.into(),
        }
    }
}

/// Access control entry attached to created nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acl {
    /// World readable and writable
    Open,
    /// Full access for the listed authorities only
    Creator(Vec<AuthEntry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub path: String,
}

/// One-shot watch callback
pub type Watcher = Arc<dyn Fn(WatchedEvent) + Send + Sync>;

/// A single step of an atomic multi-operation
#[derive(Clone, PartialEq, Eq)]
pub enum Op {
    Check {
        path: String,
        version: i32,
    },
    Create {
        path: String,
        data: Vec<u8>,
        acl: Acl,
        mode: CreateMode,
    },
    SetData {
        path: String,
        data: Vec<u8>,
        version: i32,
    },
    Delete {
        path: String,
        version: i32,
    },
}

impl Op {
    pub fn path(&self) -> &str {
        match self {
            Op::Check { path, .. } | Op::Create { path, .. } | Op::SetData { path, .. } | Op::Delete { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Op::Check { path, version } => write!(f, "Check({path}, v{version})"),
            Op::Create { path, data, mode, .. } => write!(f, "Create({path}, {} bytes, {mode:?})", data.len()),
            Op::SetData { path, data, version } => write!(f, "SetData({path}, {} bytes, v{version})", data.len()),
            Op::Delete { path, version } => write!(f, "Delete({path}, v{version})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    Checked,
    /// Actual path of the created node (differs for sequential nodes)
    Created(String),
    DataSet,
    Deleted,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    /// Reads node data; `watch` registers the default watcher on the node.
    async fn get_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<u8>>;

    async fn exists(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<bool>;

    /// Registers `watcher` for the next change of `path`, whether or not it exists yet.
    async fn exists_with_watcher(
        &self,
        path: &str,
        watcher: Watcher,
    ) -> Result<bool>;

    /// Child node names (not full paths), sorted.
    async fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>>;

    /// Creates a node; returns the actual path, which differs for sequential modes.
    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String>;

    async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
        version: i32,
    ) -> Result<()>;

    async fn delete(
        &self,
        path: &str,
        version: i32,
    ) -> Result<()>;

    /// Applies every op or none of them.
    async fn multi(
        &self,
        ops: Vec<Op>,
    ) -> Result<Vec<OpResult>>;

    async fn add_auth(
        &self,
        auth: AuthEntry,
    ) -> Result<()>;

    /// Ends the session. Ephemeral nodes owned by it disappear.
    async fn close(&self) -> Result<()>;
}
