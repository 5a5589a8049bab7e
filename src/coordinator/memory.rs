use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::Acl;
use super::AuthEntry;
use super::Coordinator;
use super::CreateMode;
use super::EventType;
use super::Op;
use super::OpResult;
use super::WatchedEvent;
use super::Watcher;
use crate::constants::ANY_VERSION;
use crate::constants::PATH_SEPARATOR;
use crate::constants::SEQUENTIAL_SUFFIX_WIDTH;
use crate::utils::path;
use crate::Result;
use crate::ServiceError;

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    version: i32,
    acl: Acl,
    /// Owning session of an ephemeral node
    owner: Option<u64>,
    /// Counter for sequential children
    next_sequence: u32,
}

impl Node {
    fn new(
        data: Vec<u8>,
        acl: Acl,
        owner: Option<u64>,
    ) -> Self {
        Self {
            data,
            version: 0,
            acl,
            owner,
            next_sequence: 0,
        }
    }
}

/// Node tree shared by every session opened on the same store
struct Store {
    nodes: RwLock<BTreeMap<String, Node>>,
    watchers: Mutex<HashMap<String, Vec<Watcher>>>,
    next_session: AtomicU64,
}

impl Store {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PATH_SEPARATOR.to_string(), Node::new(Vec::new(), Acl::Open, None));
        Self {
            nodes: RwLock::new(nodes),
            watchers: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        }
    }

    fn register_watcher(
        &self,
        path: &str,
        watcher: Watcher,
    ) {
        self.watchers.lock().entry(path.to_string()).or_default().push(watcher);
    }

    /// Fires and drops every watcher registered on an event's path.
    fn fire(
        &self,
        events: Vec<WatchedEvent>,
    ) {
        for event in events {
            let triggered = self.watchers.lock().remove(&event.path);
            if let Some(watchers) = triggered {
                trace!(?event, count = watchers.len(), "fire watchers");
                for watcher in watchers {
                    watcher(event.clone());
                }
            }
        }
    }
}

/// Per-call view of the session applying an operation
struct Session<'a> {
    id: u64,
    authorities: &'a [AuthEntry],
}

impl Session<'_> {
    fn check_acl(
        &self,
        node: &Node,
        path: &str,
    ) -> Result<()> {
        match &node.acl {
            Acl::Open => Ok(()),
            Acl::Creator(allowed) if allowed.iter().any(|a| self.authorities.contains(a)) => Ok(()),
            Acl::Creator(_) => Err(ServiceError::NoAuth(path.to_string()).into()),
        }
    }
}

/// Operation counters, handy for asserting what reached the service
#[derive(Debug, Default)]
pub struct OpStats {
    reads: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    multis: AtomicUsize,
}

impl OpStats {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
    pub fn multis(&self) -> usize {
        self.multis.load(Ordering::SeqCst)
    }
}

/// In-process coordination service session.
///
/// Every `MemoryCoordinator` is one session. [`MemoryCoordinator::new_session`]
/// opens another session on the same node tree, so ephemeral ownership,
/// watches and contention between clients behave as they would against a
/// shared server.
pub struct MemoryCoordinator {
    store: Arc<Store>,
    session_id: u64,
    authorities: RwLock<Vec<AuthEntry>>,
    default_watcher: Option<Watcher>,
    closed: AtomicBool,
    faults: Mutex<VecDeque<crate::ServiceError>>,
    stats: OpStats,
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::on_store(Arc::new(Store::new()))
    }

    fn on_store(store: Arc<Store>) -> Self {
        let session_id = store.next_session.fetch_add(1, Ordering::SeqCst);
        Self {
            store,
            session_id,
            authorities: RwLock::new(Vec::new()),
            default_watcher: None,
            closed: AtomicBool::new(false),
            faults: Mutex::new(VecDeque::new()),
            stats: OpStats::default(),
        }
    }

    /// Opens another session sharing this session's node tree.
    pub fn new_session(&self) -> Self {
        Self::on_store(self.store.clone())
    }

    /// Watcher registered by reads issued with `watch = true`.
    pub fn with_default_watcher(
        mut self,
        watcher: Watcher,
    ) -> Self {
        self.default_watcher = Some(watcher);
        self
    }

    /// The next calls fail with these errors, one per call, in order.
    pub fn inject_faults(
        &self,
        faults: impl IntoIterator<Item = ServiceError>,
    ) {
        self.faults.lock().extend(faults);
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn stats(&self) -> &OpStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of every node path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.store.nodes.read().keys().cloned().collect()
    }

    fn precheck(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ServiceError::SessionExpired.into());
        }
        if let Some(fault) = self.faults.lock().pop_front() {
            debug!(?fault, "injected fault");
            return Err(fault.into());
        }
        Ok(())
    }

    fn maybe_watch(
        &self,
        path: &str,
        watch: bool,
    ) {
        if watch {
            if let Some(w) = &self.default_watcher {
                self.store.register_watcher(path, w.clone());
            }
        }
    }

    /// Applies `ops` in order to the live tree, or to nothing on the first failure.
    fn apply_all(
        &self,
        ops: &[Op],
    ) -> Result<Vec<OpResult>> {
        let authorities = self.authorities.read().clone();
        let session = Session {
            id: self.session_id,
            authorities: &authorities,
        };
        let mut events = Vec::new();
        let results = {
            let mut nodes = self.store.nodes.write();
            if ops.len() == 1 {
                vec![apply(&mut nodes, &ops[0], &session, &mut events)?]
            } else {
                let mut staged = nodes.clone();
                let mut results = Vec::with_capacity(ops.len());
                for op in ops {
                    results.push(apply(&mut staged, op, &session, &mut events)?);
                }
                *nodes = staged;
                results
            }
        };
        self.store.fire(events);
        Ok(results)
    }
}

fn children_of<'a>(
    nodes: &'a BTreeMap<String, Node>,
    parent: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    let prefix = if parent == PATH_SEPARATOR {
        PATH_SEPARATOR.to_string()
    } else {
        format!("{parent}/")
    };
    nodes
        .range(prefix.clone()..)
        .take_while(move |(k, _)| k.starts_with(&prefix))
        .filter(move |(k, _)| {
            let rest = &k[if parent == PATH_SEPARATOR { 1 } else { parent.len() + 1 }..];
            !rest.is_empty() && !rest.contains('/')
        })
        .map(|(k, _)| k)
}

fn check_version(
    node: &Node,
    path: &str,
    version: i32,
) -> Result<()> {
    if version != ANY_VERSION && node.version != version {
        return Err(ServiceError::BadVersion(path.to_string()).into());
    }
    Ok(())
}

fn apply(
    nodes: &mut BTreeMap<String, Node>,
    op: &Op,
    session: &Session<'_>,
    events: &mut Vec<WatchedEvent>,
) -> Result<OpResult> {
    let target = op.path();
    if !path::is_valid_path(target) {
        return Err(ServiceError::InvalidPath(target.to_string()).into());
    }

    match op {
        Op::Check { path, version } => {
            let node = nodes.get(path).ok_or_else(|| ServiceError::NoNode(path.clone()))?;
            check_version(node, path, *version)?;
            Ok(OpResult::Checked)
        }
        Op::Create { path, data, acl, mode } => {
            let parent_path =
                path::parent(path).ok_or_else(|| ServiceError::NodeExists(PATH_SEPARATOR.to_string()))?;
            let parent = nodes
                .get_mut(parent_path)
                .ok_or_else(|| ServiceError::NoNode(parent_path.to_string()))?;
            session.check_acl(parent, parent_path)?;
            if parent.owner.is_some() {
                return Err(ServiceError::NoChildrenForEphemerals(parent_path.to_string()).into());
            }

            let actual = if mode.is_sequential() {
                let seq = parent.next_sequence;
                parent.next_sequence += 1;
                format!("{path}{seq:0width$}", width = SEQUENTIAL_SUFFIX_WIDTH)
            } else {
                path.clone()
            };
            if nodes.contains_key(&actual) {
                return Err(ServiceError::NodeExists(actual).into());
            }

            let owner = mode.is_ephemeral().then_some(session.id);
            nodes.insert(actual.clone(), Node::new(data.clone(), acl.clone(), owner));
            events.push(WatchedEvent {
                event_type: EventType::NodeCreated,
                path: actual.clone(),
            });
            events.push(WatchedEvent {
                event_type: EventType::NodeChildrenChanged,
                path: parent_path.to_string(),
            });
            Ok(OpResult::Created(actual))
        }
        Op::SetData { path, data, version } => {
            let node = nodes.get_mut(path).ok_or_else(|| ServiceError::NoNode(path.clone()))?;
            session.check_acl(node, path)?;
            check_version(node, path, *version)?;
            node.data = data.clone();
            node.version += 1;
            events.push(WatchedEvent {
                event_type: EventType::NodeDataChanged,
                path: path.clone(),
            });
            Ok(OpResult::DataSet)
        }
        Op::Delete { path, version } => {
            if path == PATH_SEPARATOR {
                return Err(ServiceError::InvalidPath(path.clone()).into());
            }
            let node = nodes.get(path).ok_or_else(|| ServiceError::NoNode(path.clone()))?;
            session.check_acl(node, path)?;
            check_version(node, path, *version)?;
            if children_of(nodes, path).next().is_some() {
                return Err(ServiceError::NotEmpty(path.clone()).into());
            }
            nodes.remove(path);
            events.push(WatchedEvent {
                event_type: EventType::NodeDeleted,
                path: path.clone(),
            });
            if let Some(parent) = path::parent(path) {
                events.push(WatchedEvent {
                    event_type: EventType::NodeChildrenChanged,
                    path: parent.to_string(),
                });
            }
            Ok(OpResult::Deleted)
        }
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn get_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<u8>> {
        self.precheck()?;
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        trace!(path, "get_data");
        let data = {
            let nodes = self.store.nodes.read();
            let node = nodes.get(path).ok_or_else(|| ServiceError::NoNode(path.to_string()))?;
            let authorities = self.authorities.read();
            Session {
                id: self.session_id,
                authorities: &authorities,
            }
            .check_acl(node, path)?;
            node.data.clone()
        };
        self.maybe_watch(path, watch);
        Ok(data)
    }

    async fn exists(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<bool> {
        self.precheck()?;
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        let exists = self.store.nodes.read().contains_key(path);
        trace!(path, exists, "exists");
        self.maybe_watch(path, watch);
        Ok(exists)
    }

    async fn exists_with_watcher(
        &self,
        path: &str,
        watcher: Watcher,
    ) -> Result<bool> {
        self.precheck()?;
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        // Registered under the tree lock so no change can slip between check and watch
        let nodes = self.store.nodes.read();
        self.store.register_watcher(path, watcher);
        Ok(nodes.contains_key(path))
    }

    async fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>> {
        self.precheck()?;
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        let children = {
            let nodes = self.store.nodes.read();
            if !nodes.contains_key(path) {
                return Err(ServiceError::NoNode(path.to_string()).into());
            }
            children_of(&nodes, path).map(|p| path::node_name(p).to_string()).collect()
        };
        self.maybe_watch(path, watch);
        Ok(children)
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String> {
        self.precheck()?;
        self.stats.creates.fetch_add(1, Ordering::SeqCst);
        trace!(path, ?mode, "create");
        let op = Op::Create {
            path: path.to_string(),
            data,
            acl,
            mode,
        };
        match self.apply_all(std::slice::from_ref(&op))?.pop() {
            Some(OpResult::Created(actual)) => Ok(actual),
            other => Err(crate::Error::Fatal(format!("unexpected create result: {other:?}"))),
        }
    }

    async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
        version: i32,
    ) -> Result<()> {
        self.precheck()?;
        self.stats.updates.fetch_add(1, Ordering::SeqCst);
        trace!(path, "set_data");
        self.apply_all(&[Op::SetData {
            path: path.to_string(),
            data,
            version,
        }])?;
        Ok(())
    }

    async fn delete(
        &self,
        path: &str,
        version: i32,
    ) -> Result<()> {
        self.precheck()?;
        self.stats.deletes.fetch_add(1, Ordering::SeqCst);
        trace!(path, "delete");
        self.apply_all(&[Op::Delete {
            path: path.to_string(),
            version,
        }])?;
        Ok(())
    }

    async fn multi(
        &self,
        ops: Vec<Op>,
    ) -> Result<Vec<OpResult>> {
        self.precheck()?;
        self.stats.multis.fetch_add(1, Ordering::SeqCst);
        debug!(?ops, "multi");
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        self.apply_all(&ops)
    }

    async fn add_auth(
        &self,
        auth: AuthEntry,
    ) -> Result<()> {
        self.precheck()?;
        let mut authorities = self.authorities.write();
        if !authorities.contains(&auth) {
            authorities.push(auth);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut events = Vec::new();
        {
            let mut nodes = self.store.nodes.write();
            let owned: Vec<String> = nodes
                .iter()
                .filter(|(_, n)| n.owner == Some(self.session_id))
                .map(|(k, _)| k.clone())
                .collect();
            for p in owned {
                nodes.remove(&p);
                events.push(WatchedEvent {
                    event_type: EventType::NodeDeleted,
                    path: p.clone(),
                });
                if let Some(parent) = path::parent(&p) {
                    events.push(WatchedEvent {
                        event_type: EventType::NodeChildrenChanged,
                        path: parent.to_string(),
                    });
                }
            }
        }
        info!(session = self.session_id, "memory session closed");
        self.store.fire(events);
        Ok(())
    }
}
