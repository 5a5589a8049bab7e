//! Shared fixtures for the unit tests.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::BaseProvider;
use crate::DefaultStrategyFactory;
use crate::DelayRetryPolicy;
use crate::ExecStrategy;
use crate::MemoryCoordinator;
use crate::StrategyContext;
use crate::StrategyFactory;
use crate::StrategyType;
use crate::WatchedEvent;
use crate::Watcher;

/// Short delays so paused-clock tests stay readable
pub(crate) fn fast_policy(retry_count: usize) -> DelayRetryPolicy {
    DelayRetryPolicy::new(retry_count, 10, 100)
}

/// A fresh in-memory session plus a watched provider rooted at `root`.
///
/// The root node itself is not created.
pub(crate) fn memory_provider(root: &str) -> (Arc<MemoryCoordinator>, Arc<BaseProvider>) {
    let coordinator = Arc::new(MemoryCoordinator::new());
    let provider = Arc::new(BaseProvider::new(root, coordinator.clone(), true, Vec::new()));
    (coordinator, provider)
}

/// Watcher that records every event it receives
pub(crate) fn recording_watcher() -> (Watcher, Arc<Mutex<Vec<WatchedEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let watcher: Watcher = Arc::new(move |event| sink.lock().push(event));
    (watcher, events)
}

/// Wraps [`DefaultStrategyFactory`] and counts how often each kind is built.
#[derive(Default)]
pub(crate) struct CountingFactory {
    builds: Mutex<Vec<StrategyType>>,
    total: AtomicUsize,
}

impl CountingFactory {
    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn builds_of(
        &self,
        kind: StrategyType,
    ) -> usize {
        self.builds.lock().iter().filter(|k| **k == kind).count()
    }
}

impl StrategyFactory for CountingFactory {
    fn create(
        &self,
        kind: StrategyType,
        ctx: StrategyContext,
    ) -> Box<dyn ExecStrategy> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.builds.lock().push(kind);
        DefaultStrategyFactory.create(kind, ctx)
    }
}
