use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use mockall::predicate::eq;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::test_utils::CountingFactory;
use crate::ClientContext;
use crate::ClientSettings;
use crate::Coordinator;
use crate::CreateMode;
use crate::DelayRetryPolicy;
use crate::Error;
use crate::ExecStrategy;
use crate::MemoryCoordinator;
use crate::MockBaseClient;
use crate::MockExecStrategy;
use crate::NamespaceClient;
use crate::ServiceError;
use crate::StrategyContext;
use crate::StrategyType;
use crate::UsualClient;

const ROOT: &str = "/app/shard1";

/// Base client answering the accessors `select_strategy` needs
fn mock_base() -> MockBaseClient {
    let mut base = MockBaseClient::new();
    base.expect_root_node().return_const(ROOT.to_string());
    base.expect_holder()
        .returning(|| Arc::new(MemoryCoordinator::new()) as Arc<dyn Coordinator>);
    base.expect_authorities().returning(Vec::new);
    base.expect_delay_retry_policy().returning(DelayRetryPolicy::default);
    base.expect_cancel_token().returning(CancellationToken::new);
    base
}

/// Facade whose every strategy is a mock prepared by `setup`
fn mocked_client(
    base: MockBaseClient,
    setup: impl Fn(&mut MockExecStrategy) + Send + Sync + 'static,
) -> UsualClient {
    let factory = move |_kind: StrategyType, _ctx: StrategyContext| -> Box<dyn ExecStrategy> {
        let mut strategy = MockExecStrategy::new();
        setup(&mut strategy);
        Box::new(strategy)
    };
    let client = UsualClient::new(Arc::new(base), Arc::new(factory));
    client.select_strategy(StrategyType::Usual);
    client
}

/// Facade over a real namespace client on an in-memory coordinator
fn memory_client(factory: Arc<CountingFactory>) -> (Arc<MemoryCoordinator>, UsualClient) {
    let mut settings = ClientSettings::default();
    settings.client.root_path = ROOT.to_string();
    let coordinator = Arc::new(MemoryCoordinator::new());
    let ctx = Arc::new(ClientContext::new(settings, coordinator.clone()));
    let client = UsualClient::new(Arc::new(NamespaceClient::new(ctx)), factory);
    (coordinator, client)
}

#[test]
fn test_select_strategy_reuses_cached_instance() {
    let factory = Arc::new(CountingFactory::default());
    let (_coordinator, client) = memory_client(factory.clone());
    assert!(client.strategy().is_none());

    client.select_strategy(StrategyType::SyncRetry);
    let first = client.strategy().unwrap();
    client.select_strategy(StrategyType::Contend);
    client.select_strategy(StrategyType::SyncRetry);
    let second = client.strategy().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.kind(), StrategyType::SyncRetry);
    assert_eq!(factory.builds_of(StrategyType::SyncRetry), 1);
    assert_eq!(factory.builds_of(StrategyType::Contend), 1);
    assert_eq!(client.cached_strategies(), 2);
}

#[test]
#[traced_test]
fn test_concurrent_first_selection_builds_once() {
    const CALLERS: usize = 16;
    let factory = Arc::new(CountingFactory::default());
    let (_coordinator, client) = memory_client(factory.clone());
    let client = Arc::new(client);
    let barrier = Arc::new(Barrier::new(CALLERS));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let client = client.clone();
            let barrier = barrier.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                barrier.wait();
                client.select_strategy(StrategyType::AsyncRetry);
                seen.lock().push(client.strategy().unwrap());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(factory.total(), 1);
    let seen = seen.lock();
    assert_eq!(seen.len(), CALLERS);
    assert!(seen.iter().all(|s| Arc::ptr_eq(s, &seen[0])));
}

#[tokio::test]
async fn test_calls_without_strategy_fail() {
    let (_coordinator, client) = memory_client(Arc::new(CountingFactory::default()));

    assert!(matches!(client.get_data("k").await, Err(Error::NoActiveStrategy)));
    assert!(matches!(client.transaction(), Err(Error::NoActiveStrategy)));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let result = client
        .delete_leaf_with_callback(
            "k",
            Box::new(move |path, result| {
                let _ = tx.send((path, matches!(result, Err(Error::NoActiveStrategy))));
            }),
        )
        .await;
    assert!(matches!(result, Err(Error::NoActiveStrategy)));
    assert_eq!(rx.await.unwrap(), ("k".to_string(), true));
}

#[tokio::test]
async fn test_create_root_only_ensures_namespace() {
    let mut base = mock_base();
    base.expect_create_namespace().times(2).returning(|| Ok(()));
    // the mock strategy has no create expectations: any create call panics
    let client = mocked_client(base, |_| {});

    client.create_leaf(ROOT, "ignored", CreateMode::Persistent).await.unwrap();
    client.create_path(ROOT, "ignored", CreateMode::Ephemeral).await.unwrap();
}

#[tokio::test]
async fn test_create_below_root_ensures_namespace_then_delegates() {
    let mut base = mock_base();
    base.expect_create_namespace().times(1).returning(|| Ok(()));
    let client = mocked_client(base, |s| {
        s.expect_create_all_need_path()
            .withf(|key, value, mode| key == "/app/shard1/nodeA" && value == "v1" && *mode == CreateMode::Persistent)
            .times(1)
            .returning(|_, _, _| Ok(()));
    });

    client
        .create_path("/app/shard1/nodeA", "v1", CreateMode::Persistent)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_namespace_failure_stops_create() {
    let mut base = mock_base();
    base.expect_create_namespace()
        .times(1)
        .returning(|| Err(ServiceError::ConnectionLoss.into()));
    let client = mocked_client(base, |_| {});

    let err = client.create_leaf("/app/shard1/a", "v", CreateMode::Persistent).await.unwrap_err();
    assert_eq!(err.service(), Some(&ServiceError::ConnectionLoss));
}

#[tokio::test]
async fn test_delete_root_redirects_to_namespace_delete() {
    let mut base = mock_base();
    base.expect_delete_namespace().times(1).returning(|| Ok(()));
    let client = mocked_client(base, |_| {});

    client.delete_leaf(ROOT).await.unwrap();
}

#[tokio::test]
async fn test_delete_root_with_callback_invokes_callback_once() {
    let mut base = mock_base();
    base.expect_delete_namespace()
        .times(1)
        .returning(|| Err(ServiceError::NotEmpty(ROOT.to_string()).into()));
    let client = mocked_client(base, |_| {});

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    client
        .delete_leaf_with_callback(
            ROOT,
            Box::new(move |path, result| sink.lock().push((path, result.is_err()))),
        )
        .await
        .unwrap();
    assert_eq!(*calls.lock(), vec![(ROOT.to_string(), true)]);
}

#[tokio::test]
async fn test_delete_leaf_below_root_delegates() {
    let mut base = mock_base();
    base.expect_delete_namespace().never();
    let client = mocked_client(base, |s| {
        s.expect_delete_only_current()
            .with(eq("/app/shard1/a"))
            .times(1)
            .returning(|_| Err(ServiceError::NoNode("/app/shard1/a".to_string()).into()));
    });

    // errors from the strategy are never swallowed
    assert!(client.delete_leaf("/app/shard1/a").await.unwrap_err().is_no_node());
}

#[tokio::test]
async fn test_delete_all_children_of_root_clears_flag() {
    let mut base = mock_base();
    base.expect_set_root_exist().with(eq(false)).times(1).return_const(());
    let client = mocked_client(base, |s| {
        s.expect_delete_all_children().times(2).returning(|_| Ok(()));
    });

    client.delete_all_children(ROOT).await.unwrap();
    // other paths leave the flag alone
    client.delete_all_children("/app/shard1/a").await.unwrap();
}

#[tokio::test]
async fn test_delete_all_children_failure_keeps_flag() {
    let mut base = mock_base();
    base.expect_set_root_exist().never();
    let client = mocked_client(base, |s| {
        s.expect_delete_all_children()
            .returning(|_| Err(ServiceError::ConnectionLoss.into()));
    });

    assert!(client.delete_all_children(ROOT).await.is_err());
}

#[tokio::test]
async fn test_delete_branch_clears_flag_when_root_is_gone() {
    let mut base = mock_base();
    base.expect_set_root_exist().with(eq(false)).times(1).return_const(());
    let client = mocked_client(base, |s| {
        s.expect_delete_current_branch().times(1).returning(|_| Ok(()));
        s.expect_check_exists().with(eq(ROOT)).times(1).returning(|_| Ok(false));
    });

    client.delete_branch("/app/shard1/a/b").await.unwrap();
}

#[tokio::test]
async fn test_delete_branch_keeps_flag_while_root_exists() {
    let mut base = mock_base();
    base.expect_set_root_exist().never();
    let client = mocked_client(base, |s| {
        s.expect_delete_current_branch().times(1).returning(|_| Ok(()));
        s.expect_check_exists().with(eq(ROOT)).times(1).returning(|_| Ok(true));
    });

    client.delete_branch("/app/shard1/a/b").await.unwrap();
}

#[tokio::test]
async fn test_reads_and_update_delegate() {
    let client = mocked_client(mock_base(), |s| {
        s.expect_get_data_string()
            .with(eq("k"))
            .returning(|_| Ok("v".to_string()));
        s.expect_get_children()
            .with(eq("/app/shard1"))
            .returning(|_| Ok(vec!["a".to_string()]));
        s.expect_check_exists().with(eq("k")).returning(|_| Ok(true));
        s.expect_update()
            .withf(|key, value| key == "k" && value == "w")
            .times(1)
            .returning(|_, _| Ok(()));
    });

    assert_eq!(client.get_string("k").await.unwrap(), "v");
    assert_eq!(client.get_children(ROOT).await.unwrap(), vec!["a".to_string()]);
    assert!(client.exists("k").await.unwrap());
    client.update("k", "w").await.unwrap();
}

#[tokio::test]
async fn test_close_resets_cache_and_propagates_base_error() {
    let mut base = mock_base();
    base.expect_close()
        .times(1)
        .returning(|| Err(ServiceError::SessionExpired.into()));
    let builds = Arc::new(Mutex::new(0));
    let counter = builds.clone();
    let client = mocked_client(base, move |_| *counter.lock() += 1);
    let before = client.strategy().unwrap();

    let err = client.close().await.unwrap_err();
    assert_eq!(err.service(), Some(&ServiceError::SessionExpired));
    assert!(client.strategy().is_none());
    assert_eq!(client.cached_strategies(), 0);

    client.select_strategy(StrategyType::Usual);
    let after = client.strategy().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(*builds.lock(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_unknown_strategy_name_behaves_as_usual() {
    let factory = Arc::new(CountingFactory::default());
    let (_coordinator, client) = memory_client(factory.clone());

    client.select_strategy(StrategyType::from("NOT_A_STRATEGY"));
    assert_eq!(client.strategy_type(), Some(StrategyType::Usual));
    assert_eq!(factory.builds_of(StrategyType::Usual), 1);
    assert!(logs_contain("falling back to USUAL"));

    client.create_path("/app/shard1/k", "v", CreateMode::Persistent).await.unwrap();
    assert_eq!(client.get_string("/app/shard1/k").await.unwrap(), "v");
}

#[tokio::test]
async fn test_sync_retry_scenario_on_memory_coordinator() {
    let (coordinator, client) = memory_client(Arc::new(CountingFactory::default()));
    client.select_strategy(StrategyType::SyncRetry);

    client
        .create_path("/app/shard1/nodeA", "v1", CreateMode::Persistent)
        .await
        .unwrap();
    assert!(client.base().is_root_exist());
    assert_eq!(client.get_string("/app/shard1/nodeA").await.unwrap(), "v1");

    client.delete_leaf(ROOT).await.unwrap();
    assert!(!client.base().is_root_exist());
    assert!(!coordinator.exists(ROOT, false).await.unwrap());
    assert!(coordinator.exists("/app", false).await.unwrap());
}

#[tokio::test]
async fn test_delete_branch_emptying_root_on_memory_coordinator() {
    let (coordinator, client) = memory_client(Arc::new(CountingFactory::default()));
    client.select_strategy(StrategyType::TransactionContend);

    client.create_path("/app/shard1/a/b", "", CreateMode::Persistent).await.unwrap();
    assert!(client.base().is_root_exist());

    client.delete_branch("/app/shard1/a/b").await.unwrap();
    assert!(!client.base().is_root_exist());
    assert!(!coordinator.exists(ROOT, false).await.unwrap());

    // the namespace comes back on the next create
    client.create_leaf("/app/shard1/c", "", CreateMode::Persistent).await.unwrap();
    assert!(client.base().is_root_exist());
    assert!(coordinator.exists("/app/shard1/c", false).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_active_strategy_stays_cached_when_close_races_select() {
    let factory = Arc::new(CountingFactory::default());
    let (_coordinator, client) = memory_client(factory.clone());
    let client = Arc::new(client);

    for _ in 0..200 {
        client.select_strategy(StrategyType::SyncRetry);
        let selector = {
            let client = client.clone();
            thread::spawn(move || client.select_strategy(StrategyType::SyncRetry))
        };
        client.close().await.unwrap();
        selector.join().unwrap();

        // whatever won the race, the active strategy must be the cached one
        if let Some(active) = client.strategy() {
            let builds = factory.total();
            client.select_strategy(active.kind());
            assert!(Arc::ptr_eq(&active, &client.strategy().unwrap()));
            assert_eq!(factory.total(), builds);
        }
    }
}
