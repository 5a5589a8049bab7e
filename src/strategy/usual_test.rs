use std::sync::Arc;

use parking_lot::Mutex;

use crate::test_utils::memory_provider;
use crate::test_utils::recording_watcher;
use crate::Acl;
use crate::Coordinator;
use crate::CreateMode;
use crate::Error;
use crate::EventType;
use crate::ExecStrategy;
use crate::ServiceError;
use crate::UsualStrategy;

#[tokio::test]
async fn test_create_all_need_path_creates_missing_ancestors() {
    let (coordinator, provider) = memory_provider("/app/shard1");
    coordinator
        .create("/app", Vec::new(), Acl::Open, CreateMode::Persistent)
        .await
        .unwrap();
    let strategy = UsualStrategy::new(provider);

    strategy
        .create_all_need_path("/app/shard1/a/b", "v", CreateMode::Persistent)
        .await
        .unwrap();

    assert_eq!(
        coordinator.paths(),
        vec!["/", "/app", "/app/shard1", "/app/shard1/a", "/app/shard1/a/b"]
    );
    assert_eq!(strategy.get_data_string("a/b").await.unwrap(), "v");
    assert!(strategy.get_data("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_all_need_path_tolerates_existing_ancestors_only() {
    let (_coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);

    strategy.create_all_need_path("x/y", "1", CreateMode::Persistent).await.unwrap();
    strategy.create_all_need_path("x/z", "2", CreateMode::Persistent).await.unwrap();
    let err = strategy.create_all_need_path("x/y", "3", CreateMode::Persistent).await.unwrap_err();
    assert!(err.is_node_exists());
    assert_eq!(strategy.get_children("x").await.unwrap(), vec!["y".to_string(), "z".to_string()]);
}

#[tokio::test]
async fn test_create_current_only_needs_parent() {
    let (_coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);

    strategy.create_current_only("/app", "", CreateMode::Persistent).await.unwrap();
    let err = strategy.create_current_only("a/b", "", CreateMode::Persistent).await.unwrap_err();
    assert!(err.is_no_node());
}

#[tokio::test]
async fn test_update_and_read_string() {
    let (_coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    strategy.create_all_need_path("k", "old", CreateMode::Persistent).await.unwrap();

    strategy.update("k", "new").await.unwrap();
    assert_eq!(strategy.get_data_string("k").await.unwrap(), "new");
    assert!(strategy.update("missing", "x").await.unwrap_err().is_no_node());
}

#[tokio::test]
async fn test_get_data_string_rejects_binary_payload() {
    let (coordinator, provider) = memory_provider("/app");
    coordinator
        .create("/app", vec![0xff, 0xfe], Acl::Open, CreateMode::Persistent)
        .await
        .unwrap();
    let strategy = UsualStrategy::new(provider);

    assert!(matches!(
        strategy.get_data_string("/app").await,
        Err(Error::InvalidData(path)) if path == "/app"
    ));
}

#[tokio::test]
async fn test_delete_all_children_removes_subtree_and_key() {
    let (coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    strategy.create_all_need_path("a/b/c", "", CreateMode::Persistent).await.unwrap();
    strategy.create_all_need_path("a/d", "", CreateMode::Persistent).await.unwrap();
    strategy.create_all_need_path("e", "", CreateMode::Persistent).await.unwrap();

    strategy.delete_all_children("a").await.unwrap();
    assert_eq!(coordinator.paths(), vec!["/", "/app", "/app/e"]);
    assert!(strategy.delete_all_children("a").await.unwrap_err().is_no_node());
}

#[tokio::test]
async fn test_delete_current_branch_prunes_empty_ancestors_up_to_root() {
    let (coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    strategy.create_all_need_path("a/b/c", "", CreateMode::Persistent).await.unwrap();

    strategy.delete_current_branch("a/b/c").await.unwrap();
    // the namespace root itself went away with its last child
    assert_eq!(coordinator.paths(), vec!["/"]);
}

#[tokio::test]
async fn test_delete_current_branch_stops_at_non_empty_ancestor() {
    let (coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    strategy.create_all_need_path("a/b/c", "", CreateMode::Persistent).await.unwrap();
    strategy.create_all_need_path("a/x", "", CreateMode::Persistent).await.unwrap();

    strategy.delete_current_branch("a/b/c").await.unwrap();
    assert_eq!(coordinator.paths(), vec!["/", "/app", "/app/a", "/app/a/x"]);
}

#[tokio::test]
async fn test_callbacks_receive_real_path_and_outcome() {
    let (_coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    strategy.create_all_need_path("k", "v", CreateMode::Persistent).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    strategy
        .get_data_with_callback(
            "k",
            Box::new(move |path, result| sink.lock().push((path, result.map_err(|e| e.to_string())))),
        )
        .await
        .unwrap();
    assert_eq!(*seen.lock(), vec![("/app/k".to_string(), Ok(b"v".to_vec()))]);

    let outcome = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    strategy
        .delete_only_current_with_callback("missing", Box::new(move |path, result| *sink.lock() = Some((path, result))))
        .await
        .unwrap();
    let (path, result) = outcome.lock().take().unwrap();
    assert_eq!(path, "/app/missing");
    assert_eq!(
        result.unwrap_err().service(),
        Some(&ServiceError::NoNode("/app/missing".to_string()))
    );
}

#[tokio::test]
async fn test_check_exists_with_watcher_sees_creation() {
    let (_coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    let (watcher, events) = recording_watcher();

    assert!(!strategy.check_exists_with_watcher("k", watcher).await.unwrap());
    strategy.create_all_need_path("k", "", CreateMode::Persistent).await.unwrap();
    assert!(strategy.check_exists("k").await.unwrap());

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::NodeCreated);
    assert_eq!(events[0].path, "/app/k");
}

#[tokio::test]
async fn test_errors_pass_through_unchanged() {
    let (coordinator, provider) = memory_provider("/app");
    let strategy = UsualStrategy::new(provider);
    coordinator.inject_faults([ServiceError::ConnectionLoss]);

    let err = strategy.check_exists("k").await.unwrap_err();
    assert_eq!(err.service(), Some(&ServiceError::ConnectionLoss));
    assert_eq!(coordinator.stats().reads(), 0);
}
