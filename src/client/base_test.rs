use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::Acl;
use crate::AuthEntry;
use crate::BaseClient;
use crate::ClientContext;
use crate::ClientSettings;
use crate::Coordinator;
use crate::CreateMode;
use crate::MemoryCoordinator;
use crate::NamespaceClient;
use crate::ServiceError;

fn namespace_client(
    root: &str,
    auths: Vec<AuthEntry>,
) -> (Arc<MemoryCoordinator>, NamespaceClient) {
    let mut settings = ClientSettings::default();
    settings.client.root_path = root.to_string();
    settings.client.auths = auths;
    let coordinator = Arc::new(MemoryCoordinator::new());
    let ctx = Arc::new(ClientContext::new(settings, coordinator.clone()));
    (coordinator, NamespaceClient::new(ctx))
}

#[tokio::test]
async fn test_create_namespace_creates_every_segment() {
    let (coordinator, client) = namespace_client("/app/shard1", Vec::new());
    assert!(!client.is_root_exist());

    client.create_namespace().await.unwrap();
    assert!(client.is_root_exist());
    assert_eq!(coordinator.paths(), vec!["/", "/app", "/app/shard1"]);
}

#[tokio::test]
async fn test_create_namespace_is_idempotent() {
    let (coordinator, client) = namespace_client("/app", Vec::new());
    coordinator
        .create("/app", Vec::new(), Acl::Open, CreateMode::Persistent)
        .await
        .unwrap();

    // root made by someone else
    client.create_namespace().await.unwrap();
    let creates = coordinator.stats().creates();
    client.create_namespace().await.unwrap();
    assert_eq!(coordinator.stats().creates(), creates);
}

#[tokio::test]
async fn test_create_namespace_propagates_other_failures() {
    let (coordinator, client) = namespace_client("/app", Vec::new());
    coordinator.inject_faults([ServiceError::ConnectionLoss]);

    let err = client.create_namespace().await.unwrap_err();
    assert_eq!(err.service(), Some(&ServiceError::ConnectionLoss));
    assert!(!client.is_root_exist());
}

#[tokio::test]
async fn test_delete_namespace_removes_subtree() {
    let (coordinator, client) = namespace_client("/app/shard1", Vec::new());
    client.create_namespace().await.unwrap();
    for path in ["/app/shard1/a", "/app/shard1/a/b", "/app/shard1/c"] {
        coordinator.create(path, Vec::new(), Acl::Open, CreateMode::Persistent).await.unwrap();
    }

    client.delete_namespace().await.unwrap();
    assert!(!client.is_root_exist());
    assert_eq!(coordinator.paths(), vec!["/", "/app"]);

    // nothing left to delete
    client.delete_namespace().await.unwrap();
}

#[tokio::test]
async fn test_start_registers_authorities() {
    let auth = AuthEntry::new("digest", "user:secret");
    let (coordinator, client) = namespace_client("/secure", vec![auth.clone()]);
    client.start().await.unwrap();
    client.create_namespace().await.unwrap();

    // the root is only accessible with the same authority
    let stranger = coordinator.new_session();
    let err = stranger.get_data("/secure", false).await.unwrap_err();
    assert_eq!(err.service(), Some(&ServiceError::NoAuth("/secure".to_string())));
    assert_eq!(client.authorities(), vec![auth]);
}

#[tokio::test]
async fn test_close_cancels_token_and_connection() {
    let (coordinator, client) = namespace_client("/app", Vec::new());
    let token: CancellationToken = client.cancel_token();

    client.close().await.unwrap();
    assert!(token.is_cancelled());
    assert!(coordinator.is_closed());
}

#[test]
fn test_accessors_reflect_context() {
    let (_coordinator, client) = namespace_client("/app", Vec::new());
    assert_eq!(client.root_node(), "/app");
    assert_eq!(client.delay_retry_policy(), ClientSettings::default().retry);

    client.set_root_exist(true);
    assert!(client.is_root_exist());
    client.set_root_exist(false);
    assert!(!client.is_root_exist());
}
