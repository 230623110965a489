mod common;

use cloudweave_cloud::{DriverError, Iid, KeyPairReqInfo, ResourceKind};
use cloudweave_cloud_mock::MockOp;
use cloudweave_runtime::{IidStore, RuntimeError};
use common::{CONN, FlakyStore, TestCloud, vpc_req};
use std::sync::Arc;
use std::time::Duration;

fn key_req(name: &str) -> KeyPairReqInfo {
    KeyPairReqInfo {
        iid: Iid::named(name),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_concurrent_creates_of_one_name() {
    let env = TestCloud::new();
    let rt = &env.runtime;

    let (a, b) = tokio::join!(
        rt.create_vpc(CONN, vpc_req("shared", &[])),
        rt.create_vpc(CONN, vpc_req("shared", &[])),
    );
    let results = [a, b];
    let created = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(RuntimeError::AlreadyExists(_))))
        .count();
    assert_eq!((created, rejected), (1, 1));
    assert_eq!(env.cloud.count(ResourceKind::Vpc), 1);
    assert_eq!(
        rt.list_resource_name(CONN, ResourceKind::Vpc).await.unwrap(),
        vec!["shared"]
    );
}

#[tokio::test]
async fn test_concurrent_creates_of_many_names() {
    let env = TestCloud::new();
    let rt = &env.runtime;

    let names: Vec<String> = (0..8).map(|i| format!("key-{}", i)).collect();
    let results =
        futures_util::future::join_all(names.iter().map(|name| rt.create_key(CONN, key_req(name))))
            .await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(env.cloud.count(ResourceKind::KeyPair), 8);
    assert!(rt.locks().keypair.is_empty());
}

#[tokio::test]
async fn test_failed_persist_rolls_back_provider_resource() {
    let store = Arc::new(FlakyStore::default());
    let env = TestCloud::with_store(store.clone() as Arc<dyn IidStore>);

    store.fail_puts(true);
    let err = env.runtime.create_key(CONN, key_req("deploy")).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
    assert_eq!(env.cloud.count(ResourceKind::KeyPair), 0);

    // The name is free again once the store recovers
    store.fail_puts(false);
    env.runtime.create_key(CONN, key_req("deploy")).await.unwrap();
}

#[tokio::test]
async fn test_failed_rollback_is_partial_failure() {
    let store = Arc::new(FlakyStore::default());
    let env = TestCloud::with_store(store.clone() as Arc<dyn IidStore>);

    store.fail_puts(true);
    env.cloud.fail_next(
        ResourceKind::KeyPair,
        MockOp::Delete,
        DriverError::Transient("throttled".into()),
    );
    let err = env.runtime.create_key(CONN, key_req("deploy")).await.unwrap_err();
    match err {
        RuntimeError::PartialFailure {
            original,
            compensation,
        } => {
            assert!(matches!(*original, RuntimeError::Store(_)));
            assert!(matches!(*compensation, RuntimeError::Provider(_)));
        }
        other => panic!("expected partial failure, got {}", other),
    }
    // The orphan stays on the provider and is visible as provider-only
    store.fail_puts(false);
    let all = env
        .runtime
        .list_all_resource(CONN, ResourceKind::KeyPair)
        .await
        .unwrap();
    assert_eq!(all.only_provider.len(), 1);
}

#[tokio::test]
async fn test_vpc_rollback_removes_subnet_records() {
    let store = Arc::new(FlakyStore::default());
    let env = TestCloud::with_store(store.clone() as Arc<dyn IidStore>);

    store.fail_puts(true);
    let err = env
        .runtime
        .create_vpc(CONN, vpc_req("vpc-1", &[("web", "10.0.1.0/24")]))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
    assert_eq!(env.cloud.count(ResourceKind::Vpc), 0);
    store.fail_puts(false);
    assert!(
        env.runtime
            .list_resource_name(CONN, ResourceKind::Subnet)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_delete_without_force_keeps_record() {
    let env = TestCloud::new();
    env.runtime.create_key(CONN, key_req("deploy")).await.unwrap();
    env.cloud.fail_next(
        ResourceKind::KeyPair,
        MockOp::Delete,
        DriverError::fatal("denied"),
    );

    let err = env
        .runtime
        .delete_key(CONN, "deploy", false)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Provider(DriverError::Fatal(_))));
    assert!(env.runtime.get_key(CONN, "deploy").await.is_ok());

    // Retrying succeeds once the provider cooperates
    assert!(env.runtime.delete_key(CONN, "deploy", false).await.unwrap());
}

#[tokio::test]
async fn test_force_delete_drops_record_on_provider_failure() {
    let env = TestCloud::new();
    let key = env.runtime.create_key(CONN, key_req("deploy")).await.unwrap();
    env.cloud.fail_always(
        ResourceKind::KeyPair,
        MockOp::Delete,
        DriverError::fatal("denied"),
    );

    assert!(env.runtime.delete_key(CONN, "deploy", true).await.unwrap());
    let err = env.runtime.get_key(CONN, "deploy").await.unwrap_err();
    assert!(matches!(err, RuntimeError::NotFound(_)));
    assert!(env.cloud.contains(ResourceKind::KeyPair, &key.iid.system_id));
}

#[tokio::test]
async fn test_subnet_records_follow_the_vpc_lock() {
    let env = TestCloud::new();
    env.network().await;
    let rt = &env.runtime;

    // Subnet changes on vpc-1 hold its exclusive lock
    let held = rt.locks().vpc.lock(CONN, "vpc-1").await;
    let waited = tokio::time::timeout(
        Duration::from_millis(50),
        rt.unregister_resource(CONN, ResourceKind::Subnet, "subnet-1"),
    )
    .await;
    assert!(waited.is_err());
    drop(held);

    // A VPC that happens to share the subnet's name is unrelated
    let _other = rt.locks().vpc.lock(CONN, "subnet-1").await;
    let id = tokio::time::timeout(
        Duration::from_millis(50),
        rt.get_csp_resource_name(CONN, ResourceKind::Subnet, "subnet-1"),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!id.is_empty());

    assert!(
        rt.unregister_resource(CONN, ResourceKind::Subnet, "subnet-1")
            .await
            .unwrap()
    );
    assert!(
        rt.list_resource_name(CONN, ResourceKind::Subnet)
            .await
            .unwrap()
            .is_empty()
    );
}
