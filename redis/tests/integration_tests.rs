//! Integration tests for `RedisRecordStore` using testcontainers.
//!
//! # Requirements
//!
//! Docker must be running. Run with `cargo test -p chat-relay-redis -- --ignored`.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code uses expect for clear failure messages

use chat_relay_core::record::{RequestId, RequestRecord};
use chat_relay_core::store::RecordStore;
use chat_relay_redis::RedisRecordStore;
use chrono::Utc;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, Redis};

async fn setup_store() -> (ContainerAsync<Redis>, RedisRecordStore) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start Redis container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(REDIS_PORT)
        .await
        .expect("Failed to get port");

    let store = RedisRecordStore::new(&format!("redis://{host}:{port}"))
        .await
        .expect("Failed to create store");

    (container, store)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_record_lifecycle() {
    let (_container, store) = setup_store().await;
    let id = RequestId::from("lifecycle");

    store
        .set_with_ttl(&id, RequestRecord::processing(Utc::now()), Duration::from_secs(60))
        .await
        .expect("Failed to store record");
    assert!(!store.get(&id).await.unwrap().unwrap().is_completed());

    store
        .set_with_ttl(
            &id,
            RequestRecord::completed(serde_json::json!({"text": "done"}), Utc::now()),
            Duration::from_secs(60),
        )
        .await
        .expect("Failed to overwrite record");

    let taken = store.take(&id).await.unwrap().expect("Record should be taken");
    assert!(taken.is_completed());
    assert!(store.take(&id).await.unwrap().is_none(), "Take must be single-use");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_delete_missing_record_is_ok() {
    let (_container, store) = setup_store().await;

    store.delete(&RequestId::from("missing")).await.expect("Delete should succeed");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_record_expires() {
    let (_container, store) = setup_store().await;
    let id = RequestId::from("short-lived");

    store
        .set_with_ttl(&id, RequestRecord::processing(Utc::now()), Duration::from_secs(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_concurrent_take_delivers_once() {
    let (_container, store) = setup_store().await;
    let id = RequestId::from("race");

    store
        .set_with_ttl(
            &id,
            RequestRecord::completed(serde_json::json!("done"), Utc::now()),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let (first, second) = tokio::join!(store.take(&id), store.take(&id));
    let delivered = [first.unwrap(), second.unwrap()]
        .iter()
        .filter(|r| r.is_some())
        .count();

    assert_eq!(delivered, 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_ping() {
    let (_container, store) = setup_store().await;

    store.ping().await.expect("Redis should answer PING");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_key_prefix_separates_namespaces() {
    let (_container, store) = setup_store().await;
    let staging = store.clone().with_key_prefix("staging:chat:");
    let id = RequestId::from("shared-id");

    assert_eq!(store.key_prefix(), chat_relay_redis::DEFAULT_KEY_PREFIX);
    assert_eq!(staging.key_prefix(), "staging:chat:");

    staging
        .set_with_ttl(&id, RequestRecord::processing(Utc::now()), Duration::from_secs(60))
        .await
        .unwrap();

    assert!(store.get(&id).await.unwrap().is_none());
    assert!(staging.get(&id).await.unwrap().is_some());
}
