//! Relay behavior tests.
//!
//! Exercise dispatch, callback and poll against the in-memory store with a
//! manual clock and a scriptable webhook.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chat_relay_core::environment::Clock;
use chat_relay_core::record::{RequestId, RequestStatus};
use chat_relay_core::relay::{CallbackPayload, PollOutcome, RelayConfig, RelayError};
use chat_relay_core::signing::CallbackSigner;
use chat_relay_core::store::RecordStore;
use chat_relay_core::webhook::WebhookError;
use chat_relay_testing::harness::TEST_CALLBACK_BASE;
use chat_relay_testing::{RelayHarness, WebhookBehavior, properties};
use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;

fn callback(request_id: &RequestId, text: &str) -> CallbackPayload {
    CallbackPayload {
        request_id: Some(request_id.to_string()),
        client_id: Some("alice".to_string()),
        text: Some(text.to_string()),
    }
}

#[tokio::test]
async fn test_dispatch_then_poll_is_processing() {
    let harness = RelayHarness::new();

    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({"message": "hello"})))
        .await
        .unwrap();

    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Processing
    );

    let record = harness.store.get(&request_id).await.unwrap().unwrap();
    assert_eq!(record.status, RequestStatus::Processing);
    assert_eq!(record.timestamp, harness.clock.now());
}

#[tokio::test]
async fn test_dispatch_forwards_payload_with_callback() {
    let harness = RelayHarness::new();

    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({"message": "hello"})))
        .await
        .unwrap();

    let forwarded = harness.webhook.last_payload().unwrap();
    assert_eq!(forwarded["message"], json!("hello"));
    assert_eq!(forwarded["clientId"], json!("alice"));
    assert_eq!(forwarded["requestID"], json!(request_id.as_str()));
    assert_eq!(
        forwarded["callbackURL"],
        json!(format!("{TEST_CALLBACK_BASE}/api/chat/callback"))
    );
}

#[tokio::test]
async fn test_unreachable_webhook_leaves_no_record() {
    let harness = RelayHarness::new();
    harness.webhook.set_behavior(WebhookBehavior::Unreachable);

    let err = harness
        .relay
        .dispatch(harness.dispatch_request(json!({"message": "hello"})))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Upstream(WebhookError::Unreachable(_))));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_rejecting_webhook_leaves_no_record() {
    let harness = RelayHarness::new();
    harness.webhook.set_behavior(WebhookBehavior::Reject(500));

    let err = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RelayError::Upstream(WebhookError::Rejected { status: 500 })
    );
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_dispatch_without_webhook_is_configuration_error() {
    let harness = RelayHarness::without_webhook();

    let err = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::MissingConfiguration);
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_completed_result_is_delivered_once() {
    let harness = RelayHarness::new();
    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({"message": "hello"})))
        .await
        .unwrap();

    harness
        .relay
        .complete(callback(&request_id, "world"), None)
        .await
        .unwrap();

    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Completed(json!({"text": "world", "clientId": "alice"}))
    );
    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::NotFound
    );
}

#[tokio::test]
async fn test_concurrent_polls_deliver_once() {
    let harness = RelayHarness::new();
    let request_id = RequestId::from("req-race");
    harness
        .relay
        .complete(callback(&request_id, "world"), None)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        harness.relay.poll(&request_id),
        harness.relay.poll(&request_id)
    );

    let delivered = [first.unwrap(), second.unwrap()]
        .into_iter()
        .filter(|outcome| matches!(outcome, PollOutcome::Completed(_)))
        .count();
    assert_eq!(delivered, 1, "Exactly one poller should receive the result");
}

#[tokio::test]
async fn test_poll_unknown_id_is_not_found() {
    let harness = RelayHarness::new();

    assert_eq!(
        harness.relay.poll(&RequestId::from("never-dispatched")).await.unwrap(),
        PollOutcome::NotFound
    );
}

#[tokio::test]
async fn test_callback_for_unknown_id_creates_record() {
    let harness = RelayHarness::new();
    let request_id = RequestId::from("never-dispatched");

    harness
        .relay
        .complete(callback(&request_id, "surprise"), None)
        .await
        .unwrap();

    assert!(matches!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn test_strict_mode_rejects_unknown_id() {
    let harness = RelayHarness::with_config(RelayConfig::new().with_strict_callbacks(true));
    let request_id = RequestId::from("never-dispatched");

    let err = harness
        .relay
        .complete(callback(&request_id, "surprise"), None)
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::UnknownRequest(request_id));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_strict_mode_accepts_dispatched_id() {
    let harness = RelayHarness::with_config(RelayConfig::new().with_strict_callbacks(true));
    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap();

    assert!(
        harness
            .relay
            .complete(callback(&request_id, "done"), None)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_strict_mode_overwrites_completed_record() {
    let harness = RelayHarness::with_config(RelayConfig::new().with_strict_callbacks(true));
    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap();

    harness.relay.complete(callback(&request_id, "first"), None).await.unwrap();
    harness.relay.complete(callback(&request_id, "second"), None).await.unwrap();

    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Completed(json!({"text": "second", "clientId": "alice"}))
    );
}

#[tokio::test]
async fn test_second_callback_overwrites_first() {
    let harness = RelayHarness::new();
    let request_id = RequestId::from("req-1");

    harness.relay.complete(callback(&request_id, "first"), None).await.unwrap();
    harness.relay.complete(callback(&request_id, "second"), None).await.unwrap();

    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Completed(json!({"text": "second", "clientId": "alice"}))
    );
}

#[tokio::test]
async fn test_record_expires_without_poll() {
    let harness = RelayHarness::new();
    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap();

    harness.clock.advance(chrono::Duration::minutes(59));
    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Processing
    );

    harness.clock.advance(chrono::Duration::minutes(1));
    assert_eq!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::NotFound
    );
}

#[tokio::test]
async fn test_callback_refreshes_ttl() {
    let harness = RelayHarness::with_config(RelayConfig::new().with_record_ttl(Duration::from_secs(600)));
    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap();

    harness.clock.advance(chrono::Duration::minutes(9));
    harness.relay.complete(callback(&request_id, "late"), None).await.unwrap();
    harness.clock.advance(chrono::Duration::minutes(9));

    assert!(matches!(
        harness.relay.poll(&request_id).await.unwrap(),
        PollOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn test_signed_callback_url_and_verification() {
    let harness = RelayHarness::with_config(RelayConfig::new().with_callback_secret("s3cret"));
    let request_id = harness
        .relay
        .dispatch(harness.dispatch_request(json!({})))
        .await
        .unwrap();

    let signature = CallbackSigner::new("s3cret").sign(&request_id);
    let forwarded = harness.webhook.last_payload().unwrap();
    assert_eq!(
        forwarded["callbackURL"],
        json!(format!("{TEST_CALLBACK_BASE}/api/chat/callback?signature={signature}"))
    );

    assert_eq!(
        harness.relay.complete(callback(&request_id, "x"), None).await,
        Err(RelayError::UnauthorizedCallback)
    );
    assert_eq!(
        harness
            .relay
            .complete(callback(&request_id, "x"), Some("forged"))
            .await,
        Err(RelayError::UnauthorizedCallback)
    );
    assert!(
        harness
            .relay
            .complete(callback(&request_id, "x"), Some(&signature))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_callback_missing_fields_is_invalid() {
    let harness = RelayHarness::new();

    let err = harness
        .relay
        .complete(
            CallbackPayload {
                request_id: Some("req-1".to_string()),
                ..CallbackPayload::default()
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::InvalidCallback(_)));
    assert!(harness.store.is_empty().await);
}

proptest! {
    #[test]
    fn prop_dispatched_requests_poll_as_processing(
        payload in properties::client_payload(),
        client_id in properties::client_id(),
    ) {
        let harness = RelayHarness::new();
        let request = chat_relay_core::relay::DispatchRequest::new(client_id.clone(), payload, TEST_CALLBACK_BASE);

        let (request_id, outcome) = tokio_test::block_on(async {
            let request_id = harness.relay.dispatch(request).await.unwrap();
            let outcome = harness.relay.poll(&request_id).await.unwrap();
            (request_id, outcome)
        });

        prop_assert_eq!(outcome, PollOutcome::Processing);
        let forwarded = harness.webhook.last_payload().unwrap();
        prop_assert_eq!(&forwarded["clientId"], &json!(client_id));
        prop_assert_eq!(&forwarded["requestID"], &json!(request_id.as_str()));
    }
}
