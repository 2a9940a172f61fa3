#![cfg(test)]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dify_lark_bot::{
    base::{
        config::{Config, ConfigInner},
        types::{CompletionRequest, CompletionResponse, MessageEvent, RelayError, Res, Void},
    },
    dispatch::Dispatcher,
    interaction::{card::CardBody, relay::RelayService},
    service::{
        chat::{ChatClient, GenericChatClient},
        completion::{CompletionClient, GenericCompletionClient},
    },
};
use mockall::mock;
use tokio::sync::mpsc;

// Mocks.

// Mock completion client for testing.

mock! {
    pub Completion {}

    #[async_trait]
    impl GenericCompletionClient for Completion {
        async fn complete(&self, request: &CompletionRequest) -> Res<CompletionResponse>;
    }
}

// Mock chat client for testing.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        async fn send_interactive(&self, conversation_id: &str, card: &CardBody) -> Void;
    }
}

/// A completion backend that answers every query, recording each request.
fn recording_completion(
    answer: &'static str,
) -> (CompletionClient, mpsc::UnboundedReceiver<CompletionRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut mock = MockCompletion::new();
    mock.expect_complete().returning(move |request| {
        tx.send(request.clone()).unwrap();
        Ok(CompletionResponse {
            message_id: "dify-msg".to_string(),
            conversation_id: "dify-conv".to_string(),
            answer: answer.to_string(),
        })
    });

    (CompletionClient::new(Arc::new(mock)), rx)
}

/// A completion backend that fails every query, recording each request.
fn failing_completion() -> (CompletionClient, mpsc::UnboundedReceiver<CompletionRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut mock = MockCompletion::new();
    mock.expect_complete().returning(move |request| {
        tx.send(request.clone()).unwrap();
        Err(RelayError::Backend {
            status: 500,
            body: "internal error".to_string(),
        }
        .into())
    });

    (CompletionClient::new(Arc::new(mock)), rx)
}

/// A chat client that accepts every send, recording conversation and payload.
fn recording_chat() -> (ChatClient, mpsc::UnboundedReceiver<(String, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut mock = MockChat::new();
    mock.expect_send_interactive()
        .returning(move |conversation_id, card| {
            let payload = serde_json::to_string(card).unwrap();
            tx.send((conversation_id.to_string(), payload)).unwrap();
            Ok(())
        });

    (ChatClient::new(Arc::new(mock)), rx)
}

/// A completion backend whose calls never return. Used to exercise the
/// shutdown drain deadline.
struct HungCompletion;

#[async_trait]
impl GenericCompletionClient for HungCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Res<CompletionResponse> {
        std::future::pending().await
    }
}

/// Helper to build a relay service over the given doubles.
fn setup_relay(completion: CompletionClient, chat: ChatClient) -> RelayService {
    let config = Config {
        inner: Arc::new(ConfigInner {
            lark_app_id: "cli_test".to_string(),
            lark_app_secret: "secret".to_string(),
            lark_verification_token: "verify".to_string(),
            dify_api_key: "app-key".to_string(),
            ..Default::default()
        }),
    };

    let dispatcher = Dispatcher::new(config.max_concurrent_tasks);

    RelayService::new(&config, dispatcher, completion, chat)
}

fn event_with_content(message_id: &str, content: &str) -> MessageEvent {
    MessageEvent {
        conversation_id: "oc_chat".to_string(),
        message_id: message_id.to_string(),
        sender_id: Some("U1".to_string()),
        content: content.to_string(),
    }
}

// Tests.

#[tokio::test]
async fn mentioned_message_gets_exactly_one_reply() {
    let (completion, mut completions) = recording_completion("Hi Alice");
    let (chat, mut deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    relay
        .handle_event(event_with_content("om_1", r#"{"text":"@bot hello"}"#))
        .expect("accepted event should not error");

    relay.shutdown(Duration::from_secs(5)).await;

    let request = completions.try_recv().expect("expected one completion call");
    assert_eq!(request.query, "@bot hello");
    assert_eq!(request.user, "U1");
    assert!(completions.try_recv().is_err(), "expected exactly one completion call");

    let (conversation_id, payload) = deliveries.try_recv().expect("expected one delivery");
    assert_eq!(conversation_id, "oc_chat");
    assert!(payload.contains(r#"<at id=\"U1\"></at>Hi Alice"#));
    assert!(deliveries.try_recv().is_err(), "expected exactly one delivery");
}

#[tokio::test]
async fn unmentioned_message_is_ignored() {
    let (completion, mut completions) = recording_completion("unused");
    let (chat, mut deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    relay
        .handle_event(event_with_content("om_2", r#"{"text":"no mention here"}"#))
        .expect("rejection is not an error");

    // Nothing was dispatched, so there is nothing to drain.
    assert_eq!(relay.in_flight(), 0);
    relay.shutdown(Duration::from_secs(1)).await;

    assert!(completions.try_recv().is_err());
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test]
async fn malformed_content_surfaces_a_decode_error() {
    let (completion, mut completions) = recording_completion("unused");
    let (chat, _deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    let err = relay
        .handle_event(event_with_content("om_3", "not json"))
        .expect_err("malformed content is a contract violation");

    assert!(matches!(err.downcast_ref(), Some(RelayError::Decode(_))));
    assert_eq!(relay.in_flight(), 0);
    assert!(completions.try_recv().is_err());
}

#[tokio::test]
async fn backend_failure_suppresses_the_reply() {
    let (completion, mut completions) = failing_completion();
    let (chat, mut deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    // The failure happens after dispatch, so handling itself succeeds.
    relay
        .handle_event(event_with_content("om_4", r#"{"text":"@bot hello"}"#))
        .expect("dispatch should succeed");

    relay.shutdown(Duration::from_secs(5)).await;

    assert!(completions.try_recv().is_ok(), "the backend was called once");
    assert!(deliveries.try_recv().is_err(), "no reply after a backend failure");
    assert_eq!(relay.in_flight(), 0);
}

#[tokio::test]
async fn shutdown_returns_at_the_deadline_with_a_hung_backend() {
    let completion = CompletionClient::new(Arc::new(HungCompletion));
    let (chat, mut deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    relay
        .handle_event(event_with_content("om_5", r#"{"text":"@bot are you there"}"#))
        .expect("dispatch should succeed");

    let started = Instant::now();
    relay.shutdown(Duration::from_millis(300)).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(5));
    assert_eq!(relay.in_flight(), 1, "the hung task is abandoned, not cancelled");
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test]
async fn concurrent_events_each_get_their_own_reply() {
    let (completion, _completions) = recording_completion("answer");
    let (chat, mut deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    for i in 0..12 {
        relay
            .handle_event(event_with_content(&format!("om_{i}"), r#"{"text":"@bot ping"}"#))
            .expect("dispatch should succeed");
    }

    relay.shutdown(Duration::from_secs(5)).await;
    assert_eq!(relay.in_flight(), 0);

    let mut replies = 0;
    while deliveries.try_recv().is_ok() {
        replies += 1;
    }
    assert_eq!(replies, 12);
}

#[tokio::test]
async fn missing_sender_falls_back_to_anonymous() {
    let (completion, mut completions) = recording_completion("hello there");
    let (chat, mut deliveries) = recording_chat();
    let relay = setup_relay(completion, chat);

    let mut event = event_with_content("om_6", r#"{"text":"@bot hello"}"#);
    event.sender_id = None;

    relay.handle_event(event).expect("dispatch should succeed");
    relay.shutdown(Duration::from_secs(5)).await;

    let request = completions.try_recv().expect("expected one completion call");
    assert_eq!(request.user, "anonymous");

    let (_, payload) = deliveries.try_recv().expect("expected one delivery");
    assert!(payload.contains(r#"<at id=\"anonymous\"></at>"#));
}
