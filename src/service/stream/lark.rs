//! Event-stream integration for the Lark event subscription.
//!
//! Lark pushes events as JSON callbacks to a registered URL: a one-time
//! `url_verification` challenge when the subscription is created, then one
//! envelope per event. The listener verifies the subscription token on every
//! callback, extracts the relay's view of each `im.message.receive_v1`
//! event, and hands it to the handler. Redelivery of undelivered callbacks
//! is Lark's responsibility, so the listener itself carries no reconnection
//! logic.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use crate::base::{config::Config, types::{MessageEvent, Void}};

use super::{EventHandler, EventStream, GenericEventStream};

// Extra methods on `EventStream` applied by the Lark implementation.

impl EventStream {
    /// Creates a new Lark event listener.
    pub fn lark(config: &Config) -> Self {
        Self::new(Arc::new(LarkEventStream {
            listen_addr: config.listen_addr.clone(),
            verification_token: config.lark_verification_token.clone(),
            shutdown: Arc::new(Notify::new()),
        }))
    }
}

// Wire types.

/// Envelope for a v2 event callback.
#[derive(Deserialize)]
struct EventEnvelope {
    header: EventHeader,
    event: ReceiveMessageEvent,
}

#[derive(Deserialize)]
struct EventHeader {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct ReceiveMessageEvent {
    sender: Option<EventSender>,
    message: Option<EventMessage>,
}

#[derive(Deserialize)]
struct EventSender {
    sender_id: Option<EventSenderId>,
}

#[derive(Deserialize)]
struct EventSenderId {
    open_id: Option<String>,
}

#[derive(Deserialize)]
struct EventMessage {
    message_id: String,
    #[serde(default)]
    chat_id: String,
    content: Option<String>,
}

// Structs.

/// Lark event listener implementation.
struct LarkEventStream {
    listen_addr: String,
    verification_token: String,
    shutdown: Arc<Notify>,
}

/// Shared state for the callback route.
struct ListenerState {
    handler: EventHandler,
    verification_token: String,
}

#[async_trait]
impl GenericEventStream for LarkEventStream {
    async fn subscribe(&self, handler: EventHandler) -> Void {
        let state = Arc::new(ListenerState {
            handler,
            verification_token: self.verification_token.clone(),
        });

        let listener = tokio::net::TcpListener::bind(self.listen_addr.as_str()).await?;
        info!("Listening for Lark events on {}", self.listen_addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;

        info!("Lark event listener stopped.");

        Ok(())
    }

    fn close(&self) {
        // notify_one stores a permit, so a close racing listener startup
        // still lands.
        self.shutdown.notify_one();
    }
}

fn router(state: Arc<ListenerState>) -> Router {
    Router::new()
        .route("/webhook/event", post(receive_callback))
        .with_state(state)
}

/// Handles one callback from Lark.
///
/// Event callbacks are always acknowledged with 200 once the token checks
/// out; a non-2xx would only make Lark redeliver the same payload. Handler
/// errors are logged and stay here.
#[instrument(skip_all)]
async fn receive_callback(
    State(state): State<Arc<ListenerState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    // Encrypted subscriptions wrap every callback, the handshake included.
    // This bot only supports plaintext subscriptions.
    if body.get("encrypt").is_some() {
        warn!("Received an encrypted callback; configure the subscription without an encrypt key.");
        return (StatusCode::OK, Json(json!({})));
    }

    // Subscription handshake: echo the challenge back.
    if body.get("type").and_then(Value::as_str) == Some("url_verification") {
        let token = body.get("token").and_then(Value::as_str).unwrap_or_default();
        if token != state.verification_token {
            warn!("url_verification with a mismatched token; rejecting.");
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }

        let challenge = body.get("challenge").and_then(Value::as_str).unwrap_or_default();
        return (StatusCode::OK, Json(json!({ "challenge": challenge })));
    }

    let envelope: EventEnvelope = match serde_json::from_value(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("Undecodable event callback: {}", err);
            return (StatusCode::OK, Json(json!({})));
        }
    };

    if envelope.header.token != state.verification_token {
        warn!("Event callback with a mismatched token; rejecting.");
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }

    if envelope.header.event_type != "im.message.receive_v1" {
        debug!("Ignoring event type {}.", envelope.header.event_type);
        return (StatusCode::OK, Json(json!({})));
    }

    let Some(event) = extract_message(envelope.event) else {
        debug!("Message event without content; ignoring.");
        return (StatusCode::OK, Json(json!({})));
    };

    if let Err(err) = (state.handler)(event) {
        warn!("Error while handling: {}", err);
    }

    (StatusCode::OK, Json(json!({})))
}

/// Extract the relay's view of a received message.
///
/// Events without a message or content field are platform noise, not
/// contract violations; they are dropped here. A missing `chat_id` is kept
/// as an empty conversation id so the delivery client can fail fast on it.
fn extract_message(event: ReceiveMessageEvent) -> Option<MessageEvent> {
    let message = event.message?;
    let content = message.content?;
    let sender_id = event
        .sender
        .and_then(|sender| sender.sender_id)
        .and_then(|sender_id| sender_id.open_id);

    Some(MessageEvent {
        conversation_id: message.chat_id,
        message_id: message.message_id,
        sender_id,
        content,
    })
}
