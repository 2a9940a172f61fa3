use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// The view of an inbound platform event that the relay pipeline depends on.
///
/// Extracted once by the event-stream adapter; `content` is the raw JSON
/// string of the message content field, decoded later by the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Chat the message was posted in (`chat_id` in Lark terms).
    pub conversation_id: String,
    /// The platform identifier of the message itself.
    pub message_id: String,
    /// Open ID of the sender, when the platform provided one.
    pub sender_id: Option<String>,
    /// Raw message content, e.g. `{"text":"@bot hello"}`.
    pub content: String,
}

/// One completion exchange with the AI backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub query: String,
    pub user: String,
}

/// The fields the Dify blocking API guarantees in its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message_id: String,
    pub conversation_id: String,
    pub answer: String,
}

/// Failure taxonomy for the relay pipeline.
///
/// Filter rejection is not an error; it is an `Ok(None)` outcome. Everything
/// here terminates exactly one relay task (or, for `Decode`, surfaces to the
/// event-stream collaborator) without crashing the process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed message content. Signals an upstream contract violation,
    /// so it is surfaced rather than silently dropped.
    #[error("malformed message content: {0}")]
    Decode(#[source] serde_json::Error),
    /// The completion backend answered with a non-success status.
    #[error("completion backend returned status {status}: {body}")]
    Backend { status: u16, body: String },
    /// The completion or delivery exchange failed at the transport level
    /// (connect, timeout, or an undecodable body).
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    /// The originating event carried no conversation to reply into.
    #[error("event has no conversation target")]
    InvalidTarget,
    /// The chat platform rejected the outbound message.
    #[error("delivery failed with code {code}: {msg}")]
    Delivery { code: i64, msg: String },
}
