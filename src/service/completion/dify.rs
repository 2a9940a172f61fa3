//! Completion service integration for the Dify chat API.
//!
//! One HTTP exchange per accepted event: `POST /v1/chat-messages` with
//! `response_mode = "blocking"`, bearer-token auth, and the sender's id as
//! the `user` field so Dify can attribute usage.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::base::{
    config::Config,
    types::{CompletionRequest, CompletionResponse, RelayError, Res},
};

use super::{CompletionClient, GenericCompletionClient};

// Extra methods on `CompletionClient` applied by the Dify implementation.

impl CompletionClient {
    /// Creates a new Dify completion client.
    pub fn dify(config: &Config) -> Res<Self> {
        Ok(Self::new(Arc::new(DifyClient::new(config)?)))
    }
}

// Wire types.

#[derive(Serialize)]
struct ChatRequest<'a> {
    inputs: serde_json::Map<String, serde_json::Value>,
    query: &'a str,
    response_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    user: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message_id: String,
    conversation_id: String,
    answer: String,
}

// Structs.

/// Dify client implementation.
struct DifyClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl DifyClient {
    fn new(config: &Config) -> Res<Self> {
        // The request timeout doubles as the task's upper bound on backend
        // latency; without it a stuck completion holds the shutdown drain
        // until the soft deadline.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.dify_timeout_secs))
            .build()?;

        Ok(Self {
            api_key: config.dify_api_key.clone(),
            base_url: config.dify_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl GenericCompletionClient for DifyClient {
    #[instrument(skip_all)]
    async fn complete(&self, request: &CompletionRequest) -> Res<CompletionResponse> {
        let url = format!("{}/v1/chat-messages", self.base_url);

        let body = ChatRequest {
            inputs: serde_json::Map::new(),
            query: &request.query,
            response_mode: "blocking",
            conversation_id: None,
            user: &request.user,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(RelayError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Backend {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let decoded: ChatResponse = response.json().await.map_err(RelayError::Transport)?;

        Ok(CompletionResponse {
            message_id: decoded.message_id,
            conversation_id: decoded.conversation_id,
            answer: decoded.answer,
        })
    }
}
