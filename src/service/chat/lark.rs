//! Chat delivery integration for the Lark OpenAPI.
//!
//! Replies are sent as interactive messages addressed by `chat_id`, using a
//! tenant access token that is fetched on demand and cached until shortly
//! before Lark expires it. The HTTP client is shared and safe for concurrent
//! use by all relay tasks.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{RelayError, Res, Void},
    },
    interaction::card::CardBody,
};

use super::{ChatClient, GenericChatClient};

/// Refresh the tenant token this long before Lark would expire it.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

// Extra methods on `ChatClient` applied by the Lark implementation.

impl ChatClient {
    /// Creates a new Lark chat client.
    pub fn lark(config: &Config) -> Self {
        Self::new(Arc::new(LarkChatClient::new(config)))
    }
}

// Wire types.

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    #[serde(default)]
    expire: u64,
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    receive_id: &'a str,
    msg_type: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

// Structs.

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Lark client implementation.
struct LarkChatClient {
    app_id: String,
    app_secret: String,
    base_url: String,
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl LarkChatClient {
    fn new(config: &Config) -> Self {
        Self {
            app_id: config.lark_app_id.clone(),
            app_secret: config.lark_app_secret.clone(),
            base_url: config.lark_base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: RwLock::new(None),
        }
    }

    /// Get a tenant access token, refreshing the cached one when it nears
    /// expiry.
    async fn tenant_token(&self) -> Res<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref()
                && token.expires_at > Instant::now()
            {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;

        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let url = format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal",
            self.base_url
        );

        let response = self
            .http
            .post(&url)
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await
            .map_err(RelayError::Transport)?;

        let decoded: TokenResponse = response.json().await.map_err(RelayError::Transport)?;

        if decoded.code != 0 {
            return Err(RelayError::Delivery {
                code: decoded.code,
                msg: decoded.msg,
            }
            .into());
        }

        let lifetime = Duration::from_secs(decoded.expire).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = decoded.tenant_access_token.clone();

        *slot = Some(CachedToken {
            value: decoded.tenant_access_token,
            expires_at: Instant::now() + lifetime,
        });

        Ok(value)
    }
}

#[async_trait]
impl GenericChatClient for LarkChatClient {
    #[instrument(skip(self, card))]
    async fn send_interactive(&self, conversation_id: &str, card: &CardBody) -> Void {
        if conversation_id.is_empty() {
            return Err(RelayError::InvalidTarget.into());
        }

        let token = self.tenant_token().await?;
        let content = serde_json::to_string(card)?;

        let url = format!(
            "{}/open-apis/im/v1/messages?receive_id_type=chat_id",
            self.base_url
        );

        let request = CreateMessageRequest {
            receive_id: conversation_id,
            msg_type: "interactive",
            content: &content,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(RelayError::Transport)?;

        let decoded: CreateMessageResponse =
            response.json().await.map_err(RelayError::Transport)?;

        if decoded.code != 0 {
            return Err(RelayError::Delivery {
                code: decoded.code,
                msg: decoded.msg,
            }
            .into());
        }

        info!("Successfully sent interactive message.");

        Ok(())
    }
}
