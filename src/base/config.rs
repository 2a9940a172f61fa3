//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default Dify API endpoint.
fn default_dify_base_url() -> String {
    "https://api.dify.ai".to_string()
}

/// Default Lark OpenAPI endpoint.
fn default_lark_base_url() -> String {
    "https://open.feishu.cn".to_string()
}

/// Default bot-name token used for mention detection alongside `@`.
fn default_bot_mention_token() -> String {
    "机器人".to_string()
}

/// Default listen address for the Lark event callback listener.
fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Default per-request timeout for the Dify completion call, in seconds.
fn default_dify_timeout_secs() -> u64 {
    120
}

/// Default cap on concurrently executing relay tasks.
fn default_max_concurrent_tasks() -> usize {
    32
}

/// Default grace period for draining in-flight tasks on shutdown, in seconds.
fn default_shutdown_grace_secs() -> u64 {
    30
}

/// Configuration for the dify-lark-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Lark application ID (`LARK_APP_ID`).
    pub lark_app_id: String,
    /// Lark application secret (`LARK_APP_SECRET`).
    pub lark_app_secret: String,
    /// Lark event-subscription verification token (`LARK_VERIFICATION_TOKEN`).
    pub lark_verification_token: String,
    /// Lark OpenAPI base URL (`LARK_BASE_URL`).
    #[serde(default = "default_lark_base_url")]
    pub lark_base_url: String,
    /// Dify API key (`DIFY_API_KEY`).
    pub dify_api_key: String,
    /// Dify base URL (`DIFY_BASE_URL`).
    #[serde(default = "default_dify_base_url")]
    pub dify_base_url: String,
    /// Timeout for a single Dify completion call, in seconds
    /// (`DIFY_TIMEOUT_SECS`). A completion that outlives this bound would
    /// otherwise hold the shutdown drain until its soft deadline.
    #[serde(default = "default_dify_timeout_secs")]
    pub dify_timeout_secs: u64,
    /// Bot-name token that counts as a mention marker (`BOT_MENTION_TOKEN`).
    #[serde(default = "default_bot_mention_token")]
    pub bot_mention_token: String,
    /// Address the event callback listener binds to (`LISTEN_ADDR`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Cap on concurrently executing relay tasks (`MAX_CONCURRENT_TASKS`).
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Grace period for the shutdown drain, in seconds
    /// (`SHUTDOWN_GRACE_SECS`).
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            lark_app_id: String::new(),
            lark_app_secret: String::new(),
            lark_verification_token: String::new(),
            lark_base_url: default_lark_base_url(),
            dify_api_key: String::new(),
            dify_base_url: default_dify_base_url(),
            dify_timeout_secs: default_dify_timeout_secs(),
            bot_mention_token: default_bot_mention_token(),
            listen_addr: default_listen_addr(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new("config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name("config"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Reject configurations that cannot produce a working bot.
    pub fn validate(&self) -> Res<()> {
        let required = [
            ("LARK_APP_ID", &self.lark_app_id),
            ("LARK_APP_SECRET", &self.lark_app_secret),
            ("LARK_VERIFICATION_TOKEN", &self.lark_verification_token),
            ("DIFY_API_KEY", &self.dify_api_key),
        ];

        for (name, value) in required {
            if value.is_empty() {
                return Err(anyhow::anyhow!("{} is required", name));
            }
        }

        if self.max_concurrent_tasks == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_TASKS must be at least 1."));
        }

        if self.dify_timeout_secs == 0 {
            return Err(anyhow::anyhow!("DIFY_TIMEOUT_SECS must be at least 1."));
        }

        Ok(())
    }
}
