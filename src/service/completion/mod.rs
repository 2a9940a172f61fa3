pub mod dify;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{CompletionRequest, CompletionResponse, Res};

// Traits.

/// Generic completion-backend trait that clients must implement.
///
/// This trait defines the core functionality for exchanging a user query for
/// a generated answer. Implementing this trait allows different completion
/// backends to be used with the bot.
#[async_trait]
pub trait GenericCompletionClient: Send + Sync + 'static {
    /// Exchange one query for a generated answer.
    ///
    /// A single blocking request/response exchange: the call suspends the
    /// issuing task until the backend answers. No streaming, no retry; a
    /// failed attempt is terminal for the task that issued it.
    async fn complete(&self, request: &CompletionRequest) -> Res<CompletionResponse>;
}

// Structs.

/// Completion client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct CompletionClient {
    inner: Arc<dyn GenericCompletionClient>,
}

impl Deref for CompletionClient {
    type Target = dyn GenericCompletionClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl CompletionClient {
    pub fn new(inner: Arc<dyn GenericCompletionClient>) -> Self {
        Self { inner }
    }
}
