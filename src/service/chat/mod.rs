pub mod lark;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{base::types::Void, interaction::card::CardBody};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the delivery side of the relay: sending a rich reply
/// into a conversation. Implementing this trait allows different chat
/// platforms to be used with the bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Send an interactive reply card into a conversation.
    ///
    /// Exactly one outbound attempt per call; there is no automatic retry.
    /// Fails fast when `conversation_id` is empty.
    async fn send_interactive(&self, conversation_id: &str, card: &CardBody) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
