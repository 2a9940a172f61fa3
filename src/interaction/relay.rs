//! The relay pipeline: filter, dispatch, complete, reply.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{CompletionRequest, MessageEvent, Void},
    },
    dispatch::Dispatcher,
    interaction::{card, filter},
    service::{chat::ChatClient, completion::CompletionClient},
};

/// The entry point the event stream drives; one call per inbound event.
///
/// Trivially cloneable; all clones share the same dispatcher.
#[derive(Clone)]
pub struct RelayService {
    config: Config,
    dispatcher: Dispatcher,
    completion: CompletionClient,
    chat: ChatClient,
}

impl RelayService {
    pub fn new(
        config: &Config,
        dispatcher: Dispatcher,
        completion: CompletionClient,
        chat: ChatClient,
    ) -> Self {
        Self {
            config: config.clone(),
            dispatcher,
            completion,
            chat,
        }
    }

    /// Handle one inbound message event.
    ///
    /// Filtering runs synchronously; an accepted event is handed to the
    /// dispatcher and this returns without waiting on backend latency.
    /// The only error out of here is a content decode failure, which the
    /// stream collaborator logs without dropping the connection.
    #[instrument(skip_all, fields(message_id = %event.message_id))]
    pub fn handle_event(&self, event: MessageEvent) -> Void {
        let Some(query) = filter::evaluate(&event.content, &self.config.bot_mention_token)? else {
            debug!("Message is not directed at the bot; ignoring.");
            return Ok(());
        };

        let completion = self.completion.clone();
        let chat = self.chat.clone();

        self.dispatcher
            .dispatch(relay_message(event, query, completion, chat));

        Ok(())
    }

    /// Number of relay tasks still executing.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Wait up to `timeout` for in-flight tasks, then abandon stragglers.
    pub async fn shutdown(&self, timeout: Duration) {
        if self.dispatcher.drain(timeout).await {
            info!("All relay tasks completed.");
        } else {
            warn!(
                "Timed out waiting for {} relay task(s); abandoning them.",
                self.dispatcher.in_flight()
            );
        }
    }
}

/// One relay task: completion backend, then the formatted reply.
///
/// Strict sequence; the first failure terminates the task and the dispatcher
/// records it. The platform user simply receives no reply.
#[instrument(skip_all)]
async fn relay_message(
    event: MessageEvent,
    query: String,
    completion: CompletionClient,
    chat: ChatClient,
) -> Void {
    let sender = event.sender_id.as_deref().unwrap_or("anonymous");

    info!("Processing message from user {}", sender);

    let request = CompletionRequest {
        query,
        user: sender.to_string(),
    };
    let response = completion.complete(&request).await?;

    let payload = card::mention_reply(&response.answer, sender);
    chat.send_interactive(&event.conversation_id, &payload).await?;

    info!("Successfully replied to {}", sender);

    Ok(())
}
