//! Runtime services and shared state for the dify-lark-bot.

use std::{sync::Arc, time::Duration};

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    dispatch::Dispatcher,
    interaction::relay::RelayService,
    service::{
        chat::ChatClient,
        completion::CompletionClient,
        stream::{EventHandler, EventStream},
    },
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the completion client, chat client, relay service, and
/// event stream. It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The completion client instance.
    pub completion: CompletionClient,
    /// The chat client instance.
    pub chat: ChatClient,
    /// The relay service instance.
    pub relay: RelayService,
    /// The event stream instance.
    pub stream: EventStream,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Res<Self> {
        // Initialize the completion client.
        let completion = CompletionClient::dify(&config)?;

        // Initialize the chat client.
        let chat = ChatClient::lark(&config);

        // Initialize the dispatcher and wire the relay service.
        let dispatcher = Dispatcher::new(config.max_concurrent_tasks);
        let relay = RelayService::new(&config, dispatcher, completion.clone(), chat.clone());

        // Initialize the event stream.
        let stream = EventStream::lark(&config);

        Ok(Self {
            config,
            completion,
            chat,
            relay,
            stream,
        })
    }

    /// Run the event stream until `shutdown` closes it.
    pub async fn start(&self) -> Void {
        let relay = self.relay.clone();
        let handler: EventHandler = Arc::new(move |event| relay.handle_event(event));

        self.stream.subscribe(handler).await
    }

    /// Drain in-flight relay tasks, then let the event stream close.
    pub async fn shutdown(&self) {
        self.relay
            .shutdown(Duration::from_secs(self.config.shutdown_grace_secs))
            .await;
        self.stream.close();
    }
}
