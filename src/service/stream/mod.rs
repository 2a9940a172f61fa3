pub mod lark;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{MessageEvent, Void};

// Types.

/// Callback invoked for every extracted message event.
///
/// Errors returned here are logged by the stream; they never tear down the
/// connection to the platform.
pub type EventHandler = Arc<dyn Fn(MessageEvent) -> Void + Send + Sync>;

// Traits.

/// Generic event-stream trait that platform listeners must implement.
///
/// This trait is the boundary to the chat platform's inbound side: a
/// long-lived subscription that pushes message events into the relay.
#[async_trait]
pub trait GenericEventStream: Send + Sync + 'static {
    /// Run the listener, invoking `handler` for each message event.
    ///
    /// Returns after `close` is called, or on a fatal listener error.
    async fn subscribe(&self, handler: EventHandler) -> Void;

    /// Signal the listener that it may shut down.
    fn close(&self);
}

// Structs.

/// Event stream for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<dyn GenericEventStream>,
}

impl Deref for EventStream {
    type Target = dyn GenericEventStream;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl EventStream {
    pub fn new(inner: Arc<dyn GenericEventStream>) -> Self {
        Self { inner }
    }
}
