//! Library root for `dify-lark-bot`.
//!
//! Dify-lark-bot relays Lark messages to a Dify chat app and posts the
//! generated answer back into the originating chat:
//! - Listens on the Lark event subscription for message events
//! - Filters for messages directed at the bot
//! - Relays each accepted message to Dify on its own task
//! - Replies with an interactive card that mentions the sender
//!
//! The bot integrates with Lark for chat and Dify for generated answers.
//! The architecture is built around extensible traits that allow for
//! different implementations of each service.

pub mod base;
pub mod dispatch;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use tracing::{info, warn};

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the relay runtime:
/// - Creates the runtime context with completion, chat, and stream clients
/// - Serves the event stream
/// - On SIGINT/SIGTERM, drains in-flight relay tasks within the configured
///   grace period, then closes the listener and exits cleanly
pub async fn start(config: Config) -> Void {
    info!("Starting dify-lark-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config)?;

    // Serve the event stream on its own task so this one can watch for signals.
    let mut serve = tokio::spawn({
        let runtime = runtime.clone();
        async move { runtime.start().await }
    });

    tokio::select! {
        result = &mut serve => {
            // The listener stopped on its own (e.g. a bind failure); surface it.
            result??;
            warn!("Event stream closed without a shutdown signal.");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal; draining in-flight tasks ...");
            runtime.shutdown().await;
            serve.await??;
        }
    }

    info!("Shutdown complete.");

    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
