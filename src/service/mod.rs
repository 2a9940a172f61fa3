//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the bot:
//! - Chat delivery (e.g., Lark)
//! - Completion backends (e.g., Dify)
//! - Event streams (e.g., the Lark event subscription)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod completion;
pub mod stream;
