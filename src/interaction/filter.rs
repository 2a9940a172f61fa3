//! Inbound event filtering.

use serde::Deserialize;

use crate::base::types::{RelayError, Res};

/// Decoded shape of a Lark text message content field.
#[derive(Deserialize)]
struct TextContent {
    #[serde(default)]
    text: String,
}

/// Decide whether a message warrants a relay to the completion backend.
///
/// Returns the trimmed query text when the message is directed at the bot,
/// `None` when it is not. Malformed content is a `RelayError::Decode`: an
/// upstream contract violation worth surfacing, not a silent drop. A content
/// payload without a `text` field is an ordinary rejection.
///
/// Pure function of the content; never suspends.
pub fn evaluate(content: &str, bot_token: &str) -> Res<Option<String>> {
    let decoded: TextContent = serde_json::from_str(content).map_err(RelayError::Decode)?;

    let text = decoded.text.trim();
    if text.is_empty() || !is_bot_mentioned(text, bot_token) {
        return Ok(None);
    }

    Ok(Some(text.to_string()))
}

/// Substring heuristic: an `@` anywhere in the text, or the configured
/// bot-name token. A plain `@` in prose is an accepted false positive.
fn is_bot_mentioned(text: &str, bot_token: &str) -> bool {
    text.contains('@') || text.contains(bot_token)
}
