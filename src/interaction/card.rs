//! Interactive reply cards.

use serde::Serialize;

/// Rich-message body for a Lark interactive card.
///
/// Serialization is deterministic: equal inputs always produce byte-identical
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardBody {
    elements: Vec<CardElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct CardElement {
    tag: &'static str,
    text: CardText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct CardText {
    content: String,
    tag: &'static str,
}

/// Build the reply card: a mention of the sender followed by the answer.
///
/// The answer is carried verbatim as `lark_md` content; the sender id lands
/// inside a markup attribute and is entity-escaped.
pub fn mention_reply(answer: &str, sender_id: &str) -> CardBody {
    let content = format!("<at id=\"{}\"></at>{}", escape_attr(sender_id), answer);

    CardBody {
        elements: vec![CardElement {
            tag: "div",
            text: CardText {
                content,
                tag: "lark_md",
            },
        }],
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_the_sender_before_the_answer() {
        let card = mention_reply("Hi Alice", "U1");
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(
            json["elements"][0]["text"]["content"],
            "<at id=\"U1\"></at>Hi Alice"
        );
        assert_eq!(json["elements"][0]["text"]["tag"], "lark_md");
        assert_eq!(json["elements"][0]["tag"], "div");
    }

    #[test]
    fn serialization_is_idempotent() {
        let first = serde_json::to_string(&mention_reply("answer", "ou_123")).unwrap();
        let second = serde_json::to_string(&mention_reply("answer", "ou_123")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn escapes_markup_in_the_sender_id() {
        let card = mention_reply("hi", r#"ou"><script>"#);
        let json = serde_json::to_value(&card).unwrap();
        let content = json["elements"][0]["text"]["content"].as_str().unwrap();

        assert!(content.starts_with(r#"<at id="ou&quot;&gt;&lt;script&gt;"></at>"#));
    }
}
