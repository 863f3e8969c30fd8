//! bugbot: a Slack bot that turns chat complaints into issue-tracker tickets.

pub mod bot;
pub mod bug_report;
pub mod config;
pub mod error;
pub mod messaging;
pub mod router;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound event from a messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub source: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: MessageContent,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Platform routing data (channel id, message ts, trigger id, ...).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    /// Read a string metadata value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// How a plain message reached the bot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageScope {
    /// Sent in a one-to-one conversation with the bot.
    DirectMessage,
    /// Starts with an @-mention of the bot.
    DirectMention,
    /// Mentions the bot somewhere after the start.
    Mention,
    /// Channel traffic that does not address the bot.
    Ambient,
}

/// Message content variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
        scope: MessageScope,
    },
    /// A button in a message sent by the bot was clicked.
    Interaction {
        /// `block_id` of the actions block; carries the callback tag.
        block_id: Option<String>,
        /// `action_id` of the clicked element.
        action_id: String,
        /// The button `value`.
        value: Option<String>,
        /// `ts` of the message carrying the buttons.
        message_ts: Option<String>,
    },
    /// A modal form was submitted.
    DialogSubmission {
        callback_id: String,
        /// Field name → entered or selected value.
        values: HashMap<String, String>,
    },
    /// The bot itself joined a channel.
    ChannelJoined,
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageContent::Text { text, .. } => write!(f, "{}", text),
            MessageContent::Interaction {
                action_id, value, ..
            } => {
                if let Some(v) = value {
                    write!(f, "[interaction: {} → {}]", action_id, v)
                } else {
                    write!(f, "[interaction: {}]", action_id)
                }
            }
            MessageContent::DialogSubmission { callback_id, .. } => {
                write!(f, "[dialog submission: {}]", callback_id)
            }
            MessageContent::ChannelJoined => write!(f, "[channel joined]"),
        }
    }
}

/// Outbound response to messaging platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundResponse {
    /// Plain reply in the conversation of the triggering message.
    Text(String),
    /// Block Kit message, optionally wrapped in a colored attachment.
    RichMessage {
        /// Plain-text fallback used for notifications.
        text: String,
        /// Block Kit blocks as raw JSON; the adapter deserialises them at send time.
        blocks: Vec<serde_json::Value>,
        /// Attachment side-bar color, e.g. `#E88114`.
        color: Option<String>,
    },
    /// Replace the message whose button triggered this interaction.
    ReplaceOriginal(String),
    /// Open a modal form. `view` is a Block Kit modal view object.
    OpenDialog { view: serde_json::Value },
    /// Acknowledge a dialog submission so the surface closes the form.
    DialogAck,
    /// Add a reaction emoji to the triggering message.
    Reaction(String),
}

impl OutboundResponse {
    /// Short variant name for log messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            OutboundResponse::Text(_) => "Text",
            OutboundResponse::RichMessage { .. } => "RichMessage",
            OutboundResponse::ReplaceOriginal(_) => "ReplaceOriginal",
            OutboundResponse::OpenDialog { .. } => "OpenDialog",
            OutboundResponse::DialogAck => "DialogAck",
            OutboundResponse::Reaction(_) => "Reaction",
        }
    }
}
