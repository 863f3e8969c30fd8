//! The button prompt offering to file a bug report.

use super::CallbackTag;
use crate::OutboundResponse;
use serde_json::json;

/// Button value that dismisses the prompt.
pub const DECLINE_VALUE: &str = "nop";
/// Button value that opens the bug-report dialog.
pub const ACCEPT_VALUE: &str = "yes";

const PROMPT_TITLE: &str = "Would you like to report a problem?";
const PROMPT_COLOR: &str = "#E88114";

/// One button of the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAction {
    /// Becomes the button's `action_id`.
    pub name: &'static str,
    pub text: &'static str,
    pub value: &'static str,
    pub style: Option<&'static str>,
}

/// Reply payload asking whether the user wants to file a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugReportPrompt {
    pub title: &'static str,
    pub callback_id: CallbackTag,
    pub color: &'static str,
    pub accept: PromptAction,
    pub decline: PromptAction,
}

impl Default for BugReportPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl BugReportPrompt {
    pub fn new() -> Self {
        Self {
            title: PROMPT_TITLE,
            callback_id: CallbackTag::BugReport,
            color: PROMPT_COLOR,
            accept: PromptAction {
                name: "yes",
                text: "Yes",
                value: ACCEPT_VALUE,
                style: Some("primary"),
            },
            decline: PromptAction {
                name: "nope",
                text: "Nop.",
                value: DECLINE_VALUE,
                style: None,
            },
        }
    }

    /// Both buttons, affirmative first.
    pub fn actions(&self) -> [&PromptAction; 2] {
        [&self.accept, &self.decline]
    }

    /// Render as Block Kit. The actions block carries the callback tag as `block_id`
    /// so the interaction can be correlated back to this prompt.
    pub fn to_blocks(&self) -> Vec<serde_json::Value> {
        let elements: Vec<serde_json::Value> = self
            .actions()
            .into_iter()
            .map(|action| {
                let mut button = json!({
                    "type": "button",
                    "action_id": action.name,
                    "text": { "type": "plain_text", "text": action.text },
                    "value": action.value,
                });
                if let Some(style) = action.style {
                    button["style"] = json!(style);
                }
                button
            })
            .collect();

        vec![
            json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*{}*", self.title) },
            }),
            json!({
                "type": "actions",
                "block_id": self.callback_id.as_str(),
                "elements": elements,
            }),
        ]
    }

    pub fn into_response(self) -> OutboundResponse {
        OutboundResponse::RichMessage {
            text: self.title.to_string(),
            blocks: self.to_blocks(),
            color: Some(self.color.to_string()),
        }
    }
}
