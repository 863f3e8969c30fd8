//! Declarative dialog definitions and their Block Kit modal rendering.

use super::CallbackTag;
use crate::error::DialogError;
use serde_json::json;
use std::collections::HashSet;

/// Upper bound for free-text answers in the bug-report dialog.
pub const TEXTAREA_MAX_LENGTH: u32 = 1000;

/// Label/value pair of a select field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Select(Vec<SelectOption>),
    Textarea,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogField {
    /// Unique key of the value in the submission.
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub placeholder: Option<String>,
    pub max_length: Option<u32>,
}

impl DialogField {
    fn new(label: &str, name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            placeholder: None,
            max_length: None,
        }
    }

    fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    fn to_input_block(&self) -> serde_json::Value {
        let mut element = match &self.kind {
            FieldKind::Text => json!({ "type": "plain_text_input" }),
            FieldKind::Textarea => json!({ "type": "plain_text_input", "multiline": true }),
            FieldKind::Select(options) => {
                let options: Vec<serde_json::Value> = options
                    .iter()
                    .map(|option| {
                        json!({
                            "text": plain_text(&option.label),
                            "value": option.value,
                        })
                    })
                    .collect();
                json!({ "type": "static_select", "options": options })
            }
        };
        element["action_id"] = json!(self.name);
        if let Some(placeholder) = &self.placeholder {
            element["placeholder"] = plain_text(placeholder);
        }
        if let Some(max_length) = self.max_length {
            element["max_length"] = json!(max_length);
        }

        json!({
            "type": "input",
            "block_id": self.name,
            "label": plain_text(&self.label),
            "element": element,
        })
    }
}

/// A multi-field form rendered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogDefinition {
    pub title: String,
    pub callback_id: CallbackTag,
    pub submit_label: String,
    pub fields: Vec<DialogField>,
}

impl DialogDefinition {
    pub fn new(title: &str, callback_id: CallbackTag, submit_label: &str) -> Self {
        Self {
            title: title.to_string(),
            callback_id,
            submit_label: submit_label.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn add_text(mut self, label: &str, name: &str, placeholder: &str) -> Self {
        self.fields
            .push(DialogField::new(label, name, FieldKind::Text).with_placeholder(placeholder));
        self
    }

    pub fn add_select(
        mut self,
        label: &str,
        name: &str,
        options: Vec<SelectOption>,
        placeholder: &str,
    ) -> Self {
        self.fields.push(
            DialogField::new(label, name, FieldKind::Select(options)).with_placeholder(placeholder),
        );
        self
    }

    pub fn add_textarea(
        mut self,
        label: &str,
        name: &str,
        placeholder: &str,
        max_length: u32,
    ) -> Self {
        self.fields.push(
            DialogField::new(label, name, FieldKind::Textarea)
                .with_placeholder(placeholder)
                .with_max_length(max_length),
        );
        self
    }

    /// Check that field names are unique and every select has options.
    pub fn validate(self) -> Result<Self, DialogError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DialogError::DuplicateField {
                    name: field.name.clone(),
                });
            }
            if let FieldKind::Select(options) = &field.kind {
                if options.is_empty() {
                    return Err(DialogError::EmptySelect {
                        name: field.name.clone(),
                    });
                }
            }
        }
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<&DialogField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Render as a Block Kit modal view. Each field becomes an input block whose
    /// `block_id` and `action_id` are the field name.
    pub fn to_modal_view(&self) -> serde_json::Value {
        let blocks: Vec<serde_json::Value> =
            self.fields.iter().map(DialogField::to_input_block).collect();

        json!({
            "type": "modal",
            "callback_id": self.callback_id.as_str(),
            "title": plain_text(&self.title),
            "submit": plain_text(&self.submit_label),
            "close": plain_text("Cancel"),
            "blocks": blocks,
        })
    }
}

/// The bug-report form.
pub fn bug_report_dialog() -> DialogDefinition {
    DialogDefinition::new("Bug Report", CallbackTag::SubmitReport, "Submit")
        .add_text("Title", "title", "short description")
        .add_select(
            "Select severity",
            "severity",
            vec![
                SelectOption::new("Annoying", "bug"),
                SelectOption::new("Survivable but sweat-inducing", "crit1"),
                SelectOption::new("It's bad, dude", "crit2"),
                SelectOption::new("OMG I'm freaking out", "crit3"),
            ],
            "Select One",
        )
        .add_select(
            "Select environment",
            "environment",
            vec![
                SelectOption::new("Desktop", "desktop"),
                SelectOption::new("Academic Cloud", "academic_cloud"),
                SelectOption::new("Customer Cloud", "customer_cloud"),
                SelectOption::new("Staging", "staging"),
                SelectOption::new("Development", "master"),
            ],
            "Select One",
        )
        .add_textarea(
            "Problem Description",
            "problem",
            "What happened?",
            TEXTAREA_MAX_LENGTH,
        )
        .add_textarea(
            "Steps to reproduce",
            "reproduce",
            "How did you get here?",
            TEXTAREA_MAX_LENGTH,
        )
}

fn plain_text(text: &str) -> serde_json::Value {
    json!({ "type": "plain_text", "text": text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bug_report_dialog_has_fixed_field_order() {
        let dialog = bug_report_dialog().validate().expect("dialog is valid");
        let names: Vec<&str> = dialog.fields.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(dialog.title, "Bug Report");
        assert_eq!(dialog.callback_id, CallbackTag::SubmitReport);
        assert_eq!(dialog.submit_label, "Submit");
        assert_eq!(
            names,
            vec!["title", "severity", "environment", "problem", "reproduce"]
        );
    }

    #[test]
    fn severity_options_map_to_tiers() {
        let dialog = bug_report_dialog();
        let FieldKind::Select(options) = &dialog.field("severity").expect("severity").kind else {
            panic!("severity must be a select");
        };
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["bug", "crit1", "crit2", "crit3"]);
        assert_eq!(options[0].label, "Annoying");
    }

    #[test]
    fn environment_offers_five_choices() {
        let dialog = bug_report_dialog();
        let FieldKind::Select(options) = &dialog.field("environment").expect("environment").kind
        else {
            panic!("environment must be a select");
        };
        assert_eq!(options.len(), 5);
        assert_eq!(options[4], SelectOption::new("Development", "master"));
    }

    #[test]
    fn textareas_are_bounded() {
        let dialog = bug_report_dialog();
        for name in ["problem", "reproduce"] {
            let field = dialog.field(name).expect("field exists");
            assert_eq!(field.kind, FieldKind::Textarea);
            assert_eq!(field.max_length, Some(1000));
        }
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let error = DialogDefinition::new("x", CallbackTag::SubmitReport, "Go")
            .add_text("A", "title", "")
            .add_text("B", "title", "")
            .validate()
            .expect_err("duplicates must fail");
        assert!(matches!(error, DialogError::DuplicateField { ref name } if name == "title"));
    }

    #[test]
    fn validate_rejects_empty_selects() {
        let error = DialogDefinition::new("x", CallbackTag::SubmitReport, "Go")
            .add_select("Pick", "pick", Vec::new(), "Select One")
            .validate()
            .expect_err("empty select must fail");
        assert!(matches!(error, DialogError::EmptySelect { ref name } if name == "pick"));
    }

    #[test]
    fn modal_view_uses_field_names_as_ids() {
        let view = bug_report_dialog().to_modal_view();

        assert_eq!(view["type"], "modal");
        assert_eq!(view["callback_id"], "submit_report");
        assert_eq!(view["title"]["text"], "Bug Report");
        assert_eq!(view["submit"]["text"], "Submit");

        let blocks = view["blocks"].as_array().expect("blocks");
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[1]["block_id"], "severity");
        assert_eq!(blocks[1]["element"]["action_id"], "severity");
        assert_eq!(blocks[1]["element"]["type"], "static_select");
        assert_eq!(blocks[1]["element"]["options"][3]["value"], "crit3");
        assert_eq!(blocks[3]["element"]["multiline"], true);
        assert_eq!(blocks[3]["element"]["max_length"], 1000);
        assert_eq!(blocks[0]["element"]["placeholder"]["text"], "short description");
    }
}
