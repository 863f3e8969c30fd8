//! Bug-report workflow: prompt, dialog, formatting and filing.

pub mod dialog;
pub mod format;
pub mod prompt;
pub mod tracker;

pub use dialog::{DialogDefinition, DialogField, FieldKind, SelectOption};
pub use format::{IssueRequest, Severity, Submission};
pub use prompt::{BugReportPrompt, PromptAction};
pub use tracker::{CreatedIssue, GitLabTracker, IssueTracker, submit_detached};

/// Correlation tags distinguishing the interactions multiplexed through one event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackTag {
    /// Buttons of the "would you like to report a problem?" prompt.
    BugReport,
    /// Submission of the bug-report dialog.
    SubmitReport,
}

impl CallbackTag {
    pub const ALL: [CallbackTag; 2] = [CallbackTag::BugReport, CallbackTag::SubmitReport];

    /// Wire representation used as `block_id` / `callback_id`.
    pub fn as_str(self) -> &'static str {
        match self {
            CallbackTag::BugReport => "bug_report",
            CallbackTag::SubmitReport => "submit_report",
        }
    }

    /// Parse a wire tag. Unknown tags belong to no flow of this bot.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == raw)
    }
}

impl std::fmt::Display for CallbackTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
