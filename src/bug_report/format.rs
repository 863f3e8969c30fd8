//! Mapping of a completed dialog into an issue-tracker request.

use std::collections::HashMap;

const ENVIRONMENT_HEADING: &str = "%0A%0A%23%23%20Environment%0A%0A";
const PROBLEM_HEADING: &str = "%0A%0A%23%23%20Problem%20Description%0A%0A";
const REPRODUCE_HEADING: &str = "%0A%0A%23%23%20Steps%20to%20reproduce%0A%0A";

/// Severity tiers offered by the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Bug,
    Crit1,
    Crit2,
    Crit3,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "bug" => Some(Severity::Bug),
            "crit1" => Some(Severity::Crit1),
            "crit2" => Some(Severity::Crit2),
            "crit3" => Some(Severity::Crit3),
            _ => None,
        }
    }

    /// Issue label; critical tiers get one penguin per level.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Bug => "Bug",
            Severity::Crit1 => "Critical Bug \u{1F427}",
            Severity::Crit2 => "Critical Bug \u{1F427}\u{1F427}",
            Severity::Crit3 => "Critical Bug \u{1F427}\u{1F427}\u{1F427}",
        }
    }
}

/// Values of one completed bug-report dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub title: String,
    pub severity: String,
    pub environment: String,
    pub problem: String,
    pub reproduce: String,
}

impl Submission {
    /// Pick the bug-report fields out of a submitted value map. Missing keys read as empty.
    pub fn from_values(values: &HashMap<String, String>) -> Self {
        let get = |key: &str| values.get(key).cloned().unwrap_or_default();
        Self {
            title: get("title"),
            severity: get("severity"),
            environment: get("environment"),
            problem: get("problem"),
            reproduce: get("reproduce"),
        }
    }
}

/// A formatted issue, ready for the tracker's query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    /// Percent-encoded title.
    pub title: String,
    /// Raw label text, if the severity mapped to one.
    pub label: Option<String>,
    /// Percent-encoded markdown body.
    pub description: String,
}

impl IssueRequest {
    /// Percent-encoded label, empty when there is none.
    pub fn encoded_label(&self) -> String {
        self.label
            .as_deref()
            .map(|label| urlencoding::encode(label).into_owned())
            .unwrap_or_default()
    }
}

impl From<&Submission> for IssueRequest {
    fn from(submission: &Submission) -> Self {
        format_report(submission)
    }
}

/// Pure and total: any submission produces a request.
pub fn format_report(submission: &Submission) -> IssueRequest {
    let description = [
        (ENVIRONMENT_HEADING, submission.environment.as_str()),
        (PROBLEM_HEADING, submission.problem.as_str()),
        (REPRODUCE_HEADING, submission.reproduce.as_str()),
    ]
    .into_iter()
    .map(|(heading, text)| format!("{heading}{}", urlencoding::encode(text)))
    .collect::<String>();

    IssueRequest {
        title: urlencoding::encode(&submission.title).into_owned(),
        label: Severity::parse(&submission.severity).map(|s| s.label().to_string()),
        description,
    }
}
