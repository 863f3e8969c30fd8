//! Issue tracker client and the detached, best-effort submission task.
//!
//! Filing is fire-and-forget: the request runs on its own task, a created issue
//! is logged, and every failure is dropped. There is no retry, no timeout and
//! no user notification; a lost request is an accepted risk.

use super::IssueRequest;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use serde::Deserialize;
use std::sync::Arc;

/// The tracker's answer to a created issue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIssue {
    pub web_url: String,
}

#[derive(Debug, Deserialize)]
struct CreateIssueResponse {
    web_url: Option<String>,
}

/// Creates issues on an external tracker.
#[async_trait::async_trait]
pub trait IssueTracker: Send + Sync + 'static {
    async fn create_issue(&self, request: &IssueRequest) -> Result<CreatedIssue, TrackerError>;
}

/// GitLab REST API v4 client.
pub struct GitLabTracker {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    token: String,
}

impl GitLabTracker {
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("bugbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            token: config.token.clone(),
        })
    }

    /// All issue data travels in the query string; the fields are already encoded.
    pub fn issue_url(&self, request: &IssueRequest) -> Result<reqwest::Url, TrackerError> {
        let raw = format!(
            "{}/api/v4/projects/{}/issues?title={}&labels={}&description={}",
            self.base_url,
            self.project_id,
            request.title,
            request.encoded_label(),
            request.description,
        );
        reqwest::Url::parse(&raw).map_err(|error| TrackerError::InvalidUrl(error.to_string()))
    }
}

#[async_trait::async_trait]
impl IssueTracker for GitLabTracker {
    async fn create_issue(&self, request: &IssueRequest) -> Result<CreatedIssue, TrackerError> {
        let url = self.issue_url(request)?;
        let response = self
            .http
            .post(url)
            .header("PRIVATE-TOKEN", &self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/json; charset=utf-8",
            )
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(TrackerError::Status {
                status: status.as_u16(),
            });
        }

        let body: CreateIssueResponse = response.json().await?;
        let web_url = body.web_url.ok_or(TrackerError::MissingWebUrl)?;
        Ok(CreatedIssue { web_url })
    }
}

/// File `request` on a detached task. The handle yields the created issue URL, or
/// `None` when filing failed; callers are free to drop it.
pub fn submit_detached(
    tracker: Arc<dyn IssueTracker>,
    request: IssueRequest,
) -> tokio::task::JoinHandle<Option<String>> {
    tokio::spawn(async move {
        match tracker.create_issue(&request).await {
            Ok(issue) => {
                tracing::info!(web_url = %issue.web_url, "bug report filed");
                Some(issue.web_url)
            }
            Err(error) => {
                tracing::debug!(%error, "bug report was not filed");
                None
            }
        }
    })
}
