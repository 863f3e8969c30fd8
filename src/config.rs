//! Configuration loading and validation.
//!
//! Values come from an optional TOML file and are overridden by environment
//! variables. The result is resolved once at startup and handed to the bot.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;

/// Keywords that trigger the bug-report prompt when no file overrides them.
pub const DEFAULT_BUG_KEYWORDS: &[&str] = &["bug", "error", "problem", "failure", "fehler", "report"];

/// bugbot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Slack Socket Mode credentials.
    pub slack: SlackConfig,

    /// Issue tracker endpoint and credentials.
    pub tracker: TrackerConfig,

    /// Bug-report workflow settings.
    pub bug_report: BugReportConfig,
}

/// Slack credentials.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-...`).
    pub bot_token: String,

    /// App-level token for Socket Mode (`xapp-...`).
    pub app_token: String,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"<redacted>")
            .field("app_token", &"<redacted>")
            .finish()
    }
}

/// GitLab-compatible issue tracker settings.
#[derive(Clone)]
pub struct TrackerConfig {
    /// Base URL of the tracker, e.g. `https://gitlab.example.com`.
    pub base_url: String,

    /// Numeric id or URL-encoded path of the target project.
    pub project_id: String,

    /// Access token sent as `PRIVATE-TOKEN`.
    pub token: String,
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Bug-report workflow settings.
#[derive(Debug, Clone)]
pub struct BugReportConfig {
    /// Patterns that make the bot offer a bug report.
    pub keywords: Vec<String>,
}

impl Default for BugReportConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_BUG_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// On-disk shape of the config file. Every key is optional so env vars can fill gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlConfig {
    slack: TomlSlackConfig,
    tracker: TomlTrackerConfig,
    bug_report: TomlBugReportConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlSlackConfig {
    bot_token: Option<String>,
    app_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlTrackerConfig {
    base_url: Option<String>,
    project_id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlBugReportConfig {
    keywords: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables only.
    pub fn load() -> Result<Self> {
        Self::resolve(TomlConfig::default(), |key| std::env::var(key).ok())
    }

    /// Load from a TOML config file, then apply environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            path: path.display().to_string(),
            source: std::sync::Arc::new(error),
        })?;
        let file = parse_toml(&raw, path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn resolve(file: TomlConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| env(key))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        // TOKEN and SLACK_TOKEN are accepted for older deployments.
        let bot_token = lookup(&["SLACK_BOT_TOKEN", "TOKEN", "SLACK_TOKEN"])
            .or(file.slack.bot_token)
            .ok_or_else(|| ConfigError::MissingKey("slack.bot_token (SLACK_BOT_TOKEN)".into()))?;
        let app_token = lookup(&["SLACK_APP_TOKEN"])
            .or(file.slack.app_token)
            .ok_or_else(|| ConfigError::MissingKey("slack.app_token (SLACK_APP_TOKEN)".into()))?;

        let base_url = lookup(&["ISSUE_TRACKER_URL"])
            .or(file.tracker.base_url)
            .ok_or_else(|| ConfigError::MissingKey("tracker.base_url (ISSUE_TRACKER_URL)".into()))?;
        let project_id = lookup(&["ISSUE_TRACKER_PROJECT"])
            .or(file.tracker.project_id)
            .ok_or_else(|| {
                ConfigError::MissingKey("tracker.project_id (ISSUE_TRACKER_PROJECT)".into())
            })?;
        let token = lookup(&["GITLAB_TOKEN"])
            .or(file.tracker.token)
            .ok_or_else(|| ConfigError::MissingKey("tracker.token (GITLAB_TOKEN)".into()))?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "tracker.base_url must be an http(s) URL, got `{base_url}`"
            ))
            .into());
        }

        let bug_report = match file.bug_report.keywords {
            Some(keywords) if keywords.is_empty() => {
                return Err(ConfigError::Invalid(
                    "bug_report.keywords must list at least one pattern".into(),
                )
                .into());
            }
            Some(keywords) => BugReportConfig { keywords },
            None => BugReportConfig::default(),
        };

        Ok(Self {
            slack: SlackConfig {
                bot_token,
                app_token,
            },
            tracker: TrackerConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                project_id,
                token,
            },
            bug_report,
        })
    }
}

fn parse_toml(raw: &str, path: &Path) -> Result<TomlConfig> {
    toml::from_str(raw).map_err(|error| {
        ConfigError::Parse {
            path: path.display().to_string(),
            message: error.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FULL_FILE: &str = r#"
[slack]
bot_token = "xoxb-file"
app_token = "xapp-file"

[tracker]
base_url = "https://gitlab.example.com/"
project_id = "18"
token = "file-token"
"#;

    #[test]
    fn file_values_are_used_without_env() {
        let file: TomlConfig = toml::from_str(FULL_FILE).expect("valid toml");
        let config = Config::resolve(file, env_from(&[])).expect("config should resolve");

        assert_eq!(config.slack.bot_token, "xoxb-file");
        assert_eq!(config.tracker.base_url, "https://gitlab.example.com");
        assert_eq!(config.tracker.project_id, "18");
        assert_eq!(config.bug_report.keywords.len(), DEFAULT_BUG_KEYWORDS.len());
    }

    #[test]
    fn env_overrides_file_values() {
        let file: TomlConfig = toml::from_str(FULL_FILE).expect("valid toml");
        let config = Config::resolve(
            file,
            env_from(&[("GITLAB_TOKEN", "env-token"), ("SLACK_TOKEN", "xoxb-legacy")]),
        )
        .expect("config should resolve");

        assert_eq!(config.tracker.token, "env-token");
        assert_eq!(config.slack.bot_token, "xoxb-legacy");
    }

    #[test]
    fn missing_tracker_token_is_reported() {
        let error = Config::resolve(
            TomlConfig::default(),
            env_from(&[
                ("SLACK_BOT_TOKEN", "xoxb"),
                ("SLACK_APP_TOKEN", "xapp"),
                ("ISSUE_TRACKER_URL", "https://gitlab.example.com"),
                ("ISSUE_TRACKER_PROJECT", "18"),
            ]),
        )
        .expect_err("token is required");

        assert!(matches!(
            error,
            Error::Config(ConfigError::MissingKey(ref key)) if key.contains("GITLAB_TOKEN")
        ));
    }

    #[test]
    fn rejects_non_http_tracker_url() {
        let file: TomlConfig = toml::from_str(FULL_FILE).expect("valid toml");
        let error = Config::resolve(file, env_from(&[("ISSUE_TRACKER_URL", "gitlab.local")]))
            .expect_err("scheme is required");

        assert!(matches!(error, Error::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let raw = format!("{FULL_FILE}\n[bug_report]\nkeywords = [\"broken\"]\n");
        let file: TomlConfig = toml::from_str(&raw).expect("valid toml");
        let config = Config::resolve(file, env_from(&[])).expect("config should resolve");

        assert_eq!(config.bug_report.keywords, vec!["broken".to_string()]);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bugbot.toml");
        std::fs::write(&path, "[slack\nbot_token = 1").expect("write config");

        let error = Config::load_from_path(&path).expect_err("broken toml must fail");
        assert!(matches!(error, Error::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn load_from_path_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = Config::load_from_path(&dir.path().join("absent.toml"))
            .expect_err("missing file must fail");
        assert!(matches!(error, Error::Config(ConfigError::Load { .. })));
    }
}
