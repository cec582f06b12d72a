//! Core value types shared by the engine components.

use std::{fmt, time::Duration};

use {
    serde::{Deserialize, Serialize},
    webpilot_config::AutomationConfig,
};

use crate::{
    error::{EngineError, ErrorKind},
    workspace::WorkspaceName,
};

/// Ordered fallback selectors for one logical element. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec(Vec<String>);

impl SelectorSpec {
    /// `None` when `selectors` yields nothing.
    pub fn new<I, S>(selectors: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = selectors.into_iter().map(Into::into).collect();
        (!list.is_empty()).then_some(Self(list))
    }

    pub fn single(selector: impl Into<String>) -> Self {
        Self(vec![selector.into()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Substitute `{name}` (`owner/repo`) and `{repo}` placeholders.
    pub fn render(&self, workspace: &WorkspaceName) -> Self {
        let full = workspace.full_name();
        Self(
            self.0
                .iter()
                .map(|s| s.replace("{name}", &full).replace("{repo}", &workspace.repo))
                .collect(),
        )
    }

    /// Every selector of every spec, in order.
    pub fn union<'a>(specs: impl IntoIterator<Item = &'a SelectorSpec>) -> Option<Self> {
        Self::new(specs.into_iter().flat_map(|s| s.0.iter().cloned()))
    }
}

impl From<&str> for SelectorSpec {
    fn from(selector: &str) -> Self {
        Self::single(selector)
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" | "))
    }
}

/// Attempt budget applied uniformly to every interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// At least 1.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// How long a single attempt waits for its element.
    pub action_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AutomationConfig::default())
    }
}

impl From<&AutomationConfig> for RetryPolicy {
    fn from(cfg: &AutomationConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            action_timeout: Duration::from_millis(cfg.action_timeout_ms),
        }
    }
}

/// Retry policy plus the remaining timing knobs of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub policy: RetryPolicy,
    /// Pause between scrolling an element into view and clicking it.
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    /// Per-task completion ceiling.
    pub completion_timeout: Duration,
    pub login_ceiling: Duration,
    pub login_poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AutomationConfig::default())
    }
}

impl From<&AutomationConfig> for EngineSettings {
    fn from(cfg: &AutomationConfig) -> Self {
        Self {
            policy: RetryPolicy::from(cfg),
            settle_delay: Duration::from_millis(cfg.settle_delay_ms),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            completion_timeout: Duration::from_secs(cfg.completion_timeout_secs),
            login_ceiling: Duration::from_secs(cfg.login_ceiling_secs),
            login_poll_interval: Duration::from_millis(cfg.login_poll_interval_ms.max(1)),
        }
    }
}

/// How the end of a remote job is recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionCriterion {
    /// A busy indicator appears, then disappears.
    IndicatorBased {
        indicator: SelectorSpec,
        /// How long to wait for the indicator to show up at all.
        appear_timeout: Duration,
    },
    /// The output region stops changing.
    ContentStability {
        output: SelectorSpec,
        quiet_period: Duration,
        /// Minimum output length in characters.
        min_length: usize,
        check_interval: Duration,
    },
}

/// One natural-language task bound to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTask {
    pub prompt: String,
    /// The repository the assistant works on; the workspace is derived from it.
    pub repository_url: String,
    /// Upstream repository when `repository_url` is a fork.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_repository_url: Option<String>,
}

impl PromptTask {
    pub fn new(prompt: impl Into<String>, repository_url: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            repository_url: repository_url.into(),
            original_repository_url: None,
        }
    }

    pub fn with_original(mut self, url: impl Into<String>) -> Self {
        self.original_repository_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    /// For setup failures, what went wrong inside the stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_kind: Option<ErrorKind>,
    pub message: String,
}

impl From<&EngineError> for TaskError {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind(),
            cause_kind: err.cause_kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one task, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub repository_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_repository_url: Option<String>,
    pub extracted_content: Option<String>,
    pub pr_url: Option<String>,
    /// Whether a "create pull request" action was offered and clicked.
    pub pr_requested: bool,
    pub error: Option<TaskError>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub(crate) fn for_task(task: &PromptTask) -> Self {
        Self {
            success: false,
            repository_url: task.repository_url.clone(),
            original_repository_url: task.original_repository_url.clone(),
            extracted_content: None,
            pr_url: None,
            pr_requested: false,
            error: None,
            duration_ms: 0,
        }
    }

    pub(crate) fn failed(mut self, err: &EngineError) -> Self {
        self.success = false;
        self.error = Some(TaskError::from(err));
        self
    }

    /// Human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let status = if self.success {
            "SUCCESS"
        } else {
            "FAILED"
        };
        out.push_str(&format!("Status: {status}\n"));
        out.push_str(&format!("Repository: {}\n", self.repository_url));
        if let Some(ref original) = self.original_repository_url {
            out.push_str(&format!("Original repository: {original}\n"));
        }
        out.push_str(&format!(
            "Duration: {:.1}s\n",
            self.duration_ms as f64 / 1000.0
        ));
        if let Some(ref err) = self.error {
            match err.cause_kind {
                Some(cause) => out.push_str(&format!(
                    "Error ({}, caused by {cause}): {}\n",
                    err.kind, err.message
                )),
                None => out.push_str(&format!("Error ({}): {}\n", err.kind, err.message)),
            }
        }

        out.push('\n');
        match self.extracted_content {
            Some(ref content) => {
                out.push_str("----- agent output -----\n");
                out.push_str(content);
                if !content.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("----- end of output -----\n");
            },
            None => out.push_str("Agent output: not captured\n"),
        }

        match (&self.pr_url, self.pr_requested) {
            (Some(url), _) => out.push_str(&format!("Pull request: {url}\n")),
            (None, true) => out.push_str("Pull request: requested, link not captured\n"),
            (None, false) => out.push_str("Pull request: not created\n"),
        }
        out
    }
}
