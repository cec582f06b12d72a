//! Engine error taxonomy.

use std::time::Duration;

use {
    serde::{Deserialize, Serialize},
    thiserror::Error,
    webpilot_browser::BrowserError,
};

/// Serialisable classification of an [`EngineError`], carried in task results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NotActionable,
    VerificationMismatch,
    AuthenticationFailed,
    MissingCredentials,
    SetupFailed,
    CompletionTimeout,
    InvalidWorkspace,
    SessionNotOpen,
    Browser,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::NotActionable => "not_actionable",
            Self::VerificationMismatch => "verification_mismatch",
            Self::AuthenticationFailed => "authentication_failed",
            Self::MissingCredentials => "missing_credentials",
            Self::SetupFailed => "setup_failed",
            Self::CompletionTimeout => "completion_timeout",
            Self::InvalidWorkspace => "invalid_workspace",
            Self::SessionNotOpen => "session_not_open",
            Self::Browser => "browser",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no element matched {selectors}")]
    NotFound { selectors: String },

    #[error("element {selector} never became visible and enabled")]
    NotActionable { selector: String },

    /// Read-back of a filled input differed from the intended text. Only
    /// lengths are kept so that secrets never end up in messages.
    #[error("read-back of {selector} did not match ({expected} chars expected, {actual} found)")]
    VerificationMismatch {
        selector: String,
        expected: usize,
        actual: usize,
    },

    #[error("{action} on {target} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        action: &'static str,
        target: String,
        attempts: u32,
        #[source]
        last: Box<EngineError>,
    },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("{stage} setup failed: {source}")]
    SetupFailed {
        stage: &'static str,
        #[source]
        source: Box<EngineError>,
    },

    #[error("task did not complete within {0:?}")]
    CompletionTimeout(Duration),

    #[error("cannot derive a workspace from {0:?}")]
    InvalidWorkspace(String),

    #[error("invalid product profile: {0}")]
    InvalidProfile(String),

    #[error("no browser session is open")]
    SessionNotOpen,

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotActionable { .. } => ErrorKind::NotActionable,
            Self::VerificationMismatch { .. } => ErrorKind::VerificationMismatch,
            Self::RetriesExhausted { last, .. } => last.kind(),
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::MissingCredentials(_) => ErrorKind::MissingCredentials,
            Self::SetupFailed { .. } | Self::InvalidProfile(_) => ErrorKind::SetupFailed,
            Self::CompletionTimeout(_) => ErrorKind::CompletionTimeout,
            Self::InvalidWorkspace(_) => ErrorKind::InvalidWorkspace,
            Self::SessionNotOpen => ErrorKind::SessionNotOpen,
            Self::Browser(_) => ErrorKind::Browser,
        }
    }

    /// Kind of the failure a setup stage wrapped, so callers can tell a
    /// missing credential from a broken login page.
    pub fn cause_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::SetupFailed { source, .. } => Some(source.kind()),
            Self::RetriesExhausted { last, .. } => last.cause_kind(),
            _ => None,
        }
    }

    /// The browser is gone; nothing more can be attempted on this session.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Browser(e) => e.is_fatal(),
            Self::RetriesExhausted { last, .. } | Self::SetupFailed { source: last, .. } => {
                last.is_fatal()
            },
            _ => false,
        }
    }

    pub(crate) fn setup(stage: &'static str, source: EngineError) -> Self {
        Self::SetupFailed {
            stage,
            source: Box::new(source),
        }
    }
}
