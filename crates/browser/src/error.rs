//! Browser error types.

use thiserror::Error;

/// Errors that can occur while driving a page.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("no element matches selector {0}")]
    ElementNotFound(String),

    #[error("click on {0} was intercepted by another element")]
    ClickIntercepted(String),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("captcha not solved: {0}")]
    CaptchaUnsolved(String),

    #[error("browser closed unexpectedly")]
    BrowserClosed,

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl BrowserError {
    /// Whether the page is gone for good. Retrying anything after this is
    /// pointless.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::BrowserClosed | Self::ConnectionClosed(_) => true,
            Self::Cdp(msg) => msg.contains("AlreadyClosed") || msg.contains("ConnectionClosed"),
            _ => false,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_connections_are_fatal() {
        assert!(BrowserError::BrowserClosed.is_fatal());
        assert!(BrowserError::ConnectionClosed("ws".into()).is_fatal());
        assert!(BrowserError::Cdp("send failed: AlreadyClosed".into()).is_fatal());
    }

    #[test]
    fn element_errors_are_not_fatal() {
        assert!(!BrowserError::ElementNotFound("#x".into()).is_fatal());
        assert!(!BrowserError::ClickIntercepted("#x".into()).is_fatal());
        assert!(!BrowserError::Cdp("Node is detached".into()).is_fatal());
    }
}
