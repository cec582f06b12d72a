//! The page-level interface the automation engine is written against.
//!
//! Every method addresses elements by a selector string and acts on the
//! first element it resolves to at call time; no element handles are held
//! between calls, so a re-rendered element is simply found again.

use std::{fmt, sync::Arc};

use {async_trait::async_trait, serde::Deserialize};

use crate::error::BrowserError;

/// Snapshot of one element's state, as seen by a single probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ElementState {
    /// The selector resolved to an element in the DOM.
    pub attached: bool,
    /// The element has a non-empty box and is not hidden by style.
    pub visible: bool,
    /// The element is not disabled (natively or via `aria-disabled`).
    pub enabled: bool,
}

impl ElementState {
    pub const DETACHED: Self = Self {
        attached: false,
        visible: false,
        enabled: false,
    };

    /// Visible and enabled, hence safe to click or fill.
    pub fn is_actionable(&self) -> bool {
        self.attached && self.visible && self.enabled
    }
}

/// Captcha families a driver may know how to solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaKind {
    HCaptcha,
    ReCaptcha,
    GeeTest,
}

impl CaptchaKind {
    pub const ALL: [CaptchaKind; 3] = [Self::HCaptcha, Self::ReCaptcha, Self::GeeTest];
}

impl fmt::Display for CaptchaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HCaptcha => write!(f, "hCaptcha"),
            Self::ReCaptcha => write!(f, "reCAPTCHA"),
            Self::GeeTest => write!(f, "GeeTest"),
        }
    }
}

/// One live page in a browser.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load to settle.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait for any in-flight navigation to finish.
    async fn wait_for_load(&self) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Full serialized HTML of the page.
    async fn content(&self) -> Result<String, BrowserError>;

    /// State of the first element matching `selector`.
    async fn probe(&self, selector: &str) -> Result<ElementState, BrowserError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError>;

    /// Native pointer click at the element's center. Fails with
    /// [`BrowserError::ClickIntercepted`] when another element would receive it.
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Synthetic `element.click()` dispatched from script.
    async fn dispatch_click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn focus(&self, selector: &str) -> Result<(), BrowserError>;

    /// Select all content of an input and delete it.
    async fn clear(&self, selector: &str) -> Result<(), BrowserError>;

    /// Insert text at the caret of the focused element.
    async fn insert_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Current value of an input, or the text of a content-editable element.
    async fn input_value(&self, selector: &str) -> Result<String, BrowserError>;

    /// `innerText` of every match, in document order.
    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError>;

    async fn attribute(&self, selector: &str, name: &str)
    -> Result<Option<String>, BrowserError>;

    /// Try to solve a captcha of the given kind. `Ok(false)` means none was
    /// present or the driver has no solver for it.
    async fn solve_captcha(&self, kind: CaptchaKind) -> Result<bool, BrowserError> {
        let _ = kind;
        Ok(false)
    }

    /// Release the page and the browser behind it.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Opens a fresh page in a freshly launched browser.
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn PageDriver>, BrowserError>;
}
