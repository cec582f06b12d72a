//! Chrome/Chromium page driving over CDP.
//!
//! The automation engine talks to a page only through [`PageDriver`];
//! [`CdpLauncher`] starts a local browser and hands back a [`CdpPage`]
//! implementing it with chromiumoxide.
//!
//! # Example
//!
//! ```ignore
//! use webpilot_browser::{BrowserConfig, CdpLauncher, PageLauncher};
//!
//! let launcher = CdpLauncher::new(BrowserConfig::default());
//! let page = launcher.launch().await?;
//! page.goto("https://example.com").await?;
//! let state = page.probe("button:has-text('Sign in')").await?;
//! page.close().await?;
//! ```

pub mod cdp;
pub mod detect;
pub mod driver;
pub mod error;
pub mod scripts;
pub mod types;

pub use {
    cdp::{CdpLauncher, CdpPage},
    detect::{Detection, DetectionSource, detect_browser, install_instructions},
    driver::{CaptchaKind, ElementState, PageDriver, PageLauncher},
    error::BrowserError,
    types::BrowserConfig,
};
