//! Runtime browser launch settings.

use serde::{Deserialize, Serialize};

/// Launch settings for one automation browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Whether to run in headless mode.
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Per-command CDP request timeout in milliseconds.
    pub navigation_timeout_ms: u64,
    /// User agent string (uses default if not set).
    pub user_agent: Option<String>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::from(&webpilot_config::BrowserConfig::default())
    }
}

impl From<&webpilot_config::BrowserConfig> for BrowserConfig {
    fn from(cfg: &webpilot_config::BrowserConfig) -> Self {
        Self {
            chrome_path: cfg.chrome_path.clone(),
            headless: cfg.headless,
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            navigation_timeout_ms: cfg.navigation_timeout_ms,
            user_agent: cfg.user_agent.clone(),
            chrome_args: cfg.chrome_args.clone(),
        }
    }
}

impl BrowserConfig {
    /// Chrome flags derived from these settings, in launch order.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.chrome_args.len() + 4);
        if let Some(ref ua) = self.user_agent {
            args.push(format!("--user-agent={ua}"));
        }
        // Keeps identity providers from flagging the session as automated.
        args.push("--disable-blink-features=AutomationControlled".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push("--no-first-run".to_string());
        args.extend(self.chrome_args.iter().cloned());
        args
    }
}
