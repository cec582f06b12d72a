/// Config schema types (browser, automation timing, credentials, products).
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profiles;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebpilotConfig {
    pub browser: BrowserConfig,
    pub automation: AutomationConfig,
    pub credentials: CredentialsConfig,
    /// Name of the product profile to drive (built-in or from `products`).
    pub product: String,
    /// User-defined product profiles, keyed by name. An entry with the same
    /// name as a built-in profile replaces it.
    pub products: BTreeMap<String, ProductConfig>,
}

impl Default for WebpilotConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            automation: AutomationConfig::default(),
            credentials: CredentialsConfig::default(),
            product: profiles::OPENAI_CODEX.into(),
            products: BTreeMap::new(),
        }
    }
}

impl WebpilotConfig {
    /// Resolve a product profile by name: user-defined entries first, then
    /// the built-in profiles.
    pub fn product_profile(&self, name: &str) -> Option<ProductConfig> {
        self.products
            .get(name)
            .cloned()
            .or_else(|| profiles::builtin(name))
    }

    /// Resolve the currently selected product profile.
    pub fn selected_product(&self) -> Option<ProductConfig> {
        self.product_profile(&self.product)
    }

    /// Names of every resolvable profile, built-ins included.
    pub fn product_names(&self) -> Vec<String> {
        let mut names: Vec<String> = profiles::BUILTIN_NAMES
            .iter()
            .map(|n| (*n).to_string())
            .collect();
        for name in self.products.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Whether to run in headless mode. Identity providers tend to challenge
    /// headless browsers, so the default is a visible window.
    pub headless: bool,
    /// Default viewport width.
    pub viewport_width: u32,
    /// Default viewport height.
    pub viewport_height: u32,
    /// Navigation / CDP request timeout in milliseconds.
    pub navigation_timeout_ms: u64,
    /// User agent string (uses default if not set).
    pub user_agent: Option<String>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            viewport_width: 1440,
            viewport_height: 900,
            navigation_timeout_ms: 60_000,
            user_agent: None,
            chrome_args: Vec::new(),
        }
    }
}

/// Timing and retry knobs shared by every interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Attempts per click/fill/navigation (must be at least 1).
    pub max_attempts: u32,
    /// Pause between failed attempts.
    pub retry_delay_ms: u64,
    /// How long one attempt waits for its element.
    pub action_timeout_ms: u64,
    /// Stabilization pause between scrolling an element into view and clicking it.
    pub settle_delay_ms: u64,
    /// Interval between element state probes.
    pub poll_interval_ms: u64,
    /// Ceiling for a remote job to finish.
    pub completion_timeout_secs: u64,
    /// Ceiling for the identity provider to redirect back after credentials.
    pub login_ceiling_secs: u64,
    /// Interval between URL checks while waiting for the login redirect.
    pub login_poll_interval_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2_000,
            action_timeout_ms: 30_000,
            settle_delay_ms: 1_000,
            poll_interval_ms: 250,
            completion_timeout_secs: 1_200,
            login_ceiling_secs: 300,
            login_poll_interval_ms: 5_000,
        }
    }
}

/// Where the identity credentials come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding the identity email.
    pub email_env: String,
    /// Environment variable holding the identity password.
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            email_env: "GOOGLE_EMAIL".into(),
            password_env: "GOOGLE_PASSWORD".into(),
        }
    }
}

/// Everything the engine needs to know about one remote product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    /// Page opened when the session starts.
    pub landing_url: String,
    pub auth: AuthConfig,
    pub workspace: WorkspaceConfig,
    pub task: TaskConfig,
    pub completion: CompletionConfig,
}

/// Markers and controls of the multi-hop login flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// URL fragment present once the session is authenticated.
    pub authenticated_url: String,
    /// URL fragment of the product's own login page.
    pub login_url: String,
    /// Texts that together identify the login page when the URL does not.
    #[serde(default)]
    pub login_page_texts: Vec<String>,
    /// Entry point on the product login page.
    pub login_button: Vec<String>,
    /// Origin of the identity-provider intermediary page.
    pub identity_origin: String,
    /// "Continue with provider" control on the intermediary page.
    pub continue_button: Vec<String>,
    pub provider: ProviderConfig,
}

/// The external login provider (e.g. Google accounts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Origin of the provider's own login pages.
    pub origin: String,
    /// Alternative selector chains for the email field.
    pub email_inputs: Vec<Vec<String>>,
    pub email_next: Vec<Vec<String>>,
    pub password_inputs: Vec<Vec<String>>,
    pub password_next: Vec<Vec<String>>,
}

/// Controls of the workspace (environment) page. Selectors may contain the
/// placeholders `{name}` (`owner/repo`) and `{repo}` (repository only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// URL fragment of the workspace creation page.
    pub create_url: String,
    pub existing_row: Vec<String>,
    pub use_this: Vec<String>,
    pub create_button: Vec<String>,
    pub candidate_list: Vec<String>,
    pub candidate: Vec<String>,
    pub confirm_create: Vec<String>,
    #[serde(default = "default_existing_wait_ms")]
    pub existing_wait_ms: u64,
    #[serde(default = "default_population_wait_ms")]
    pub population_wait_ms: u64,
    #[serde(default = "default_selection_settle_ms")]
    pub selection_settle_ms: u64,
}

fn default_existing_wait_ms() -> u64 {
    10_000
}

fn default_population_wait_ms() -> u64 {
    10_000
}

fn default_selection_settle_ms() -> u64 {
    2_000
}

/// Controls used while submitting a task and collecting its results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub prompt_input: Vec<String>,
    pub submit_button: Vec<String>,
    /// Transient indicator shown while the task entry is being created.
    #[serde(default)]
    pub loading: Vec<String>,
    pub task_link: Vec<String>,
    /// Input focused after the task is opened (best-effort).
    #[serde(default)]
    pub focus_after_open: Vec<String>,
    pub output: Vec<String>,
    #[serde(default)]
    pub output_fallback: Vec<String>,
    #[serde(default)]
    pub create_pr_button: Vec<String>,
    #[serde(default)]
    pub pr_link: Vec<String>,
    /// Host a captured PR link must point at.
    #[serde(default = "default_pr_host")]
    pub pr_host: String,
    #[serde(default = "default_task_link_wait_ms")]
    pub task_link_wait_ms: u64,
    #[serde(default = "default_pr_button_wait_ms")]
    pub pr_button_wait_ms: u64,
    #[serde(default = "default_pr_link_wait_ms")]
    pub pr_link_wait_ms: u64,
}

fn default_pr_host() -> String {
    "github.com".into()
}

fn default_task_link_wait_ms() -> u64 {
    15_000
}

fn default_pr_button_wait_ms() -> u64 {
    10_000
}

fn default_pr_link_wait_ms() -> u64 {
    30_000
}

/// How to tell that the remote job has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CompletionConfig {
    /// A busy indicator appears and later disappears.
    Indicator {
        selectors: Vec<String>,
        #[serde(default = "default_appear_timeout_ms")]
        appear_timeout_ms: u64,
    },
    /// The output region stops changing for a quiet period.
    ContentStability {
        selectors: Vec<String>,
        #[serde(default = "default_quiet_period_ms")]
        quiet_period_ms: u64,
        #[serde(default = "default_min_length")]
        min_length: usize,
        #[serde(default = "default_check_interval_ms")]
        check_interval_ms: u64,
    },
}

fn default_appear_timeout_ms() -> u64 {
    30_000
}

fn default_quiet_period_ms() -> u64 {
    10_000
}

fn default_min_length() -> usize {
    100
}

fn default_check_interval_ms() -> u64 {
    5_000
}

impl CompletionConfig {
    pub fn selectors(&self) -> &[String] {
        match self {
            Self::Indicator { selectors, .. } | Self::ContentStability { selectors, .. } => {
                selectors
            },
        }
    }
}
