//! Configuration validation.
//!
//! Checks the loaded configuration for values the engine cannot work with
//! (zero attempts, empty selector chains, unknown product) and for timing
//! combinations that are legal but likely to misfire.

use crate::schema::{ProductConfig, WebpilotConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "automation.max_attempts"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate a loaded configuration.
pub fn validate(config: &WebpilotConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let automation = &config.automation;

    if automation.max_attempts == 0 {
        result.push(
            Severity::Error,
            "automation.max_attempts",
            "must be at least 1",
        );
    }
    if automation.action_timeout_ms == 0 {
        result.push(
            Severity::Error,
            "automation.action_timeout_ms",
            "must be greater than zero",
        );
    }
    if automation.poll_interval_ms == 0 {
        result.push(
            Severity::Error,
            "automation.poll_interval_ms",
            "must be greater than zero",
        );
    }
    if automation.login_poll_interval_ms == 0 {
        result.push(
            Severity::Error,
            "automation.login_poll_interval_ms",
            "must be greater than zero",
        );
    }
    let completion_ms = automation.completion_timeout_secs.saturating_mul(1000);
    if completion_ms < automation.action_timeout_ms.saturating_mul(10) {
        result.push(
            Severity::Warning,
            "automation.completion_timeout_secs",
            format!(
                "{}s is less than ten action timeouts; remote jobs usually run for minutes",
                automation.completion_timeout_secs
            ),
        );
    }

    if config.credentials.email_env.trim().is_empty() {
        result.push(Severity::Error, "credentials.email_env", "must name a variable");
    }
    if config.credentials.password_env.trim().is_empty() {
        result.push(
            Severity::Error,
            "credentials.password_env",
            "must name a variable",
        );
    }

    match config.selected_product() {
        Some(product) => validate_product(&config.product, &product, &mut result),
        None => result.push(
            Severity::Error,
            "product",
            format!(
                "unknown product '{}', available: {}",
                config.product,
                config.product_names().join(", ")
            ),
        ),
    }

    if config.browser.headless {
        result.push(
            Severity::Info,
            "browser.headless",
            "identity providers may challenge headless browsers",
        );
    }

    result
}

fn validate_product(name: &str, product: &ProductConfig, result: &mut ValidationResult) {
    let prefix = format!("products.{name}");

    if !product.landing_url.starts_with("http://") && !product.landing_url.starts_with("https://")
    {
        result.push(
            Severity::Error,
            format!("{prefix}.landing_url"),
            "must be an http(s) URL",
        );
    }

    let required: [(&str, &[String]); 11] = [
        ("auth.login_button", &product.auth.login_button),
        ("auth.continue_button", &product.auth.continue_button),
        ("workspace.existing_row", &product.workspace.existing_row),
        ("workspace.use_this", &product.workspace.use_this),
        ("workspace.create_button", &product.workspace.create_button),
        ("workspace.candidate_list", &product.workspace.candidate_list),
        ("workspace.candidate", &product.workspace.candidate),
        ("workspace.confirm_create", &product.workspace.confirm_create),
        ("task.prompt_input", &product.task.prompt_input),
        ("task.submit_button", &product.task.submit_button),
        ("task.task_link", &product.task.task_link),
    ];
    for (field, selectors) in required {
        if selectors.iter().all(|s| s.trim().is_empty()) {
            result.push(
                Severity::Error,
                format!("{prefix}.{field}"),
                "needs at least one selector",
            );
        }
    }

    if product.task.output.is_empty() {
        result.push(
            Severity::Warning,
            format!("{prefix}.task.output"),
            "no output selectors, agent output will never be captured",
        );
    }

    let provider = &product.auth.provider;
    for (field, strategies) in [
        ("email_inputs", &provider.email_inputs),
        ("password_inputs", &provider.password_inputs),
        ("email_next", &provider.email_next),
        ("password_next", &provider.password_next),
    ] {
        if strategies.iter().all(|s| s.is_empty()) {
            result.push(
                Severity::Error,
                format!("{prefix}.auth.provider.{field}"),
                "needs at least one selector strategy",
            );
        }
    }

    if product.completion.selectors().is_empty() {
        result.push(
            Severity::Error,
            format!("{prefix}.completion.selectors"),
            "needs at least one selector",
        );
    }
}
