//! Configuration loading, env substitution, validation and built-in product
//! profiles.
//!
//! Config files: `webpilot.toml`, `webpilot.yaml` or `webpilot.json`,
//! searched in `./` then `~/.config/webpilot/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod loader;
pub mod profiles;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        config_dir, discover_and_load, find_config_file, find_or_default_config_path,
        load_config, load_or_discover, save_config,
    },
    schema::{
        AuthConfig, AutomationConfig, BrowserConfig, CompletionConfig, CredentialsConfig,
        ProductConfig, ProviderConfig, TaskConfig, WebpilotConfig, WorkspaceConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
