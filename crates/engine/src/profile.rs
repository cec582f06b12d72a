//! Product profiles in engine form: validated selector specs and durations.

use std::time::Duration;

use webpilot_config::{
    AuthConfig, CompletionConfig, ProductConfig, ProviderConfig, TaskConfig, WorkspaceConfig,
};

use crate::{
    error::EngineError,
    types::{CompletionCriterion, SelectorSpec},
};

#[derive(Debug, Clone)]
pub struct ProductProfile {
    pub landing_url: String,
    pub auth: AuthProfile,
    pub workspace: WorkspaceProfile,
    pub task: TaskProfile,
    pub completion: CompletionCriterion,
}

#[derive(Debug, Clone)]
pub struct AuthProfile {
    pub authenticated_url: String,
    pub login_url: String,
    pub login_page_texts: Vec<String>,
    pub login_button: SelectorSpec,
    pub identity_origin: String,
    pub continue_button: SelectorSpec,
    pub provider: ProviderProfile,
}

/// Each field lists alternative strategies for the same control.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub origin: String,
    pub email_inputs: Vec<SelectorSpec>,
    pub email_next: Vec<SelectorSpec>,
    pub password_inputs: Vec<SelectorSpec>,
    pub password_next: Vec<SelectorSpec>,
}

#[derive(Debug, Clone)]
pub struct WorkspaceProfile {
    pub create_url: String,
    pub existing_row: SelectorSpec,
    pub use_this: SelectorSpec,
    pub create_button: SelectorSpec,
    pub candidate_list: SelectorSpec,
    pub candidate: SelectorSpec,
    pub confirm_create: SelectorSpec,
    pub existing_wait: Duration,
    pub population_wait: Duration,
    pub selection_settle: Duration,
}

#[derive(Debug, Clone)]
pub struct TaskProfile {
    pub prompt_input: SelectorSpec,
    pub submit_button: SelectorSpec,
    pub loading: Option<SelectorSpec>,
    pub task_link: SelectorSpec,
    pub focus_after_open: Option<SelectorSpec>,
    pub output: SelectorSpec,
    pub output_fallback: Option<SelectorSpec>,
    pub create_pr_button: Option<SelectorSpec>,
    pub pr_link: Option<SelectorSpec>,
    pub pr_host: String,
    pub task_link_wait: Duration,
    pub pr_button_wait: Duration,
    pub pr_link_wait: Duration,
}

fn required(list: &[String], path: &str) -> Result<SelectorSpec, EngineError> {
    SelectorSpec::new(list.iter().cloned())
        .ok_or_else(|| EngineError::InvalidProfile(format!("{path} has no selectors")))
}

fn strategies(list: &[Vec<String>], path: &str) -> Result<Vec<SelectorSpec>, EngineError> {
    if list.is_empty() {
        return Err(EngineError::InvalidProfile(format!(
            "{path} has no strategies"
        )));
    }
    list.iter()
        .enumerate()
        .map(|(i, s)| required(s, &format!("{path}[{i}]")))
        .collect()
}

fn optional(list: &[String]) -> Option<SelectorSpec> {
    SelectorSpec::new(list.iter().cloned())
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl TryFrom<&ProviderConfig> for ProviderProfile {
    type Error = EngineError;

    fn try_from(cfg: &ProviderConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            origin: cfg.origin.clone(),
            email_inputs: strategies(&cfg.email_inputs, "auth.provider.email_inputs")?,
            email_next: strategies(&cfg.email_next, "auth.provider.email_next")?,
            password_inputs: strategies(&cfg.password_inputs, "auth.provider.password_inputs")?,
            password_next: strategies(&cfg.password_next, "auth.provider.password_next")?,
        })
    }
}

impl TryFrom<&AuthConfig> for AuthProfile {
    type Error = EngineError;

    fn try_from(cfg: &AuthConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            authenticated_url: cfg.authenticated_url.clone(),
            login_url: cfg.login_url.clone(),
            login_page_texts: cfg.login_page_texts.clone(),
            login_button: required(&cfg.login_button, "auth.login_button")?,
            identity_origin: cfg.identity_origin.clone(),
            continue_button: required(&cfg.continue_button, "auth.continue_button")?,
            provider: ProviderProfile::try_from(&cfg.provider)?,
        })
    }
}

impl TryFrom<&WorkspaceConfig> for WorkspaceProfile {
    type Error = EngineError;

    fn try_from(cfg: &WorkspaceConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            create_url: cfg.create_url.clone(),
            existing_row: required(&cfg.existing_row, "workspace.existing_row")?,
            use_this: required(&cfg.use_this, "workspace.use_this")?,
            create_button: required(&cfg.create_button, "workspace.create_button")?,
            candidate_list: required(&cfg.candidate_list, "workspace.candidate_list")?,
            candidate: required(&cfg.candidate, "workspace.candidate")?,
            confirm_create: required(&cfg.confirm_create, "workspace.confirm_create")?,
            existing_wait: ms(cfg.existing_wait_ms),
            population_wait: ms(cfg.population_wait_ms),
            selection_settle: ms(cfg.selection_settle_ms),
        })
    }
}

impl TryFrom<&TaskConfig> for TaskProfile {
    type Error = EngineError;

    fn try_from(cfg: &TaskConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            prompt_input: required(&cfg.prompt_input, "task.prompt_input")?,
            submit_button: required(&cfg.submit_button, "task.submit_button")?,
            loading: optional(&cfg.loading),
            task_link: required(&cfg.task_link, "task.task_link")?,
            focus_after_open: optional(&cfg.focus_after_open),
            output: required(&cfg.output, "task.output")?,
            output_fallback: optional(&cfg.output_fallback),
            create_pr_button: optional(&cfg.create_pr_button),
            pr_link: optional(&cfg.pr_link),
            pr_host: cfg.pr_host.clone(),
            task_link_wait: ms(cfg.task_link_wait_ms),
            pr_button_wait: ms(cfg.pr_button_wait_ms),
            pr_link_wait: ms(cfg.pr_link_wait_ms),
        })
    }
}

impl TryFrom<&CompletionConfig> for CompletionCriterion {
    type Error = EngineError;

    fn try_from(cfg: &CompletionConfig) -> Result<Self, Self::Error> {
        Ok(match cfg {
            CompletionConfig::Indicator {
                selectors,
                appear_timeout_ms,
            } => Self::IndicatorBased {
                indicator: required(selectors, "completion.selectors")?,
                appear_timeout: ms(*appear_timeout_ms),
            },
            CompletionConfig::ContentStability {
                selectors,
                quiet_period_ms,
                min_length,
                check_interval_ms,
            } => Self::ContentStability {
                output: required(selectors, "completion.selectors")?,
                quiet_period: ms(*quiet_period_ms),
                min_length: *min_length,
                check_interval: ms((*check_interval_ms).max(1)),
            },
        })
    }
}

impl TryFrom<&ProductConfig> for ProductProfile {
    type Error = EngineError;

    fn try_from(cfg: &ProductConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            landing_url: cfg.landing_url.clone(),
            auth: AuthProfile::try_from(&cfg.auth)?,
            workspace: WorkspaceProfile::try_from(&cfg.workspace)?,
            task: TaskProfile::try_from(&cfg.task)?,
            completion: CompletionCriterion::try_from(&cfg.completion)?,
        })
    }
}
