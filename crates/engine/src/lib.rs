//! Automation engine that drives a remote coding assistant's web UI.
//!
//! A task goes through [`Orchestrator`]: authenticate through the product's
//! login and its identity provider ([`Authenticator`]), select or create the
//! workspace for the repository ([`WorkspaceSelector`]), submit the prompt,
//! wait for the job ([`CompletionMonitor`]) and collect its output and pull
//! request link. Every element interaction goes through [`Interactor`], which
//! waits, verifies and retries.

pub mod auth;
pub mod credentials;
pub mod error;
pub mod interactor;
pub mod monitor;
pub mod orchestrator;
pub mod profile;
pub mod session;
pub mod types;
pub mod workspace;

#[cfg(test)]
mod fake;

pub use {
    auth::{AuthPhase, Authenticator},
    credentials::{CredentialSource, Credentials, EnvCredentials, StaticCredentials},
    error::{EngineError, ErrorKind},
    interactor::{Condition, Interactor},
    monitor::{Completion, CompletionMonitor, MonitorPhase},
    orchestrator::{Orchestrator, is_pull_request_url},
    profile::{AuthProfile, ProductProfile, ProviderProfile, TaskProfile, WorkspaceProfile},
    session::Session,
    types::{
        CompletionCriterion, EngineSettings, PromptTask, RetryPolicy, SelectorSpec, TaskError,
        TaskResult,
    },
    workspace::{WorkspaceName, WorkspaceOutcome, WorkspaceSelector},
};
