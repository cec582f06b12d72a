//! Identity credentials for the provider login step.

use {
    secrecy::{ExposeSecret, Secret},
    webpilot_config::CredentialsConfig,
};

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: Secret<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Secret::new(password.into()),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// Where credentials come from. Called only when a login actually needs them.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Result<Credentials, EngineError>;
}

/// Reads the email and password from two environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    email_var: String,
    password_var: String,
}

impl EnvCredentials {
    pub fn new(email_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            email_var: email_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Resolve through `lookup` instead of the process environment.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, EngineError> {
        let read = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EngineError::MissingCredentials(format!("{var} is not set")))
        };
        let email = read(&self.email_var)?;
        let password = read(&self.password_var)?;
        Ok(Credentials::new(email.trim(), password))
    }
}

impl From<&CredentialsConfig> for EnvCredentials {
    fn from(cfg: &CredentialsConfig) -> Self {
        Self::new(&cfg.email_env, &cfg.password_env)
    }
}

impl CredentialSource for EnvCredentials {
    fn credentials(&self) -> Result<Credentials, EngineError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }
}

/// Fixed credentials, e.g. supplied by an embedding application.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialSource for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, EngineError> {
        Ok(self.0.clone())
    }
}
