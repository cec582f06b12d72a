//! Selecting, or creating, the workspace bound to a repository.

use std::{fmt, sync::LazyLock, time::Duration};

use {
    regex::Regex,
    serde::Serialize,
    tokio::time::{Instant, sleep},
    tracing::{debug, info, warn},
};

use crate::{
    error::EngineError,
    interactor::{Condition, Interactor, deadline_after},
    profile::WorkspaceProfile,
    types::SelectorSpec,
};

/// `https://host/owner/repo(.git)(/)`, `host:owner/repo` and
/// `user@host:owner/repo` shapes.
static REPO_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:https?|ssh|git)://)?(?:[\w.-]+@)?([\w.-]+)(?::\d+)?[/:]([\w.-]+)/([\w.-]+?)(?:\.git)?/?$",
    )
    .ok()
});

/// `owner/repo` identity of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceName {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl WorkspaceName {
    /// Parse a repository URL, accepting only repositories on `host`.
    pub fn parse(url: &str, host: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidWorkspace(url.to_string());
        let re = REPO_URL.as_ref().ok_or_else(invalid)?;
        let caps = re.captures(url.trim()).ok_or_else(invalid)?;
        let parsed_host = caps.get(1).map_or("", |m| m.as_str());
        if !parsed_host.eq_ignore_ascii_case(host) {
            return Err(invalid());
        }
        Ok(Self {
            host: parsed_host.to_ascii_lowercase(),
            owner: caps.get(2).map_or("", |m| m.as_str()).to_string(),
            repo: caps.get(3).map_or("", |m| m.as_str()).to_string(),
        })
    }

    /// `owner/repo`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Which branch of the selection flow ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceOutcome {
    Existing,
    Created,
}

pub struct WorkspaceSelector<'a> {
    interactor: &'a Interactor,
    profile: &'a WorkspaceProfile,
}

impl<'a> WorkspaceSelector<'a> {
    pub fn new(interactor: &'a Interactor, profile: &'a WorkspaceProfile) -> Self {
        Self {
            interactor,
            profile,
        }
    }

    /// Select the workspace named after `name`, creating it when it is not
    /// listed.
    pub async fn ensure_selected(
        &self,
        name: &WorkspaceName,
    ) -> Result<WorkspaceOutcome, EngineError> {
        let url = self.interactor.page().current_url().await?;
        if url.contains(&self.profile.create_url) {
            info!(workspace = %name, "already on the creation page");
            self.create(name, false).await?;
            return Ok(WorkspaceOutcome::Created);
        }

        self.interactor.settle_load().await?;
        let row = self.profile.existing_row.render(name);
        match self
            .interactor
            .find(&row, Condition::Visible, self.profile.existing_wait)
            .await
        {
            Ok(selector) => {
                info!(workspace = %name, "existing workspace found");
                self.interactor
                    .click(&SelectorSpec::single(selector))
                    .await?;
                sleep(self.profile.selection_settle).await;
                self.interactor.click(&self.profile.use_this).await?;
                info!(workspace = %name, "existing workspace selected");
                Ok(WorkspaceOutcome::Existing)
            },
            Err(EngineError::NotFound { .. }) => {
                info!(workspace = %name, "no existing workspace, creating one");
                self.create(name, true).await?;
                Ok(WorkspaceOutcome::Created)
            },
            Err(e) => Err(e),
        }
    }

    async fn create(&self, name: &WorkspaceName, open_form: bool) -> Result<(), EngineError> {
        if open_form {
            self.interactor.click(&self.profile.create_button).await?;
        }

        self.interactor
            .find(
                &self.profile.candidate_list,
                Condition::Visible,
                self.profile.population_wait,
            )
            .await?;
        debug!("candidate list populated");

        // `click` scrolls the candidate into view before clicking.
        self.interactor
            .click(&self.profile.candidate.render(name))
            .await?;
        self.interactor.click(&self.profile.confirm_create).await?;

        self.wait_for_redirect().await?;
        self.interactor.click(&self.profile.use_this).await?;
        info!(workspace = %name, "workspace created and selected");
        Ok(())
    }

    /// Wait for the page to leave the creation URL. A missed redirect is
    /// only logged; the confirmation click that follows decides.
    async fn wait_for_redirect(&self) -> Result<(), EngineError> {
        let timeout = self.interactor.policy().action_timeout;
        let deadline = deadline_after(timeout);
        loop {
            let url = self.interactor.page().current_url().await?;
            if !url.contains(&self.profile.create_url) {
                debug!(url, "left the creation page");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    url,
                    timeout_secs = timeout.as_secs(),
                    "still on the creation page after confirming"
                );
                return Ok(());
            }
            sleep(self.interactor.poll_interval().min(deadline - now).max(Duration::from_millis(1)))
                .await;
        }
    }
}
