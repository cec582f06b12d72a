//! The one live browser page a task runs in.

use std::sync::Arc;

use {
    tokio::time::Instant,
    tracing::{debug, info},
    webpilot_browser::{PageDriver, PageLauncher},
};

use crate::{
    error::EngineError,
    workspace::{WorkspaceName, WorkspaceOutcome},
};

/// Owns the page handle from launch to close, plus the setup progress made
/// on it.
pub struct Session {
    page: Arc<dyn PageDriver>,
    authenticated: bool,
    workspace: Option<(WorkspaceName, WorkspaceOutcome)>,
    tasks_started: u32,
    opened_at: Instant,
}

impl Session {
    pub async fn open(launcher: &dyn PageLauncher) -> Result<Self, EngineError> {
        let page = launcher.launch().await?;
        info!("browser session opened");
        Ok(Self {
            page,
            authenticated: false,
            workspace: None,
            tasks_started: 0,
            opened_at: Instant::now(),
        })
    }

    pub fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn workspace(&self) -> Option<&WorkspaceName> {
        self.workspace.as_ref().map(|(name, _)| name)
    }

    /// Whether the current workspace was found or had to be created.
    pub fn workspace_outcome(&self) -> Option<WorkspaceOutcome> {
        self.workspace.as_ref().map(|(_, outcome)| *outcome)
    }

    /// Authenticated with a workspace selected: prompts may be submitted.
    pub fn is_ready(&self) -> bool {
        self.authenticated && self.workspace.is_some()
    }

    pub fn tasks_started(&self) -> u32 {
        self.tasks_started
    }

    pub(crate) fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    pub(crate) fn mark_workspace(&mut self, name: WorkspaceName, outcome: WorkspaceOutcome) {
        self.workspace = Some((name, outcome));
    }

    /// Forget setup progress; every task re-establishes it.
    pub(crate) fn begin_task(&mut self) {
        self.authenticated = false;
        self.workspace = None;
        self.tasks_started += 1;
    }

    pub async fn close(self) -> Result<(), EngineError> {
        debug!(
            open_secs = self.opened_at.elapsed().as_secs(),
            tasks = self.tasks_started,
            "closing browser session"
        );
        self.page.close().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::fake::{FakeLauncher, FakePage},
    };

    #[tokio::test]
    async fn readiness_needs_auth_and_workspace() {
        let page = FakePage::new("about:blank");
        let launcher = FakeLauncher::new(page.clone());
        let mut session = Session::open(launcher.as_ref()).await.unwrap();
        assert!(!session.is_ready());

        session.mark_authenticated();
        assert!(!session.is_ready());
        session.mark_workspace(
            WorkspaceName::parse("https://github.com/acme/widget", "github.com").unwrap(),
            WorkspaceOutcome::Created,
        );
        assert!(session.is_ready());
        assert_eq!(session.workspace_outcome(), Some(WorkspaceOutcome::Created));

        session.begin_task();
        assert!(!session.is_ready());
        assert_eq!(session.workspace_outcome(), None);
        assert_eq!(session.tasks_started(), 1);

        session.close().await.unwrap();
        assert!(page.is_closed());
    }

    #[tokio::test]
    async fn launch_failure_surfaces_as_browser_error() {
        let launcher = FakeLauncher::failing(FakePage::new("about:blank"));
        let err = Session::open(launcher.as_ref()).await.err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Browser);
        assert_eq!(launcher.launches(), 1);
    }
}
