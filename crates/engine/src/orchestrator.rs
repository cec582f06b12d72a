//! End-to-end task lifecycle: authenticate, select the workspace, submit,
//! wait for completion, collect results.

use std::{sync::Arc, time::Duration};

use {
    tokio::time::{Instant, timeout},
    tracing::{debug, error, info, warn},
    url::Url,
    webpilot_browser::PageLauncher,
};

use crate::{
    auth::Authenticator,
    credentials::CredentialSource,
    error::EngineError,
    interactor::{Condition, Interactor},
    monitor::CompletionMonitor,
    profile::{ProductProfile, TaskProfile},
    session::Session,
    types::{EngineSettings, PromptTask, SelectorSpec, TaskResult},
    workspace::{WorkspaceName, WorkspaceSelector},
};

/// How long a transient loading indicator gets to show up after submission.
const LOADING_APPEAR_WINDOW: Duration = Duration::from_secs(5);
/// Bound on waiting for that indicator to go away again.
const LOADING_HIDE_CEILING: Duration = Duration::from_secs(30);
const FOCUS_WAIT: Duration = Duration::from_secs(5);

/// Whether `url` is a pull request on `host` (or one of its subdomains).
pub fn is_pull_request_url(url: &str, host: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let host_matches = parsed.host_str().is_some_and(|h| {
        h.eq_ignore_ascii_case(host) || h.to_ascii_lowercase().ends_with(&format!(".{host}"))
    });
    host_matches && parsed.path().contains("/pull/")
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

pub struct Orchestrator {
    launcher: Arc<dyn PageLauncher>,
    profile: ProductProfile,
    settings: EngineSettings,
    credentials: Arc<dyn CredentialSource>,
    session: Option<Session>,
}

impl Orchestrator {
    pub fn new(
        launcher: Arc<dyn PageLauncher>,
        profile: ProductProfile,
        settings: EngineSettings,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            launcher,
            profile,
            settings,
            credentials,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Launch the browser and open the product's landing page. A browser
    /// that launched but could not navigate is closed again.
    pub async fn open(&mut self) -> Result<(), EngineError> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = Session::open(self.launcher.as_ref()).await?;
        let ix = Interactor::new(session.page().clone(), &self.settings);
        if let Err(e) = ix.navigate(&self.profile.landing_url).await {
            if let Err(close_err) = session.close().await {
                warn!(error = %close_err, "closing the browser after a failed open");
            }
            return Err(e);
        }
        self.session = Some(session);
        Ok(())
    }

    /// Close the session, if any. Idempotent.
    pub async fn close(&mut self) -> Result<(), EngineError> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    /// Run one task on the open session. Never fails: every error ends up in
    /// the returned result.
    pub async fn execute(&mut self, task: &PromptTask) -> TaskResult {
        let started = Instant::now();
        let mut result = TaskResult::for_task(task);
        match self.execute_steps(task, &mut result).await {
            Ok(()) => result.success = true,
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "task failed");
                result = result.failed(&e);
            },
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    /// [`Self::open`], [`Self::execute`], [`Self::close`]; the browser is
    /// closed on every path.
    pub async fn run(&mut self, task: &PromptTask) -> TaskResult {
        let started = Instant::now();
        let mut result = match self.open().await {
            Ok(()) => self.execute(task).await,
            Err(e) => {
                error!(error = %e, "could not open the browser session");
                TaskResult::for_task(task).failed(&EngineError::setup("browser", e))
            },
        };
        if let Err(e) = self.close().await {
            warn!(error = %e, "closing the browser failed");
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn execute_steps(
        &mut self,
        task: &PromptTask,
        result: &mut TaskResult,
    ) -> Result<(), EngineError> {
        let profile = &self.profile;
        let settings = &self.settings;
        let session = self.session.as_mut().ok_or(EngineError::SessionNotOpen)?;
        let ix = Interactor::new(session.page().clone(), settings);

        if session.tasks_started() > 0 {
            ix.navigate(&profile.landing_url)
                .await
                .map_err(|e| EngineError::setup("navigation", e))?;
        }
        session.begin_task();
        info!(
            repository = task.repository_url,
            original = task.original_repository_url.as_deref().unwrap_or("-"),
            "starting task"
        );

        // Setup: never retried here, each component has exhausted its own retries.
        let name = WorkspaceName::parse(&task.repository_url, &profile.task.pr_host)
            .map_err(|e| EngineError::setup("workspace", e))?;
        Authenticator::new(&ix, &profile.auth, self.credentials.clone())
            .with_login_wait(settings.login_ceiling, settings.login_poll_interval)
            .ensure_authenticated()
            .await
            .map_err(|e| EngineError::setup("authentication", e))?;
        session.mark_authenticated();
        let outcome = WorkspaceSelector::new(&ix, &profile.workspace)
            .ensure_selected(&name)
            .await
            .map_err(|e| EngineError::setup("workspace", e))?;
        info!(workspace = %name, ?outcome, "workspace ready");
        session.mark_workspace(name, outcome);
        if !session.is_ready() {
            return Err(EngineError::setup("session", EngineError::SessionNotOpen));
        }

        submit(&ix, &profile.task, &task.prompt).await?;
        await_loading(&ix, &profile.task).await;

        // Absence here is conclusive; resubmitting would duplicate the task.
        ix.click_within(&profile.task.task_link, profile.task.task_link_wait)
            .await?;
        info!("task opened");
        focus_input(&ix, &profile.task).await;

        let completion = CompletionMonitor::new(&ix, settings.completion_timeout)
            .wait(&profile.completion)
            .await?;
        info!(
            elapsed_secs = completion.elapsed.as_secs(),
            immediate = completion.was_immediate(),
            "task completed"
        );

        result.extracted_content = extract_output(&ix, &profile.task).await;
        let (requested, pr_url) = request_pull_request(&ix, &profile.task).await;
        result.pr_requested = requested;
        result.pr_url = pr_url;
        Ok(())
    }
}

async fn submit(ix: &Interactor, task: &TaskProfile, prompt: &str) -> Result<(), EngineError> {
    info!(
        chars = prompt.chars().count(),
        prompt = %preview(prompt, 80),
        "submitting prompt"
    );
    ix.fill(&task.prompt_input, prompt).await?;
    ix.click(&task.submit_button).await?;
    Ok(())
}

/// Best effort: only logs.
async fn await_loading(ix: &Interactor, task: &TaskProfile) {
    let Some(ref loading) = task.loading else {
        return;
    };
    let selector = match ix
        .find(loading, Condition::Visible, LOADING_APPEAR_WINDOW)
        .await
    {
        Ok(selector) => selector,
        Err(_) => {
            debug!("no loading indicator after submission");
            return;
        },
    };
    match ix
        .find(
            &SelectorSpec::single(&selector),
            Condition::Hidden,
            LOADING_HIDE_CEILING,
        )
        .await
    {
        Ok(_) => debug!(selector, "loading indicator gone"),
        Err(e) => warn!(selector, error = %e, "loading indicator still visible"),
    }
}

async fn focus_input(ix: &Interactor, task: &TaskProfile) {
    let Some(ref input) = task.focus_after_open else {
        return;
    };
    match ix.find(input, Condition::Visible, FOCUS_WAIT).await {
        Ok(selector) => {
            if let Err(e) = ix.page().focus(&selector).await {
                debug!(selector, error = %e, "focusing the task input failed");
            }
        },
        Err(e) => debug!(error = %e, "task input not found"),
    }
}

/// Primary output region first, then the looser fallback.
async fn extract_output(ix: &Interactor, task: &TaskProfile) -> Option<String> {
    let bound = ix.policy().action_timeout;
    for spec in std::iter::once(&task.output).chain(task.output_fallback.as_ref()) {
        match timeout(bound, ix.last_text(spec)).await {
            Ok(Ok(Some(text))) => {
                info!(chars = text.chars().count(), "agent output captured");
                return Some(text);
            },
            Ok(Ok(None)) => debug!(selectors = %spec, "no output under selectors"),
            Ok(Err(e)) => warn!(selectors = %spec, error = %e, "reading output failed"),
            Err(_) => warn!(selectors = %spec, "reading output timed out"),
        }
    }
    warn!("agent output not captured");
    None
}

/// Returns whether a pull request was requested and the captured link.
async fn request_pull_request(ix: &Interactor, task: &TaskProfile) -> (bool, Option<String>) {
    let Some(ref button) = task.create_pr_button else {
        return (false, None);
    };
    if ix
        .find(button, Condition::Actionable, task.pr_button_wait)
        .await
        .is_err()
    {
        info!("no pull request offered");
        return (false, None);
    }
    if let Err(e) = ix.click_within(button, task.pr_button_wait).await {
        warn!(error = %e, "requesting the pull request failed");
        return (false, None);
    }
    info!("pull request requested");

    let Some(ref link) = task.pr_link else {
        return (true, None);
    };
    let selector = match ix.find(link, Condition::Visible, task.pr_link_wait).await {
        Ok(selector) => selector,
        Err(e) => {
            warn!(error = %e, "pull request link did not appear");
            return (true, None);
        },
    };
    match ix.page().attribute(&selector, "href").await {
        Ok(Some(href)) if is_pull_request_url(&href, &task.pr_host) => {
            info!(url = href, "pull request captured");
            (true, Some(href))
        },
        Ok(href) => {
            warn!(?href, host = task.pr_host, "link is not a pull request");
            (true, None)
        },
        Err(e) => {
            warn!(error = %e, "reading the pull request link failed");
            (true, None)
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            credentials::{Credentials, EnvCredentials, StaticCredentials},
            error::ErrorKind,
            fake::{Action, Effect, FakeElement, FakeLauncher, FakePage},
            types::CompletionCriterion,
            workspace::WorkspaceOutcome,
        },
        webpilot_config::profiles,
    };

    const LANDING: &str = "https://chatgpt.com/auth/login?next=/codex/settings/environments";
    const HOME: &str = "https://chatgpt.com/codex/settings/environments";
    const ROW: &str = r"tr.group\/row:text-is('acme/widget')";
    const USE_THIS: &str = "button:has-text('Use this')";
    const PROMPT: &str = "#prompt-textarea";
    const SUBMIT: &str = "button:has-text('Code')";
    const TASK_LINK: &str = ".task-row-container a";
    const OUTPUT: &str = "div.markdown.prose";
    const STOP: &str = "button[aria-label='stop-button']";
    const CREATE_PR: &str = "div.btn-primary button:has-text('Create PR')";
    const VIEW_PR: &str = "a:has-text('View PR')";
    const REPO: &str = "https://github.com/acme/widget.git";

    fn codex() -> ProductProfile {
        ProductProfile::try_from(&profiles::openai_codex()).unwrap()
    }

    fn stability_profile() -> ProductProfile {
        let mut profile = codex();
        profile.completion = CompletionCriterion::ContentStability {
            output: SelectorSpec::from(OUTPUT),
            quiet_period: Duration::from_secs(10),
            min_length: 100,
            check_interval: Duration::from_secs(5),
        };
        profile
    }

    fn orchestrator(page: &Arc<FakePage>, profile: ProductProfile) -> Orchestrator {
        Orchestrator::new(
            FakeLauncher::new(page.clone()),
            profile,
            EngineSettings::default(),
            Arc::new(StaticCredentials(Credentials::new("me@example.com", "pw"))),
        )
    }

    /// Logged-in product with `acme/widget` listed; submitting creates a task
    /// whose page shows `on_open` effects.
    fn product_page(on_open: Vec<Effect>) -> Arc<FakePage> {
        let page = FakePage::new("about:blank");
        page.redirect(LANDING, HOME);
        page.add(ROW, FakeElement::new());
        page.add(USE_THIS, FakeElement::new());
        page.add(PROMPT, FakeElement::new());

        let mut link = FakeElement::new();
        for effect in on_open {
            link = link.on_click(effect);
        }
        page.add(
            SUBMIT,
            FakeElement::new().on_click(Effect::Show(
                TASK_LINK.into(),
                link.appears_after(Duration::from_secs(3)),
            )),
        );
        page
    }

    fn long_answer() -> String {
        format!("Fixed the race in the cache. {}", "Details follow. ".repeat(10))
    }

    #[test]
    fn pull_request_urls_must_match_host_and_path() {
        assert!(is_pull_request_url("https://github.com/acme/widget/pull/42", "github.com"));
        assert!(is_pull_request_url("https://www.github.com/acme/widget/pull/1", "github.com"));
        assert!(!is_pull_request_url("https://github.com/acme/widget/issues/42", "github.com"));
        assert!(!is_pull_request_url("https://evil.example/acme/pull/42", "github.com"));
        assert!(!is_pull_request_url("/acme/widget/pull/42", "github.com"));
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("héllo wörld", 5), "héllo…");
        assert_eq!(preview("short", 80), "short");
    }

    #[tokio::test(start_paused = true)]
    async fn stable_output_without_pr_succeeds() {
        let answer = long_answer();
        let page = product_page(vec![Effect::Show(
            OUTPUT.into(),
            FakeElement::new()
                .text("Thinking...")
                .text_after(Duration::from_secs(40), answer.clone()),
        )]);
        let mut orch = orchestrator(&page, stability_profile());

        let result = orch.run(&PromptTask::new("fix the cache race", REPO)).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.extracted_content.as_deref(), Some(answer.trim()));
        assert_eq!(result.pr_url, None);
        assert!(!result.pr_requested);
        assert!(result.error.is_none());

        assert_eq!(page.value(PROMPT).unwrap(), "fix the cache race");
        assert_eq!(page.clicks(SUBMIT), 1);
        assert!(page.is_closed());
        assert!(orch.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn indicator_completion_and_pull_request_are_captured() {
        let page = product_page(vec![
            Effect::Show(
                STOP.into(),
                FakeElement::new()
                    .appears_after(Duration::from_secs(2))
                    .vanishes_after(Duration::from_secs(90)),
            ),
            Effect::Show(OUTPUT.into(), FakeElement::new().text(long_answer())),
            Effect::Show(
                CREATE_PR.into(),
                FakeElement::new().on_click(Effect::Show(
                    VIEW_PR.into(),
                    FakeElement::new()
                        .appears_after(Duration::from_secs(5))
                        .attr("href", "https://github.com/acme/widget/pull/42"),
                )),
            ),
        ]);
        let mut orch = orchestrator(&page, codex());
        orch.open().await.unwrap();

        let task = PromptTask::new("add tests", REPO).with_original("https://github.com/upstream/widget");
        let result = orch.execute(&task).await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.pr_requested);
        assert_eq!(
            result.pr_url.as_deref(),
            Some("https://github.com/acme/widget/pull/42")
        );
        assert_eq!(
            result.original_repository_url.as_deref(),
            Some("https://github.com/upstream/widget")
        );
        assert!(result.duration_ms >= 90_000);

        let session = orch.session().unwrap();
        assert!(session.is_ready());
        assert_eq!(session.workspace().unwrap().full_name(), "acme/widget");
        assert_eq!(session.workspace_outcome(), Some(WorkspaceOutcome::Existing));

        orch.close().await.unwrap();
        orch.close().await.unwrap();
        assert_eq!(page.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pr_link_to_another_host_is_not_captured() {
        let page = product_page(vec![
            Effect::Show(OUTPUT.into(), FakeElement::new().text(long_answer())),
            Effect::Show(
                CREATE_PR.into(),
                FakeElement::new().on_click(Effect::Show(
                    VIEW_PR.into(),
                    FakeElement::new().attr("href", "https://example.com/acme/widget/pull/42"),
                )),
            ),
        ]);
        let mut orch = orchestrator(&page, codex());

        let result = orch.run(&PromptTask::new("add tests", REPO)).await;
        assert!(result.success);
        assert!(result.pr_requested);
        assert_eq!(result.pr_url, None);
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_is_setup_failure_and_closes_browser() {
        let page = FakePage::new("about:blank");
        page.add(PROMPT, FakeElement::new());
        let mut orch = orchestrator(&page, codex());

        let result = orch.run(&PromptTask::new("anything", REPO)).await;
        assert!(!result.success);
        let err = result.error.unwrap();
        assert_eq!(err.kind, ErrorKind::SetupFailed);
        assert!(err.message.starts_with("authentication setup failed"));
        assert_eq!(err.cause_kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(page.inserts(PROMPT), 0);
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn unlisted_repository_gets_a_workspace_created_before_submission() {
        const CREATE_PAGE: &str = "https://chatgpt.com/codex/settings/environment/create";
        const CREATE_BUTTON: &str = "button.btn-primary";
        const LIST: &str = ".flex.max-h-56.flex-col.overflow-y-auto";
        const CANDIDATE: &str = "button:has(p.text-token-text-primary):text-is('widget')";
        const CONFIRM: &str = "button:has-text('Create environment')";

        let page = product_page(vec![Effect::Show(
            OUTPUT.into(),
            FakeElement::new().text(long_answer()),
        )]);
        page.add(ROW, FakeElement::new().hidden());
        page.add(
            CREATE_BUTTON,
            FakeElement::new()
                .on_click(Effect::SetUrl(CREATE_PAGE.into()))
                .on_click(Effect::Show(LIST.into(), FakeElement::new()))
                .on_click(Effect::Show(
                    CANDIDATE.into(),
                    FakeElement::new().appears_after(Duration::from_secs(2)),
                )),
        );
        page.add(
            CONFIRM,
            FakeElement::new().on_click(Effect::SetUrl(
                "https://chatgpt.com/codex/settings/environment/env_42".into(),
            )),
        );
        let mut orch = orchestrator(&page, codex());
        orch.open().await.unwrap();

        let result = orch.execute(&PromptTask::new("add tests", REPO)).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(page.clicks(ROW), 0);
        assert_eq!(page.clicks(CANDIDATE), 1);
        assert_eq!(page.clicks(CONFIRM), 1);
        assert_eq!(page.clicks(SUBMIT), 1);

        let session = orch.session().unwrap();
        assert!(session.is_ready());
        assert_eq!(session.workspace_outcome(), Some(WorkspaceOutcome::Created));
        orch.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_are_reported_as_the_setup_cause() {
        let page = product_page(Vec::new());
        page.redirect(LANDING, "https://accounts.google.com/v3/signin/identifier");
        page.add("input[type='email']", FakeElement::new());
        let mut orch = Orchestrator::new(
            FakeLauncher::new(page.clone()),
            codex(),
            EngineSettings::default(),
            Arc::new(EnvCredentials::new(
                "WEBPILOT_TEST_UNSET_EMAIL",
                "WEBPILOT_TEST_UNSET_PASSWORD",
            )),
        );

        let result = orch.run(&PromptTask::new("anything", REPO)).await;
        let err = result.error.unwrap();
        assert_eq!(err.kind, ErrorKind::SetupFailed);
        assert_eq!(err.cause_kind, Some(ErrorKind::MissingCredentials));
        assert_eq!(page.inserts("input[type='email']"), 0);
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_repository_fails_before_touching_the_page() {
        let page = product_page(Vec::new());
        let mut orch = orchestrator(&page, codex());

        let result = orch
            .run(&PromptTask::new("anything", "https://gitlab.com/acme/widget"))
            .await;
        let err = result.error.unwrap();
        assert_eq!(err.kind, ErrorKind::SetupFailed);
        assert!(err.message.contains("gitlab.com"));
        assert_eq!(page.clicks(ROW), 0);
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_task_entry_fails_without_resubmitting() {
        let page = product_page(Vec::new());
        // Submitting never produces a task row.
        page.add(SUBMIT, FakeElement::new());
        let mut orch = orchestrator(&page, codex());

        let result = orch.run(&PromptTask::new("anything", REPO)).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::NotFound);
        assert_eq!(page.clicks(SUBMIT), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_timeout_is_reported() {
        let page = product_page(vec![Effect::Show(STOP.into(), FakeElement::new())]);
        let mut orch = orchestrator(&page, codex());

        let result = orch.run(&PromptTask::new("anything", REPO)).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::CompletionTimeout);
        assert!(result.duration_ms >= 1_200_000);
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn execute_without_open_session_fails() {
        let page = product_page(Vec::new());
        let mut orch = orchestrator(&page, codex());

        let result = orch.execute(&PromptTask::new("anything", REPO)).await;
        assert_eq!(result.error.unwrap().kind, ErrorKind::SessionNotOpen);
        assert!(page.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_yields_setup_failure() {
        let page = FakePage::new("about:blank");
        let mut orch = Orchestrator::new(
            FakeLauncher::failing(page.clone()),
            codex(),
            EngineSettings::default(),
            Arc::new(StaticCredentials(Credentials::new("me@example.com", "pw"))),
        );

        let result = orch.run(&PromptTask::new("anything", REPO)).await;
        let err = result.error.unwrap();
        assert_eq!(err.kind, ErrorKind::SetupFailed);
        assert!(err.message.contains("browser setup failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_landing_page_closes_the_browser() {
        let page = FakePage::new("about:blank");
        page.fail_gotos(10);
        let mut orch = orchestrator(&page, codex());

        let err = orch.open().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Browser);
        assert!(page.is_closed());
        assert_eq!(page.gotos(), 3);
        assert!(orch.session().is_none());
        assert!(page.actions().contains(&Action::Close));
    }
}
