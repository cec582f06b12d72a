//! Multi-hop login: product login page, identity intermediary, provider
//! credential entry, redirect back.
//!
//! The phase is classified from the page once per step and the matching
//! step runs; nothing is guessed. A step that cannot find its control ends
//! the flow with `AuthenticationFailed`.

use std::{sync::Arc, time::Duration};

use {
    serde::Serialize,
    tokio::time::{Instant, sleep},
    tracing::{debug, info, warn},
    webpilot_browser::CaptchaKind,
};

use crate::{
    credentials::CredentialSource,
    error::EngineError,
    interactor::{Interactor, deadline_after},
    profile::AuthProfile,
    types::SelectorSpec,
};

/// Upper bound on classify-and-act steps for one login.
const MAX_STEPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Unauthenticated,
    NativeLogin,
    IdentityProvider,
    CredentialEntry,
    Authenticated,
}

/// Classify from the URL, falling back to login-page texts in `content`.
pub fn classify(url: &str, content: Option<&str>, profile: &AuthProfile) -> AuthPhase {
    if url.contains(&profile.authenticated_url) {
        AuthPhase::Authenticated
    } else if url.contains(&profile.provider.origin) {
        AuthPhase::CredentialEntry
    } else if url.contains(&profile.identity_origin) {
        AuthPhase::IdentityProvider
    } else if url.contains(&profile.login_url) || shows_login_texts(content, profile) {
        AuthPhase::NativeLogin
    } else {
        AuthPhase::Unauthenticated
    }
}

fn shows_login_texts(content: Option<&str>, profile: &AuthProfile) -> bool {
    match content {
        Some(html) if !profile.login_page_texts.is_empty() => profile
            .login_page_texts
            .iter()
            .all(|text| html.contains(text.as_str())),
        _ => false,
    }
}

pub struct Authenticator<'a> {
    interactor: &'a Interactor,
    profile: &'a AuthProfile,
    credentials: Arc<dyn CredentialSource>,
    login_ceiling: Duration,
    login_poll_interval: Duration,
}

impl<'a> Authenticator<'a> {
    pub fn new(
        interactor: &'a Interactor,
        profile: &'a AuthProfile,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            interactor,
            profile,
            credentials,
            login_ceiling: Duration::from_secs(300),
            login_poll_interval: Duration::from_secs(5),
        }
    }

    /// Bound and cadence of the wait for the provider to redirect back.
    pub fn with_login_wait(mut self, ceiling: Duration, poll_interval: Duration) -> Self {
        self.login_ceiling = ceiling;
        self.login_poll_interval = poll_interval;
        self
    }

    async fn current_phase(&self) -> Result<(AuthPhase, String), EngineError> {
        let page = self.interactor.page();
        let url = page.current_url().await?;
        let phase = match classify(&url, None, self.profile) {
            AuthPhase::Unauthenticated if !self.profile.login_page_texts.is_empty() => {
                let content = page.content().await?;
                classify(&url, Some(&content), self.profile)
            },
            phase => phase,
        };
        Ok((phase, url))
    }

    /// Drive the login flow until the authenticated surface is reached.
    pub async fn ensure_authenticated(&self) -> Result<(), EngineError> {
        let mut steps = 0;
        let mut unknown_since: Option<Instant> = None;

        loop {
            let (phase, url) = self.current_phase().await?;
            debug!(steps, ?phase, url, "authentication phase");

            match phase {
                AuthPhase::Authenticated => {
                    info!("authenticated");
                    return Ok(());
                },
                AuthPhase::NativeLogin => {
                    self.solve_captchas().await;
                    self.step(phase, "login entry point", &self.profile.login_button)
                        .await?;
                },
                AuthPhase::IdentityProvider => {
                    self.step(phase, "continue with provider", &self.profile.continue_button)
                        .await?;
                },
                AuthPhase::CredentialEntry => self.enter_credentials().await?,
                AuthPhase::Unauthenticated => {
                    // Redirects may still be in flight; give the page a while.
                    let since = *unknown_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.interactor.policy().action_timeout {
                        return Err(EngineError::AuthenticationFailed(format!(
                            "unrecognised page {url}"
                        )));
                    }
                    sleep(self.login_poll_interval).await;
                    continue;
                },
            }

            unknown_since = None;
            steps += 1;
            if steps >= MAX_STEPS {
                return Err(EngineError::AuthenticationFailed(format!(
                    "login did not settle after {MAX_STEPS} steps"
                )));
            }
        }
    }

    /// Click `control` and wait for the page to leave `phase`.
    async fn step(
        &self,
        phase: AuthPhase,
        what: &str,
        control: &SelectorSpec,
    ) -> Result<(), EngineError> {
        info!(?phase, what, "authentication step");
        self.interactor
            .click(control)
            .await
            .map_err(|e| fail(what, e))?;
        self.await_phase_change(phase, what).await
    }

    async fn await_phase_change(&self, from: AuthPhase, what: &str) -> Result<(), EngineError> {
        let timeout = self.interactor.policy().action_timeout;
        let deadline = deadline_after(timeout);
        loop {
            let (phase, url) = self.current_phase().await?;
            if phase != from {
                debug!(?from, to = ?phase, url, "phase changed");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::AuthenticationFailed(format!(
                    "{what} did not leave {from:?} within {}s",
                    timeout.as_secs()
                )));
            }
            sleep(self.interactor.poll_interval().min(deadline - now)).await;
        }
    }

    async fn enter_credentials(&self) -> Result<(), EngineError> {
        let creds = self.credentials.credentials()?;
        let provider = &self.profile.provider;
        self.interactor.settle_load().await?;
        self.solve_captchas().await;

        // A remembered account skips straight to the password page.
        match self
            .interactor
            .fill_first_matching(&provider.email_inputs, &creds.email, "email")
            .await
        {
            Ok(()) => {
                self.interactor
                    .click_first_matching(&provider.email_next, "email next")
                    .await
                    .map_err(|e| fail("email next", e))?;
                self.solve_captchas().await;
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(error = %e, "email step failed, trying the password step"),
        }

        self.interactor
            .fill_first_matching(&provider.password_inputs, creds.password(), "password")
            .await
            .map_err(|e| fail("password", e))?;
        self.interactor
            .click_first_matching(&provider.password_next, "password next")
            .await
            .map_err(|e| fail("password next", e))?;
        info!("credentials submitted, waiting for redirect");

        self.await_redirect_back().await
    }

    async fn await_redirect_back(&self) -> Result<(), EngineError> {
        let deadline = deadline_after(self.login_ceiling);
        loop {
            let url = self.interactor.page().current_url().await?;
            if !url.contains(&self.profile.provider.origin) {
                info!(url, "identity provider redirected back");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::AuthenticationFailed(format!(
                    "still on {} after {}s",
                    self.profile.provider.origin,
                    self.login_ceiling.as_secs()
                )));
            }
            debug!(url, "waiting for login to complete");
            sleep(self.login_poll_interval.min(deadline - now)).await;
        }
    }

    /// Best effort: errors and unsolved captchas are only logged.
    async fn solve_captchas(&self) {
        for kind in CaptchaKind::ALL {
            match self.interactor.page().solve_captcha(kind).await {
                Ok(true) => {
                    info!(%kind, "captcha solved");
                    return;
                },
                Ok(false) => {},
                Err(e) => debug!(%kind, error = %e, "captcha solving failed"),
            }
        }
    }
}

fn fail(what: &str, err: EngineError) -> EngineError {
    if err.is_fatal() {
        return err;
    }
    EngineError::AuthenticationFailed(format!("{what}: {err}"))
}
