//! Retrying element discovery, click, fill and navigation.
//!
//! Every mutating operation separates presence from actionability: an
//! element that exists but is hidden or disabled fails the current attempt
//! and is retried, up to the policy's attempt budget.

use std::{future::Future, sync::Arc, time::Duration};

use {
    tokio::time::{Instant, sleep},
    tracing::{debug, info, warn},
    webpilot_browser::{ElementState, PageDriver},
};

use crate::{
    error::EngineError,
    types::{EngineSettings, RetryPolicy, SelectorSpec},
};

/// State an element must reach for [`Interactor::find`] to return it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Attached to the DOM.
    Present,
    Visible,
    /// Visible and enabled.
    Actionable,
    /// Detached, or attached but not visible.
    Hidden,
}

impl Condition {
    fn is_met(self, state: &ElementState) -> bool {
        match self {
            Self::Present => state.attached,
            Self::Visible => state.attached && state.visible,
            Self::Actionable => state.is_actionable(),
            Self::Hidden => !(state.attached && state.visible),
        }
    }
}

/// Stand-in for an unbounded wait, roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, clamped so absurdly long timeouts mean "no deadline"
/// instead of overflowing the clock.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    deadline_from(Instant::now(), timeout)
}

pub(crate) fn deadline_from(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

#[derive(Clone)]
pub struct Interactor {
    page: Arc<dyn PageDriver>,
    policy: RetryPolicy,
    settle_delay: Duration,
    poll_interval: Duration,
}

impl Interactor {
    pub fn new(page: Arc<dyn PageDriver>, settings: &EngineSettings) -> Self {
        Self {
            page,
            policy: settings.policy,
            settle_delay: settings.settle_delay,
            poll_interval: settings.poll_interval,
        }
    }

    pub fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait up to `timeout` for the first selector whose element reaches
    /// `condition`, and return that selector.
    ///
    /// The page is probed at least once even with a zero timeout.
    pub async fn find(
        &self,
        selectors: &SelectorSpec,
        condition: Condition,
        timeout: Duration,
    ) -> Result<String, EngineError> {
        let deadline = deadline_after(timeout);
        let mut present: Option<String> = None;
        loop {
            for selector in selectors.iter() {
                let state = match self.page.probe(selector).await {
                    Ok(state) => state,
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        debug!(selector, error = %e, "probe failed");
                        continue;
                    },
                };
                if condition.is_met(&state) {
                    return Ok(selector.to_string());
                }
                if state.attached && present.is_none() {
                    present = Some(selector.to_string());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }

        match present {
            Some(selector) if condition == Condition::Actionable => {
                Err(EngineError::NotActionable { selector })
            },
            _ => Err(EngineError::NotFound {
                selectors: selectors.to_string(),
            }),
        }
    }

    /// Wait for the page's load event. Best effort: only a closed browser
    /// is reported.
    pub async fn settle_load(&self) -> Result<(), EngineError> {
        match self.page.wait_for_load().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                debug!(error = %e, "page did not finish loading, continuing");
                Ok(())
            },
        }
    }

    /// Non-waiting presence check over every selector.
    pub async fn any_present(&self, selectors: &SelectorSpec) -> Result<bool, EngineError> {
        match self.find(selectors, Condition::Present, Duration::ZERO).await {
            Ok(_) => Ok(true),
            Err(EngineError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run `op` up to `max_attempts` times, pausing `retry_delay` between
    /// failures. Fatal browser errors end the loop at once.
    async fn retry<T, F, Fut>(
        &self,
        action: &'static str,
        target: &str,
        mut op: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(action, target, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                },
                Err(e) => e,
            };
            if err.is_fatal() {
                return Err(err);
            }
            warn!(
                action,
                target,
                attempt,
                max_attempts = attempts,
                error = %err,
                "attempt failed"
            );
            if attempt >= attempts {
                return Err(EngineError::RetriesExhausted {
                    action,
                    target: target.to_string(),
                    attempts,
                    last: Box::new(err),
                });
            }
            attempt += 1;
            sleep(self.policy.retry_delay).await;
        }
    }

    /// Click the first actionable match, retrying per the policy.
    pub async fn click(&self, selectors: &SelectorSpec) -> Result<(), EngineError> {
        self.click_within(selectors, self.policy.action_timeout)
            .await
    }

    /// [`Self::click`] with a custom per-attempt wait for the element.
    pub async fn click_within(
        &self,
        selectors: &SelectorSpec,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let target = selectors.to_string();
        self.retry("click", &target, || self.click_once(selectors, timeout))
            .await
    }

    async fn click_once(
        &self,
        selectors: &SelectorSpec,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let selector = self.find(selectors, Condition::Actionable, timeout).await?;
        self.page.scroll_into_view(&selector).await?;
        sleep(self.settle_delay).await;

        // Re-check after the settle pause; re-renders are common here.
        if !self.page.probe(&selector).await?.is_actionable() {
            return Err(EngineError::NotActionable { selector });
        }

        match self.page.click(&selector).await {
            Ok(()) => {
                debug!(selector, "clicked");
                Ok(())
            },
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                debug!(selector, error = %e, "native click failed, dispatching synthetic click");
                self.page.dispatch_click(&selector).await?;
                Ok(())
            },
        }
    }

    /// Replace the content of the first actionable input and verify it by
    /// reading it back.
    pub async fn fill(&self, selectors: &SelectorSpec, text: &str) -> Result<(), EngineError> {
        let target = selectors.to_string();
        self.retry("fill", &target, || self.fill_once(selectors, text))
            .await
    }

    async fn fill_once(&self, selectors: &SelectorSpec, text: &str) -> Result<(), EngineError> {
        let selector = self
            .find(selectors, Condition::Actionable, self.policy.action_timeout)
            .await?;
        self.page.scroll_into_view(&selector).await?;
        self.page.focus(&selector).await?;
        self.page.clear(&selector).await?;
        self.page.insert_text(&selector, text).await?;

        let actual = self.page.input_value(&selector).await?;
        if actual != text {
            return Err(EngineError::VerificationMismatch {
                selector,
                expected: text.chars().count(),
                actual: actual.chars().count(),
            });
        }
        debug!(selector, chars = text.chars().count(), "filled");
        Ok(())
    }

    /// Try whole selector strategies for the same field in order until one
    /// fill succeeds. Strategies with nothing on the page are skipped once
    /// any strategy's element has shown up.
    pub async fn fill_first_matching(
        &self,
        strategies: &[SelectorSpec],
        text: &str,
        description: &str,
    ) -> Result<(), EngineError> {
        self.first_matching(strategies, description, |spec| self.fill(spec, text))
            .await
    }

    /// Click counterpart of [`Self::fill_first_matching`].
    pub async fn click_first_matching(
        &self,
        strategies: &[SelectorSpec],
        description: &str,
    ) -> Result<(), EngineError> {
        self.first_matching(strategies, description, |spec| self.click(spec))
            .await
    }

    async fn first_matching<'s, F, Fut>(
        &self,
        strategies: &'s [SelectorSpec],
        description: &str,
        mut op: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&'s SelectorSpec) -> Fut,
        Fut: Future<Output = Result<(), EngineError>>,
    {
        let Some(all) = SelectorSpec::union(strategies) else {
            return Err(EngineError::NotFound {
                selectors: description.to_string(),
            });
        };
        self.find(&all, Condition::Present, self.policy.action_timeout)
            .await?;

        let mut last = None;
        for (index, spec) in strategies.iter().enumerate() {
            if !self.any_present(spec).await? {
                debug!(description, strategy = index, "strategy absent, skipping");
                continue;
            }
            match op(spec).await {
                Ok(()) => {
                    info!(description, strategy = index, "matched");
                    return Ok(());
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(description, strategy = index, error = %e, "strategy failed");
                    last = Some(e);
                },
            }
        }
        Err(last.unwrap_or(EngineError::NotFound {
            selectors: description.to_string(),
        }))
    }

    /// Navigate, retrying per the policy.
    pub async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.retry("navigate", url, || async {
            self.page.goto(url).await.map_err(EngineError::from)
        })
        .await?;
        info!(url, "navigated");
        Ok(())
    }

    /// Best-effort text of the last non-empty match of the first selector
    /// that has one.
    pub async fn last_text(&self, selectors: &SelectorSpec) -> Result<Option<String>, EngineError> {
        for selector in selectors.iter() {
            let texts = match self.page.inner_texts(selector).await {
                Ok(texts) => texts,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    debug!(selector, error = %e, "text read failed");
                    continue;
                },
            };
            if let Some(text) = texts
                .iter()
                .rev()
                .map(|t| t.trim())
                .find(|t| !t.is_empty())
            {
                return Ok(Some(text.to_string()));
            }
        }
        Ok(None)
    }
}
