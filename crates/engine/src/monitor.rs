//! Detecting the end of a remote job that emits no completion event.
//!
//! Two heuristics are supported. An indicator-based monitor waits for a busy
//! control (typically a stop button) to show up and then to go away. A
//! content-stability monitor polls the output region and declares completion
//! once it has been unchanged for a quiet period and is long enough.
//!
//! Phases: `Idle -> BusyDetected -> Busy -> Quiescent -> Done`, with
//! `Idle -> Done` as the fast path when nothing ever looked busy. `Done` and
//! `TimedOut` are terminal.

use std::time::Duration;

use {
    serde::Serialize,
    tokio::time::{Instant, sleep},
    tracing::{debug, info, warn},
};

use crate::{
    error::EngineError,
    interactor::{Condition, Interactor, deadline_from},
    types::{CompletionCriterion, SelectorSpec},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    BusyDetected,
    Busy,
    Quiescent,
    Done,
    TimedOut,
}

impl MonitorPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::TimedOut)
    }
}

/// How a monitored job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Every phase entered, in order, starting with `Idle`.
    pub trace: Vec<MonitorPhase>,
    pub elapsed: Duration,
}

impl Completion {
    /// Nothing ever looked busy.
    pub fn was_immediate(&self) -> bool {
        self.trace == [MonitorPhase::Idle, MonitorPhase::Done]
    }
}

struct PhaseTracker {
    trace: Vec<MonitorPhase>,
    started: Instant,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            trace: vec![MonitorPhase::Idle],
            started: Instant::now(),
        }
    }

    fn current(&self) -> MonitorPhase {
        self.trace
            .last()
            .copied()
            .unwrap_or(MonitorPhase::Idle)
    }

    fn enter(&mut self, phase: MonitorPhase) {
        let from = self.current();
        if from == phase || from.is_terminal() {
            return;
        }
        debug!(?from, to = ?phase, elapsed_ms = self.elapsed().as_millis() as u64, "completion phase");
        self.trace.push(phase);
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn finish(mut self) -> Completion {
        self.enter(MonitorPhase::Done);
        Completion {
            elapsed: self.elapsed(),
            trace: self.trace,
        }
    }

    fn time_out(mut self, ceiling: Duration) -> EngineError {
        self.enter(MonitorPhase::TimedOut);
        warn!(
            ceiling_secs = ceiling.as_secs(),
            trace = ?self.trace,
            "completion not detected before the ceiling"
        );
        EngineError::CompletionTimeout(ceiling)
    }
}

pub struct CompletionMonitor<'a> {
    interactor: &'a Interactor,
    ceiling: Duration,
}

impl<'a> CompletionMonitor<'a> {
    /// `ceiling` bounds the whole wait, including the indicator's appear
    /// window.
    pub fn new(interactor: &'a Interactor, ceiling: Duration) -> Self {
        Self {
            interactor,
            ceiling,
        }
    }

    pub async fn wait(&self, criterion: &CompletionCriterion) -> Result<Completion, EngineError> {
        match criterion {
            CompletionCriterion::IndicatorBased {
                indicator,
                appear_timeout,
            } => self.wait_indicator(indicator, *appear_timeout).await,
            CompletionCriterion::ContentStability {
                output,
                quiet_period,
                min_length,
                check_interval,
            } => {
                self.wait_stable(output, *quiet_period, *min_length, *check_interval)
                    .await
            },
        }
    }

    async fn wait_indicator(
        &self,
        indicator: &SelectorSpec,
        appear_timeout: Duration,
    ) -> Result<Completion, EngineError> {
        let mut tracker = PhaseTracker::new();

        let appear = appear_timeout.min(self.ceiling);
        let selector = match self
            .interactor
            .find(indicator, Condition::Visible, appear)
            .await
        {
            Ok(selector) => selector,
            Err(EngineError::NotFound { .. }) => {
                info!(
                    indicator = %indicator,
                    "busy indicator never appeared, treating the task as completed immediately"
                );
                return Ok(tracker.finish());
            },
            Err(e) => return Err(e),
        };
        tracker.enter(MonitorPhase::BusyDetected);
        info!(selector, "busy indicator detected, waiting for it to disappear");

        tracker.enter(MonitorPhase::Busy);
        let remaining = self.ceiling.saturating_sub(tracker.elapsed());
        match self
            .interactor
            .find(&SelectorSpec::single(&selector), Condition::Hidden, remaining)
            .await
        {
            Ok(_) => {
                tracker.enter(MonitorPhase::Quiescent);
                let done = tracker.finish();
                info!(elapsed_secs = done.elapsed.as_secs(), "busy indicator gone, task completed");
                Ok(done)
            },
            Err(EngineError::NotFound { .. }) => Err(tracker.time_out(self.ceiling)),
            Err(e) => Err(e),
        }
    }

    async fn wait_stable(
        &self,
        output: &SelectorSpec,
        quiet_period: Duration,
        min_length: usize,
        check_interval: Duration,
    ) -> Result<Completion, EngineError> {
        let mut tracker = PhaseTracker::new();
        let deadline = deadline_from(tracker.started, self.ceiling);
        let mut last = String::new();
        let mut last_change = tracker.started;

        loop {
            let text = match self.interactor.last_text(output).await {
                Ok(text) => text.unwrap_or_default(),
                Err(e) if e.is_fatal() => return Err(e),
                // An unreadable region counts as unchanged.
                Err(e) => {
                    debug!(error = %e, "output read failed");
                    last.clone()
                },
            };

            let now = Instant::now();
            if text != last {
                last_change = now;
                last = text;
                if tracker.current() == MonitorPhase::Idle {
                    tracker.enter(MonitorPhase::BusyDetected);
                } else {
                    tracker.enter(MonitorPhase::Busy);
                }
                debug!(chars = last.chars().count(), "output changed");
            } else if !last.is_empty() {
                tracker.enter(MonitorPhase::Quiescent);
            }

            let length = last.chars().count();
            let quiet_for = now - last_change;
            if quiet_for >= quiet_period && length >= min_length {
                let done = tracker.finish();
                info!(
                    chars = length,
                    quiet_secs = quiet_for.as_secs(),
                    elapsed_secs = done.elapsed.as_secs(),
                    "output stable, task completed"
                );
                return Ok(done);
            }
            if now >= deadline {
                return Err(tracker.time_out(self.ceiling));
            }
            sleep(check_interval.min(deadline - now)).await;
        }
    }
}
