//! Scripted in-memory page used by the engine tests.
//!
//! Elements live on tokio's clock, so tests running with a paused runtime
//! can make them appear, vanish or change text minutes later without
//! actually waiting.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::time::Instant,
    webpilot_browser::{BrowserError, CaptchaKind, ElementState, PageDriver, PageLauncher},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Goto(String),
    WaitForLoad,
    Click(String),
    DispatchClick(String),
    Focus(String),
    Clear(String),
    Insert(String, String),
    Captcha(CaptchaKind),
    Close,
}

/// What happens when an element is clicked.
#[derive(Debug, Clone)]
pub enum Effect {
    SetUrl(String),
    Show(String, FakeElement),
    Remove(String),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    appear_after: Duration,
    vanish_after: Option<Duration>,
    visible: bool,
    enabled: bool,
    texts: Vec<(Duration, String)>,
    value: String,
    intercept: u32,
    broken: bool,
    mangle_fills: u32,
    attributes: Vec<(String, String)>,
    on_click: Vec<Effect>,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            appear_after: Duration::ZERO,
            vanish_after: None,
            visible: true,
            enabled: true,
            texts: Vec::new(),
            value: String::new(),
            intercept: 0,
            broken: false,
            mangle_fills: 0,
            attributes: Vec::new(),
            on_click: Vec::new(),
        }
    }
}

impl FakeElement {
    /// Visible and enabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn appears_after(mut self, after: Duration) -> Self {
        self.appear_after = after;
        self
    }

    pub fn vanishes_after(mut self, after: Duration) -> Self {
        self.vanish_after = Some(after);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.text_after(Duration::ZERO, text)
    }

    /// Text shown from `after` onwards (relative to insertion).
    pub fn text_after(mut self, after: Duration, text: impl Into<String>) -> Self {
        self.texts.push((after, text.into()));
        self.texts.sort_by_key(|(at, _)| *at);
        self
    }

    /// The next `n` native clicks land on an overlay instead.
    pub fn intercepts(mut self, n: u32) -> Self {
        self.intercept = n;
        self
    }

    /// Both native and synthetic clicks always fail.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// The next `n` text insertions lose their last character.
    pub fn mangles_fills(mut self, n: u32) -> Self {
        self.mangle_fills = n;
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }
}

struct Entry {
    element: FakeElement,
    inserted_at: Duration,
}

impl Entry {
    fn attached(&self, now: Duration) -> bool {
        let since = now.saturating_sub(self.inserted_at);
        now >= self.inserted_at + self.element.appear_after
            && self.element.vanish_after.is_none_or(|v| since < v)
    }

    fn text(&self, now: Duration) -> String {
        let since = now.saturating_sub(self.inserted_at);
        self.element
            .texts
            .iter()
            .rev()
            .find(|(at, _)| *at <= since)
            .map(|(_, t)| t.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct State {
    url: String,
    content: String,
    elements: HashMap<String, Entry>,
    actions: Vec<Action>,
    redirects: HashMap<String, String>,
    goto_failures: u32,
    load_errors: bool,
    captcha_errors: bool,
    closed: bool,
}

pub struct FakePage {
    start: Instant,
    state: Mutex<State>,
}

impl FakePage {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            state: Mutex::new(State {
                url: url.to_string(),
                ..Default::default()
            }),
        })
    }

    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn add(&self, selector: &str, element: FakeElement) {
        let inserted_at = self.now();
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), Entry {
                element,
                inserted_at,
            });
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    pub fn set_content(&self, html: &str) {
        self.state.lock().unwrap().content = html.to_string();
    }

    /// `goto(from)` lands on `to`.
    pub fn redirect(&self, from: &str, to: &str) {
        self.state
            .lock()
            .unwrap()
            .redirects
            .insert(from.to_string(), to.to_string());
    }

    pub fn fail_gotos(&self, n: u32) {
        self.state.lock().unwrap().goto_failures = n;
    }

    /// Every `wait_for_load` times out.
    pub fn fail_loads(&self) {
        self.state.lock().unwrap().load_errors = true;
    }

    pub fn load_waits(&self) -> usize {
        self.count(|a| matches!(a, Action::WaitForLoad))
    }

    pub fn fail_captchas(&self) {
        self.state.lock().unwrap().captcha_errors = true;
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn native_clicks(&self, selector: &str) -> usize {
        self.count(|a| matches!(a, Action::Click(s) if s == selector))
    }

    pub fn dispatched_clicks(&self, selector: &str) -> usize {
        self.count(|a| matches!(a, Action::DispatchClick(s) if s == selector))
    }

    /// Native plus synthetic clicks on `selector`.
    pub fn clicks(&self, selector: &str) -> usize {
        self.native_clicks(selector) + self.dispatched_clicks(selector)
    }

    pub fn inserts(&self, selector: &str) -> usize {
        self.count(|a| matches!(a, Action::Insert(s, _) if s == selector))
    }

    pub fn gotos(&self) -> usize {
        self.count(|a| matches!(a, Action::Goto(_)))
    }

    pub fn value(&self, selector: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .elements
            .get(selector)
            .map(|e| e.element.value.clone())
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn close_calls(&self) -> usize {
        self.count(|a| matches!(a, Action::Close))
    }

    fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .actions
            .iter()
            .filter(|a| pred(a))
            .count()
    }

    /// Run `f` on the live element behind `selector`, after recording
    /// `action` and checking the page is still open.
    fn with_live<T>(
        &self,
        selector: &str,
        action: Option<Action>,
        f: impl FnOnce(&mut State, Duration) -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        if let Some(action) = action {
            state.actions.push(action);
        }
        if state.closed {
            return Err(BrowserError::BrowserClosed);
        }
        let live = state
            .elements
            .get(selector)
            .is_some_and(|e| e.attached(now));
        if !live {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        f(&mut state, now)
    }

    fn open(&self) -> Result<MutexGuard<'_, State>, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.closed {
            return Err(BrowserError::BrowserClosed);
        }
        Ok(state)
    }
}

fn entry<'a>(state: &'a mut State, selector: &str) -> &'a mut Entry {
    state.elements.get_mut(selector).unwrap()
}

fn apply(state: &mut State, effects: Vec<Effect>, now: Duration) {
    for effect in effects {
        match effect {
            Effect::SetUrl(url) => state.url = url,
            Effect::Show(selector, element) => {
                state.elements.insert(selector, Entry {
                    element,
                    inserted_at: now,
                });
            },
            Effect::Remove(selector) => {
                state.elements.remove(&selector);
            },
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::Goto(url.to_string()));
        if state.closed {
            return Err(BrowserError::BrowserClosed);
        }
        if state.goto_failures > 0 {
            state.goto_failures -= 1;
            return Err(BrowserError::NavigationFailed("net::ERR_TIMED_OUT".into()));
        }
        state.url = state
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), BrowserError> {
        let mut state = self.open()?;
        state.actions.push(Action::WaitForLoad);
        if state.load_errors {
            return Err(BrowserError::NavigationFailed("load event timed out".into()));
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.open()?.url.clone())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.open()?.content.clone())
    }

    async fn probe(&self, selector: &str) -> Result<ElementState, BrowserError> {
        let now = self.now();
        let state = self.open()?;
        Ok(match state.elements.get(selector) {
            Some(e) if e.attached(now) => ElementState {
                attached: true,
                visible: e.element.visible,
                enabled: e.element.enabled,
            },
            _ => ElementState::DETACHED,
        })
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_live(selector, None, |_, _| Ok(()))
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_live(selector, Some(Action::Click(selector.into())), |state, now| {
            let e = entry(state, selector);
            if e.element.broken {
                return Err(BrowserError::ClickIntercepted(selector.to_string()));
            }
            if e.element.intercept > 0 {
                e.element.intercept -= 1;
                return Err(BrowserError::ClickIntercepted(selector.to_string()));
            }
            let effects = e.element.on_click.clone();
            apply(state, effects, now);
            Ok(())
        })
    }

    async fn dispatch_click(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_live(
            selector,
            Some(Action::DispatchClick(selector.into())),
            |state, now| {
                let e = entry(state, selector);
                if e.element.broken {
                    return Err(BrowserError::JsEvalFailed("click handler threw".into()));
                }
                let effects = e.element.on_click.clone();
                apply(state, effects, now);
                Ok(())
            },
        )
    }

    async fn focus(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_live(selector, Some(Action::Focus(selector.into())), |_, _| Ok(()))
    }

    async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_live(selector, Some(Action::Clear(selector.into())), |state, _| {
            entry(state, selector).element.value.clear();
            Ok(())
        })
    }

    async fn insert_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let action = Action::Insert(selector.into(), text.into());
        self.with_live(selector, Some(action), |state, _| {
            let e = entry(state, selector);
            if e.element.mangle_fills > 0 {
                e.element.mangle_fills -= 1;
                let mut chars = text.chars();
                chars.next_back();
                e.element.value.push_str(chars.as_str());
            } else {
                e.element.value.push_str(text);
            }
            Ok(())
        })
    }

    async fn input_value(&self, selector: &str) -> Result<String, BrowserError> {
        self.with_live(selector, None, |state, _| {
            Ok(entry(state, selector).element.value.clone())
        })
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        match self.with_live(selector, None, |state, now| {
            Ok(entry(state, selector).text(now))
        }) {
            Ok(text) => Ok(vec![text]),
            Err(BrowserError::ElementNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        match self.with_live(selector, None, |state, _| {
            Ok(entry(state, selector)
                .element
                .attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()))
        }) {
            Err(BrowserError::ElementNotFound(_)) => Ok(None),
            other => other,
        }
    }

    async fn solve_captcha(&self, kind: CaptchaKind) -> Result<bool, BrowserError> {
        let mut state = self.open()?;
        state.actions.push(Action::Captcha(kind));
        if state.captcha_errors {
            return Err(BrowserError::CaptchaUnsolved(kind.to_string()));
        }
        Ok(false)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::Close);
        state.closed = true;
        Ok(())
    }
}

/// Hands out the same [`FakePage`] on every launch.
pub struct FakeLauncher {
    page: Arc<FakePage>,
    fail: bool,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(page: Arc<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            fail: false,
            launches: AtomicUsize::new(0),
        })
    }

    pub fn failing(page: Arc<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            fail: true,
            launches: AtomicUsize::new(0),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn PageDriver>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BrowserError::LaunchFailed("chrome exited with status 1".into()));
        }
        Ok(self.page.clone())
    }
}
