//! [`PageDriver`] over a chromiumoxide page.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::input::{
            DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
            DispatchMouseEventType, InsertTextParams, MouseButton,
        },
        handler::viewport::Viewport,
    },
    futures::StreamExt,
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::Value,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    detect::detect_browser,
    driver::{CaptchaKind, ElementState, PageDriver, PageLauncher},
    error::BrowserError,
    scripts,
    types::BrowserConfig,
};

/// Time allowed for the CDP event loop to drain after the browser exits.
const HANDLER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ClickPoint {
    x: f64,
    y: f64,
    hit: bool,
}

/// One page in a browser this process launched and owns.
pub struct CdpPage {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl CdpPage {
    async fn eval<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &[Value],
    ) -> Result<T, BrowserError> {
        let js = scripts::invoke(function, args);
        let result = self.page.evaluate(js.as_str()).await?;
        // `null` results carry no value at all.
        let value = result.value().cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| BrowserError::JsEvalFailed(e.to_string()))
    }

    async fn eval_found(&self, function: &str, selector: &str) -> Result<(), BrowserError> {
        let found: bool = self.eval(function, &[scripts::target(selector)]).await?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }

    async fn mouse(&self, kind: DispatchMouseEventType, x: f64, y: f64) -> Result<(), BrowserError> {
        let cmd = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(cmd).await?;
        Ok(())
    }

    async fn key(&self, kind: DispatchKeyEventType, key: &str, code: i64) -> Result<(), BrowserError> {
        let cmd = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key)
            .code(key)
            .windows_virtual_key_code(code)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(cmd).await?;
        Ok(())
    }
}

fn navigation_error(err: impl Into<BrowserError>) -> BrowserError {
    let err = err.into();
    if err.is_fatal() {
        err
    } else {
        BrowserError::NavigationFailed(err.to_string())
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(navigation_error)?;
        if let Err(e) = self.page.wait_for_navigation().await {
            debug!(url, error = %e, "waiting for navigation failed");
        }
        debug!(url, "navigated");
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), BrowserError> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(navigation_error)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.page.content().await?)
    }

    async fn probe(&self, selector: &str) -> Result<ElementState, BrowserError> {
        self.eval(scripts::PROBE_JS, &[scripts::target(selector)]).await
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        self.eval_found(scripts::SCROLL_INTO_VIEW_JS, selector)
            .await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.scroll_into_view(selector).await?;
        let point: Option<ClickPoint> = self
            .eval(scripts::CLICK_POINT_JS, &[scripts::target(selector)])
            .await?;
        let Some(point) = point else {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        };
        if !point.hit {
            return Err(BrowserError::ClickIntercepted(selector.to_string()));
        }

        self.mouse(DispatchMouseEventType::MousePressed, point.x, point.y)
            .await?;
        self.mouse(DispatchMouseEventType::MouseReleased, point.x, point.y)
            .await?;
        debug!(selector, x = point.x, y = point.y, "clicked element");
        Ok(())
    }

    async fn dispatch_click(&self, selector: &str) -> Result<(), BrowserError> {
        self.eval_found(scripts::DISPATCH_CLICK_JS, selector).await?;
        debug!(selector, "dispatched synthetic click");
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<(), BrowserError> {
        self.eval_found(scripts::FOCUS_JS, selector).await
    }

    async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
        self.eval_found(scripts::SELECT_ALL_JS, selector).await?;
        self.key(DispatchKeyEventType::KeyDown, "Delete", 46).await?;
        self.key(DispatchKeyEventType::KeyUp, "Delete", 46).await
    }

    async fn insert_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.focus(selector).await?;
        self.page.execute(InsertTextParams::new(text)).await?;
        debug!(selector, chars = text.chars().count(), "inserted text");
        Ok(())
    }

    async fn input_value(&self, selector: &str) -> Result<String, BrowserError> {
        let value: Option<String> = self
            .eval(scripts::INPUT_VALUE_JS, &[scripts::target(selector)])
            .await?;
        value.ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        self.eval(scripts::INNER_TEXTS_JS, &[scripts::target(selector)])
            .await
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.eval(scripts::ATTRIBUTE_JS, &[
            scripts::target(selector),
            Value::from(name),
        ])
        .await
    }

    async fn solve_captcha(&self, kind: CaptchaKind) -> Result<bool, BrowserError> {
        if self.probe(scripts::captcha_marker(kind)).await?.attached {
            warn!(%kind, "captcha present but no solver is available");
        }
        Ok(false)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = self.page.clone().close().await {
            debug!(error = %e, "page close failed, closing browser anyway");
        }
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "waiting for browser exit failed");
        }
        if let Some(handle) = self.handler.lock().await.take()
            && tokio::time::timeout(HANDLER_DRAIN_TIMEOUT, handle).await.is_err()
        {
            warn!("browser event handler did not exit in time");
        }
        closed?;
        info!("browser closed");
        Ok(())
    }
}

/// Launches a local Chrome/Chromium per session.
pub struct CdpLauncher {
    config: BrowserConfig,
}

impl CdpLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageLauncher for CdpLauncher {
    async fn launch(&self) -> Result<Arc<dyn PageDriver>, BrowserError> {
        let detection = detect_browser(self.config.chrome_path.as_deref());
        let Some(executable) = detection.path else {
            return Err(BrowserError::LaunchFailed(format!(
                "Chrome/Chromium not found. {}",
                detection.install_hint
            )));
        };

        let mut builder = CdpBrowserConfig::builder();
        // chromiumoxide is headless unless asked for a window.
        if !self.config.headless {
            builder = builder.with_head();
        }

        info!(
            path = %executable.display(),
            headless = self.config.headless,
            viewport_width = self.config.viewport_width,
            viewport_height = self.config.viewport_height,
            "launching browser"
        );

        builder = builder
            .chrome_executable(executable)
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .request_timeout(Duration::from_millis(self.config.navigation_timeout_ms));
        for arg in self.config.launch_args() {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(|e| {
            BrowserError::LaunchFailed(format!("failed to build browser config: {e}"))
        })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event error");
                }
            }
            debug!("browser event handler exited");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handle.abort();
                return Err(BrowserError::LaunchFailed(format!("failed to open page: {e}")));
            },
        };

        Ok(Arc::new(CdpPage {
            page,
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handle)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_errors_keep_fatal_classification() {
        let fatal = navigation_error(BrowserError::Cdp("send: AlreadyClosed".into()));
        assert!(fatal.is_fatal());

        let plain = navigation_error(BrowserError::Cdp("net::ERR_NAME_NOT_RESOLVED".into()));
        assert!(matches!(plain, BrowserError::NavigationFailed(_)));
    }

    #[test]
    fn click_point_parses_probe_payload() {
        let point: ClickPoint =
            serde_json::from_str(r#"{"x":10.5,"y":20,"hit":false}"#).unwrap_or(ClickPoint {
                x: 0.0,
                y: 0.0,
                hit: true,
            });
        assert!(!point.hit);
        assert!((point.x - 10.5).abs() < f64::EPSILON);
    }
}
