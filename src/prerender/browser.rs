//! Headless browser rendering.
//!
//! The [`SnapshotRenderer`] trait is the one operation the worker needs from a
//! browser: given a URL, return the settled page markup. The production
//! implementation is [`ChromeRenderer`], which drives a single headless
//! Chrome instance through a fresh tab per route:
//!
//! 1. open a tab
//! 2. register a script that runs before any page script: it seeds the
//!    consent timestamp in `localStorage` and starts listening for the
//!    readiness event
//! 3. navigate and wait for the document to load
//! 4. wait (bounded) for the readiness event
//! 5. capture `document.documentElement.outerHTML`
//! 6. close the tab, whatever happened above

use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Extra time the CDP calls get on top of the readiness wait.
const CALL_GRACE: Duration = Duration::from_secs(20);

/// Global flag set by the seed script once the readiness event fired.
const READY_FLAG: &str = "__catalogPrerenderReady";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Browser tab error: {0}")]
    Tab(String),
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("Timed out after {}s waiting for `{event}`", .timeout.as_secs())]
    NotReady { event: String, timeout: Duration },
    #[error("Failed to capture page content: {0}")]
    Capture(String),
}

/// How a page signals it is ready to be captured.
#[derive(Debug, Clone)]
pub struct Readiness {
    /// DOM event dispatched on `document` by the app.
    pub event: String,
    pub timeout: Duration,
    /// `localStorage` key seeded with the current ISO timestamp.
    pub consent_key: String,
}

/// Something that can turn a URL into settled HTML.
pub trait SnapshotRenderer {
    fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// One headless Chrome instance shared by every route of a worker.
///
/// Dropping it closes the browser.
pub struct ChromeRenderer {
    browser: Browser,
    readiness: Readiness,
}

impl ChromeRenderer {
    pub fn launch(readiness: Readiness, window_size: (u32, u32)) -> Result<Self, RenderError> {
        let browser = Browser::new(LaunchOptions {
            headless: true,
            sandbox: false,
            window_size: Some(window_size),
            idle_browser_timeout: readiness.timeout * 3 + CALL_GRACE,
            ..Default::default()
        })
        .map_err(|e| RenderError::Launch(e.to_string()))?;
        Ok(Self { browser, readiness })
    }

    fn capture(&self, tab: &Tab, url: &str) -> Result<String, RenderError> {
        tab.set_default_timeout(self.readiness.timeout + CALL_GRACE);

        // Built through serde so optional protocol fields stay at their defaults.
        let seed: Page::AddScriptToEvaluateOnNewDocument =
            serde_json::from_value(json!({ "source": seed_script(&self.readiness) }))
                .map_err(|e| RenderError::Tab(e.to_string()))?;
        tab.call_method(seed)
            .map_err(|e| RenderError::Tab(e.to_string()))?;

        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let outcome = tab
            .evaluate(&readiness_script(&self.readiness), true)
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if outcome.value.as_ref().and_then(|v| v.as_str()) != Some("ready") {
            return Err(RenderError::NotReady {
                event: self.readiness.event.clone(),
                timeout: self.readiness.timeout,
            });
        }

        tab.get_content()
            .map_err(|e| RenderError::Capture(e.to_string()))
    }
}

impl SnapshotRenderer for ChromeRenderer {
    fn render(&self, url: &str) -> Result<String, RenderError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| RenderError::Tab(e.to_string()))?;
        let result = self.capture(&tab, url);
        if let Err(e) = tab.close(true) {
            debug!(%url, error = %e, "failed to close tab");
        }
        result
    }
}

/// Script registered to run before any page script on every navigation.
pub fn seed_script(readiness: &Readiness) -> String {
    format!(
        r#"(() => {{
  try {{ localStorage.setItem({key}, new Date().toISOString()); }} catch (e) {{}}
  window.{flag} = false;
  document.addEventListener({event}, () => {{ window.{flag} = true; }}, {{ once: true }});
}})();"#,
        key = json!(readiness.consent_key),
        event = json!(readiness.event),
        flag = READY_FLAG,
    )
}

/// Promise resolving to `"ready"` once the readiness event has fired, or to
/// `"timeout"` when the bounded wait runs out.
pub fn readiness_script(readiness: &Readiness) -> String {
    format!(
        r#"new Promise((resolve) => {{
  if (window.{flag}) {{ resolve("ready"); return; }}
  const timer = setTimeout(() => resolve("timeout"), {ms});
  document.addEventListener({event}, () => {{ clearTimeout(timer); resolve("ready"); }}, {{ once: true }});
}})"#,
        flag = READY_FLAG,
        ms = readiness.timeout.as_millis(),
        event = json!(readiness.event),
    )
}
