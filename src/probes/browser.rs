//! Browser-automation probes. Every probe here degrades to Skipped when the
//! orchestrator could not provide a session.

use super::{http, round2, Probe, ProbeOutcome};
use crate::driver::{self, BrowserSession, DriverError};
use crate::environment::Environment;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

const NO_BROWSER_REASON: &str = "browser driver unavailable";
const READY_STATE_BOUND: Duration = Duration::from_secs(15);
const READY_STATE_POLL: Duration = Duration::from_millis(200);
const ELEMENT_WAIT_BOUND: Duration = Duration::from_secs(10);

fn require_session<'a>(
    name: &str,
    browser: Option<&'a BrowserSession>,
) -> Result<&'a BrowserSession, ProbeOutcome> {
    browser.ok_or_else(|| ProbeOutcome::skipped(name, NO_BROWSER_REASON))
}

fn driver_failure(name: &str, e: DriverError) -> ProbeOutcome {
    warn!(probe = name, error = %e, "browser probe failed");
    ProbeOutcome::error(name, e.to_string(), Map::new())
}

/// Drive a Google search end to end: type the query, submit, count result
/// headings.
pub struct SearchProbe {
    term: String,
}

impl Default for SearchProbe {
    fn default() -> Self {
        Self {
            term: "Termux Selenium Test".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Probe for SearchProbe {
    fn name(&self) -> &str {
        "google_search"
    }

    fn needs_browser(&self) -> bool {
        true
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome {
        let session = match require_session(self.name(), browser) {
            Ok(s) => s,
            Err(skip) => return skip,
        };
        match self.exercise(session).await {
            Ok(payload) => ProbeOutcome::success(self.name(), payload),
            Err(e) => driver_failure(self.name(), e),
        }
    }
}

impl SearchProbe {
    async fn exercise(
        &self,
        session: &BrowserSession,
    ) -> Result<Map<String, Value>, DriverError> {
        session.navigate("https://www.google.com").await?;
        let search_box = session.find_element("[name='q']").await?;
        session.send_keys(&search_box, &self.term).await?;
        session.submit(&search_box).await?;

        wait_for_element(session, "#search", ELEMENT_WAIT_BOUND).await?;
        let results = session.find_elements("h3").await?;
        let title = session.title().await?;
        let url = session.current_url().await?;

        let mut payload = Map::new();
        payload.insert("search_term".into(), json!(self.term));
        payload.insert("results_found".into(), json!(results.len()));
        payload.insert("page_title".into(), json!(title));
        payload.insert("url".into(), json!(url));
        Ok(payload)
    }
}

/// Poll until the selector matches something, bounded.
async fn wait_for_element(
    session: &BrowserSession,
    selector: &str,
    bound: Duration,
) -> Result<(), DriverError> {
    let wait = async {
        loop {
            if session.find_element(selector).await.is_ok() {
                return;
            }
            tokio::time::sleep(READY_STATE_POLL).await;
        }
    };
    tokio::time::timeout(bound, wait).await.map_err(|_| {
        DriverError::Command(format!(
            "'{selector}' did not appear within {}s",
            bound.as_secs()
        ))
    })
}

/// Navigate a known page and record what rendered.
#[derive(Default)]
pub struct NavigationProbe;

#[async_trait::async_trait]
impl Probe for NavigationProbe {
    fn name(&self) -> &str {
        "basic_navigation"
    }

    fn needs_browser(&self) -> bool {
        true
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome {
        let session = match require_session(self.name(), browser) {
            Ok(s) => s,
            Err(skip) => return skip,
        };
        match self.exercise(session).await {
            Ok(payload) => ProbeOutcome::success(self.name(), payload),
            Err(e) => driver_failure(self.name(), e),
        }
    }
}

impl NavigationProbe {
    async fn exercise(
        &self,
        session: &BrowserSession,
    ) -> Result<Map<String, Value>, DriverError> {
        session.navigate("https://httpbin.org/html").await?;
        let title = session.title().await?;
        let url = session.current_url().await?;
        let source = session.page_source().await?;
        let (paragraph_count, sample_text) = http::paragraph_summary(&source);

        let mut payload = Map::new();
        payload.insert("title".into(), json!(title));
        payload.insert("url".into(), json!(url));
        payload.insert("content_length".into(), json!(source.len()));
        payload.insert("paragraph_count".into(), json!(paragraph_count));
        if let Some(sample) = sample_text {
            payload.insert("sample_text".into(), json!(sample));
        }
        Ok(payload)
    }
}

/// Type into a form field and read the value back.
#[derive(Default)]
pub struct FormProbe;

#[async_trait::async_trait]
impl Probe for FormProbe {
    fn name(&self) -> &str {
        "form_interaction"
    }

    fn needs_browser(&self) -> bool {
        true
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome {
        let session = match require_session(self.name(), browser) {
            Ok(s) => s,
            Err(skip) => return skip,
        };
        match self.exercise(session).await {
            Ok(payload) => ProbeOutcome::success(self.name(), payload),
            Err(e) => driver_failure(self.name(), e),
        }
    }
}

impl FormProbe {
    async fn exercise(
        &self,
        session: &BrowserSession,
    ) -> Result<Map<String, Value>, DriverError> {
        session.navigate("https://httpbin.org/forms/post").await?;
        let field = session.find_element("[name='custname']").await?;
        session.send_keys(&field, "CI Test User").await?;
        let entered = session.element_property(&field, "value").await?;

        let mut payload = Map::new();
        payload.insert("entered_text".into(), entered);
        Ok(payload)
    }
}

/// Execute JavaScript in the page and capture the results.
#[derive(Default)]
pub struct ScriptProbe;

#[async_trait::async_trait]
impl Probe for ScriptProbe {
    fn name(&self) -> &str {
        "javascript"
    }

    fn needs_browser(&self) -> bool {
        true
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome {
        let session = match require_session(self.name(), browser) {
            Ok(s) => s,
            Err(skip) => return skip,
        };
        match self.exercise(session).await {
            Ok(payload) => ProbeOutcome::success(self.name(), payload),
            Err(e) => driver_failure(self.name(), e),
        }
    }
}

impl ScriptProbe {
    async fn exercise(
        &self,
        session: &BrowserSession,
    ) -> Result<Map<String, Value>, DriverError> {
        let user_agent = session
            .execute_script("return navigator.userAgent;")
            .await?;
        let window_size = session
            .execute_script("return {width: window.innerWidth, height: window.innerHeight};")
            .await?;

        let mut payload = Map::new();
        payload.insert("user_agent".into(), user_agent);
        payload.insert("window_size".into(), window_size);
        Ok(payload)
    }
}

/// Capture the viewport to a PNG on disk.
pub struct ScreenshotProbe {
    output: PathBuf,
}

impl ScreenshotProbe {
    pub fn new(output: PathBuf) -> Self {
        Self { output }
    }
}

#[async_trait::async_trait]
impl Probe for ScreenshotProbe {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn needs_browser(&self) -> bool {
        true
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome {
        let session = match require_session(self.name(), browser) {
            Ok(s) => s,
            Err(skip) => return skip,
        };

        let png = match session.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => return driver_failure(self.name(), e),
        };
        if let Err(e) = tokio::fs::write(&self.output, &png).await {
            return ProbeOutcome::error(
                self.name(),
                format!("could not write {}: {e}", self.output.display()),
                Map::new(),
            );
        }

        let mut payload = Map::new();
        payload.insert("file".into(), json!(self.output.display().to_string()));
        payload.insert("bytes".into(), json!(png.len()));
        ProbeOutcome::success(self.name(), payload)
    }
}

/// Page load timing: navigate and poll document.readyState until complete.
pub struct PageTimingProbe {
    urls: Vec<String>,
}

impl Default for PageTimingProbe {
    fn default() -> Self {
        Self {
            urls: vec![
                "https://www.google.com".to_string(),
                "https://httpbin.org/html".to_string(),
                "https://example.com".to_string(),
            ],
        }
    }
}

#[async_trait::async_trait]
impl Probe for PageTimingProbe {
    fn name(&self) -> &str {
        "page_load"
    }

    fn needs_browser(&self) -> bool {
        true
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome {
        let session = match require_session(self.name(), browser) {
            Ok(s) => s,
            Err(skip) => return skip,
        };

        let mut payload = Map::new();
        let mut failures = Vec::new();

        for url in &self.urls {
            match Self::time_load(session, url).await {
                Ok(seconds) => {
                    payload.insert(
                        url.clone(),
                        json!({ "load_time_seconds": seconds, "status": "success" }),
                    );
                }
                Err(detail) => {
                    warn!(%url, %detail, "page load timing failed");
                    payload.insert(
                        url.clone(),
                        json!({ "load_time_seconds": null, "status": "error", "error": detail }),
                    );
                    failures.push(url.clone());
                }
            }
        }

        if failures.is_empty() {
            ProbeOutcome::success(self.name(), payload)
        } else {
            let detail = format!("page load failed for: {}", failures.join(", "));
            ProbeOutcome::error(self.name(), detail, payload)
        }
    }
}

impl PageTimingProbe {
    async fn time_load(session: &BrowserSession, url: &str) -> Result<f64, String> {
        let start = Instant::now();
        session.navigate(url).await.map_err(|e| e.to_string())?;

        let wait = async {
            loop {
                let state = session
                    .execute_script("return document.readyState")
                    .await
                    .map_err(|e| e.to_string())?;
                if state.as_str() == Some("complete") {
                    return Ok::<(), String>(());
                }
                tokio::time::sleep(READY_STATE_POLL).await;
            }
        };
        tokio::time::timeout(READY_STATE_BOUND, wait)
            .await
            .map_err(|_| format!("document not ready within {}s", READY_STATE_BOUND.as_secs()))??;

        Ok(round2(start.elapsed().as_secs_f64()))
    }
}

/// Availability check for the smoke suite: is a driver locatable at all?
/// Deliberately not a browser probe, so it reports Error rather than being
/// skipped when nothing is installed.
pub struct DriverCheckProbe {
    environment: Environment,
}

impl DriverCheckProbe {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

#[async_trait::async_trait]
impl Probe for DriverCheckProbe {
    fn name(&self) -> &str {
        "driver_check"
    }

    async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
        match driver::locate(self.environment) {
            Ok(path) => {
                let mut payload = Map::new();
                payload.insert("geckodriver".into(), json!(path.display().to_string()));
                ProbeOutcome::success(self.name(), payload)
            }
            Err(e) => ProbeOutcome::error(self.name(), e.to_string(), Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeStatus;

    #[tokio::test]
    async fn search_probe_skips_without_a_session() {
        let outcome = SearchProbe::default().run(None).await;
        assert_eq!(outcome.status, ProbeStatus::Skipped);
        assert!(outcome.payload.is_empty());
        assert_eq!(outcome.reason.as_deref(), Some(NO_BROWSER_REASON));
    }

    #[tokio::test]
    async fn every_browser_probe_skips_without_a_session() {
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(SearchProbe::default()),
            Box::new(NavigationProbe),
            Box::new(FormProbe),
            Box::new(ScriptProbe),
            Box::new(ScreenshotProbe::new(std::path::PathBuf::from("shot.png"))),
            Box::new(PageTimingProbe::default()),
        ];
        for probe in probes {
            let outcome = probe.run(None).await;
            assert_eq!(outcome.status, ProbeStatus::Skipped, "{}", outcome.name);
        }
    }
}
