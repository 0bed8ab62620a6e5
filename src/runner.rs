//! Sequential probe orchestration with a run-scoped browser session.

use crate::driver::{self, BrowserSession, DriverError, DriverHandle};
use crate::environment::Environment;
use crate::probes::browser::{
    DriverCheckProbe, FormProbe, NavigationProbe, PageTimingProbe, ScreenshotProbe, ScriptProbe,
    SearchProbe,
};
use crate::probes::dns::DnsProbe;
use crate::probes::http::{LatencyProbe, QuickFetchProbe, ScrapeProbe};
use crate::probes::speed::SpeedProbe;
use crate::probes::{Probe, ProbeOutcome};
use crate::report::RunReport;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const NO_BROWSER_REASON: &str = "browser driver unavailable";

/// Explicit run configuration. Threaded into the orchestrator at
/// construction; nothing here is read from ambient globals mid-run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub headless: bool,
    /// Pause between probes, easing burstiness against shared endpoints.
    pub inter_probe_delay: Duration,
    pub screenshot_path: PathBuf,
    /// Bypass driver location and use this executable directly.
    pub driver_override: Option<PathBuf>,
    pub driver_port: Option<u16>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            headless: true,
            inter_probe_delay: Duration::from_secs(2),
            screenshot_path: PathBuf::from("ci_screenshot.png"),
            driver_override: None,
            driver_port: None,
        }
    }
}

/// Runs an ordered probe sequence, isolating per-probe failures and owning
/// the browser driver for exactly the duration of one run.
pub struct Orchestrator {
    environment: Environment,
    config: RunnerConfig,
}

impl Orchestrator {
    pub fn new(environment: Environment, config: RunnerConfig) -> Self {
        Self {
            environment,
            config,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Execute the probes strictly in order. The browser session is acquired
    /// lazily before the first probe that needs it; if acquisition fails,
    /// every browser-dependent probe is short-circuited to Skipped without
    /// being invoked. The session is torn down when the run ends, whatever
    /// mix of outcomes it produced.
    pub async fn run(&self, probes: &[Box<dyn Probe>]) -> RunReport {
        let mut report = RunReport::new(self.environment);
        let mut browser: Option<BrowserSession> = None;
        let mut acquisition_attempted = false;

        for (index, probe) in probes.iter().enumerate() {
            if index > 0 && !self.config.inter_probe_delay.is_zero() {
                tokio::time::sleep(self.config.inter_probe_delay).await;
            }

            let outcome = if probe.needs_browser() {
                if browser.is_none() && !acquisition_attempted {
                    acquisition_attempted = true;
                    match self.acquire_browser().await {
                        Ok(session) => {
                            info!("browser session ready");
                            browser = Some(session);
                        }
                        Err(e) => {
                            warn!(error = %e, "browser unavailable; dependent probes will be skipped");
                        }
                    }
                }
                match browser.as_ref() {
                    Some(session) => probe.run(Some(session)).await,
                    None => ProbeOutcome::skipped(probe.name(), NO_BROWSER_REASON),
                }
            } else {
                probe.run(None).await
            };

            info!(probe = probe.name(), status = ?outcome.status, "probe finished");
            report.push(outcome);
        }

        if let Some(session) = browser.take() {
            session.quit().await;
        }
        report
    }

    async fn acquire_browser(&self) -> Result<BrowserSession, DriverError> {
        let executable = match &self.config.driver_override {
            Some(path) => path.clone(),
            None => driver::locate(self.environment)?,
        };
        info!(path = %executable.display(), "starting browser driver");
        let handle = DriverHandle::spawn(executable, self.config.driver_port).await?;
        BrowserSession::new(handle, self.config.headless).await
    }
}

/// Network-only probes, in the original runner's order.
pub fn network_suite() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(ScrapeProbe::default()),
        Box::new(SpeedProbe::default()),
        Box::new(LatencyProbe::default()),
        Box::new(DnsProbe::default()),
    ]
}

/// Browser probes, search first as in the original runner. Screenshots are
/// left out on CI runners, which have no use for the artifact.
pub fn browser_suite(environment: Environment, config: &RunnerConfig) -> Vec<Box<dyn Probe>> {
    let mut probes: Vec<Box<dyn Probe>> = vec![
        Box::new(SearchProbe::default()),
        Box::new(NavigationProbe),
        Box::new(FormProbe),
        Box::new(ScriptProbe),
        Box::new(PageTimingProbe::default()),
    ];
    if environment != Environment::ContinuousIntegration {
        probes.push(Box::new(ScreenshotProbe::new(config.screenshot_path.clone())));
    }
    probes
}

/// CI variant of the browser suite. Same probe set today; kept as its own
/// builder so the CI surface can diverge without touching callers.
pub fn ci_suite(environment: Environment, config: &RunnerConfig) -> Vec<Box<dyn Probe>> {
    browser_suite(environment, config)
}

/// Quick sanity pass: one HTTP GET, driver availability, one latency round.
pub fn smoke_suite(environment: Environment) -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(QuickFetchProbe::default()),
        Box::new(DriverCheckProbe::new(environment)),
        Box::new(LatencyProbe::default()),
    ]
}

/// Everything: the network suite followed by the browser suite.
pub fn full_suite(environment: Environment, config: &RunnerConfig) -> Vec<Box<dyn Probe>> {
    let mut probes = network_suite();
    probes.extend(browser_suite(environment, config));
    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeStatus;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StaticProbe {
        name: &'static str,
        status: ProbeStatus,
    }

    #[async_trait::async_trait]
    impl Probe for StaticProbe {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
            match self.status {
                ProbeStatus::Success => {
                    let mut payload = Map::new();
                    payload.insert("ok".into(), json!(true));
                    ProbeOutcome::success(self.name, payload)
                }
                ProbeStatus::Error => ProbeOutcome::error(self.name, "synthetic failure", Map::new()),
                ProbeStatus::Skipped => ProbeOutcome::skipped(self.name, "synthetic skip"),
            }
        }
    }

    struct BrowserDependentProbe {
        invoked: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Probe for BrowserDependentProbe {
        fn name(&self) -> &str {
            "basic_navigation"
        }

        fn needs_browser(&self) -> bool {
            true
        }

        async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
            self.invoked.store(true, Ordering::SeqCst);
            ProbeOutcome::success(self.name(), Map::new())
        }
    }

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            inter_probe_delay: Duration::ZERO,
            // A path that cannot exist, so browser acquisition always fails
            // deterministically regardless of what the host has installed.
            driver_override: Some(PathBuf::from("/nonexistent/geckodriver")),
            ..RunnerConfig::default()
        }
    }

    #[tokio::test]
    async fn one_success_among_errors_passes_the_run() {
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(StaticProbe { name: "a", status: ProbeStatus::Error }),
            Box::new(StaticProbe { name: "b", status: ProbeStatus::Success }),
            Box::new(StaticProbe { name: "c", status: ProbeStatus::Error }),
        ];
        let orchestrator = Orchestrator::new(Environment::Local, fast_config());
        let report = orchestrator.run(&probes).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.overall_success());
    }

    #[tokio::test]
    async fn all_failures_fail_the_run() {
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(StaticProbe { name: "a", status: ProbeStatus::Error }),
            Box::new(StaticProbe { name: "b", status: ProbeStatus::Skipped }),
        ];
        let orchestrator = Orchestrator::new(Environment::Local, fast_config());
        let report = orchestrator.run(&probes).await;

        assert!(!report.overall_success());
    }

    #[tokio::test]
    async fn probe_error_does_not_abort_the_sequence() {
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(StaticProbe { name: "first", status: ProbeStatus::Error }),
            Box::new(StaticProbe { name: "second", status: ProbeStatus::Success }),
        ];
        let orchestrator = Orchestrator::new(Environment::Local, fast_config());
        let report = orchestrator.run(&probes).await;

        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn browser_probes_skip_without_invocation_when_driver_missing() {
        let invoked = Arc::new(AtomicBool::new(false));
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(StaticProbe { name: "latency", status: ProbeStatus::Success }),
            Box::new(BrowserDependentProbe { invoked: invoked.clone() }),
        ];
        let orchestrator = Orchestrator::new(Environment::Local, fast_config());
        let report = orchestrator.run(&probes).await;

        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(report.outcomes[1].status, ProbeStatus::Skipped);
        assert_eq!(
            report.outcomes[1].reason.as_deref(),
            Some("browser driver unavailable")
        );
        // Non-browser probes still ran normally.
        assert_eq!(report.outcomes[0].status, ProbeStatus::Success);
    }

    #[test]
    fn full_suite_orders_network_before_browser() {
        let config = RunnerConfig::default();
        let probes = full_suite(Environment::MobileTerminal, &config);
        let names: Vec<_> = probes.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "web_scraping",
                "network_speed",
                "latency",
                "dns_resolution",
                "google_search",
                "basic_navigation",
                "form_interaction",
                "javascript",
                "page_load",
                "screenshot",
            ]
        );
    }

    #[test]
    fn browser_suite_carries_the_search_probe() {
        let config = RunnerConfig::default();
        let probes = browser_suite(Environment::MobileTerminal, &config);
        assert_eq!(probes[0].name(), "google_search");
        assert!(probes[0].needs_browser());
    }

    #[test]
    fn ci_suite_matches_browser_suite_without_screenshot() {
        let config = RunnerConfig::default();
        let probes = ci_suite(Environment::ContinuousIntegration, &config);
        let names: Vec<_> = probes.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "google_search",
                "basic_navigation",
                "form_interaction",
                "javascript",
                "page_load",
            ]
        );
    }
}
