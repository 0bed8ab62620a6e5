//! HTTP probes: fetch-and-scrape, averaged latency, quick reachability.

use super::{round2, Probe, ProbeOutcome};
use crate::driver::BrowserSession;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(30);
const LATENCY_TIMEOUT: Duration = Duration::from_secs(10);
const LATENCY_REPETITIONS: u32 = 3;
const LATENCY_PAUSE: Duration = Duration::from_secs(1);

fn probe_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(crate::TERMUX_USER_AGENT)
        .build()
        .expect("Failed to build HTTP client")
}

/// Extract the document title, if any.
pub(crate) fn extract_title(html: &str) -> Option<String> {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("title").expect("valid selector");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Count paragraph elements and grab a short text sample from the first one.
pub(crate) fn paragraph_summary(html: &str) -> (usize, Option<String>) {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("p").expect("valid selector");
    let mut paragraphs = document.select(&selector);
    let first = paragraphs.next().map(|el| {
        let text: String = el.text().collect::<String>().trim().to_string();
        if text.len() > 100 {
            let cut: String = text.chars().take(100).collect();
            format!("{cut}...")
        } else {
            text
        }
    });
    let count = first.iter().count() + paragraphs.count();
    (count, first)
}

/// Fetch a fixed URL set, timing each request and extracting the title from
/// HTML responses and the content type from the rest.
pub struct ScrapeProbe {
    client: Client,
    urls: Vec<String>,
}

impl Default for ScrapeProbe {
    fn default() -> Self {
        Self {
            client: probe_client(SCRAPE_TIMEOUT),
            urls: vec![
                "https://httpbin.org/html".to_string(),
                "https://httpbin.org/json".to_string(),
                "https://example.com".to_string(),
            ],
        }
    }
}

#[async_trait::async_trait]
impl Probe for ScrapeProbe {
    fn name(&self) -> &str {
        "web_scraping"
    }

    async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
        let mut payload = Map::new();
        let mut failures = Vec::new();

        for url in &self.urls {
            let start = Instant::now();
            match self.fetch(url).await {
                Ok(entry) => {
                    debug!(%url, elapsed = ?start.elapsed(), "scrape fetch ok");
                    payload.insert(url.clone(), entry);
                }
                Err(detail) => {
                    warn!(%url, %detail, "scrape fetch failed");
                    payload.insert(url.clone(), json!({ "status": "error", "error": detail }));
                    failures.push(url.clone());
                }
            }
        }

        if failures.is_empty() {
            ProbeOutcome::success(self.name(), payload)
        } else {
            let detail = format!(
                "{} of {} URLs failed: {}",
                failures.len(),
                self.urls.len(),
                failures.join(", ")
            );
            ProbeOutcome::error(self.name(), detail, payload)
        }
    }
}

impl ScrapeProbe {
    async fn fetch(&self, url: &str) -> Result<Value, String> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        let load_time = round2(start.elapsed().as_secs_f64());

        if url.contains("html") {
            let text = String::from_utf8_lossy(&body);
            let title = extract_title(&text).unwrap_or_else(|| "No title".to_string());
            Ok(json!({
                "status": "success",
                "load_time": load_time,
                "status_code": status_code,
                "title": title,
                "content_length": body.len(),
            }))
        } else {
            Ok(json!({
                "status": "success",
                "load_time": load_time,
                "status_code": status_code,
                "content_type": content_type,
            }))
        }
    }
}

/// Measurement seam for the latency probe, so averaging can be tested with
/// fixed durations.
#[async_trait::async_trait]
pub trait LatencySampler: Send + Sync {
    /// One timed request; returns elapsed time and HTTP status.
    async fn sample(&self, url: &str) -> Result<(Duration, u16), String>;
}

struct HttpSampler {
    client: Client,
}

#[async_trait::async_trait]
impl LatencySampler for HttpSampler {
    async fn sample(&self, url: &str) -> Result<(Duration, u16), String> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok((start.elapsed(), response.status().as_u16()))
    }
}

/// Averaged request latency against a fixed site list. Three repetitions per
/// site with a one-second pause between them, so repeated hits are not skewed
/// by server-side throttling or caching. Reported as the arithmetic mean in
/// milliseconds, two decimals.
pub struct LatencyProbe {
    targets: Vec<String>,
    repetitions: u32,
    pause: Duration,
    sampler: Box<dyn LatencySampler>,
}

impl Default for LatencyProbe {
    fn default() -> Self {
        Self {
            targets: vec![
                "https://www.google.com".to_string(),
                "https://www.github.com".to_string(),
                "https://httpbin.org".to_string(),
            ],
            repetitions: LATENCY_REPETITIONS,
            pause: LATENCY_PAUSE,
            sampler: Box::new(HttpSampler {
                client: probe_client(LATENCY_TIMEOUT),
            }),
        }
    }
}

impl LatencyProbe {
    /// Custom targets and pacing with an injected sampler.
    pub fn with_sampler(
        targets: Vec<String>,
        repetitions: u32,
        pause: Duration,
        sampler: Box<dyn LatencySampler>,
    ) -> Self {
        Self {
            targets,
            // At least one sample, so the mean is always defined.
            repetitions: repetitions.max(1),
            pause,
            sampler,
        }
    }
}

#[async_trait::async_trait]
impl Probe for LatencyProbe {
    fn name(&self) -> &str {
        "latency"
    }

    async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
        let mut payload = Map::new();
        let mut failures = Vec::new();

        for target in &self.targets {
            match self.measure(target).await {
                Ok((avg_ms, status_code)) => {
                    payload.insert(
                        target.clone(),
                        json!({
                            "latency_ms": avg_ms,
                            "status_code": status_code,
                            "status": "success",
                        }),
                    );
                }
                Err(detail) => {
                    warn!(%target, %detail, "latency sample failed");
                    payload.insert(
                        target.clone(),
                        json!({ "latency_ms": null, "status": "error", "error": detail }),
                    );
                    failures.push(target.clone());
                }
            }
        }

        if failures.is_empty() {
            ProbeOutcome::success(self.name(), payload)
        } else {
            let detail = format!("latency measurement failed for: {}", failures.join(", "));
            ProbeOutcome::error(self.name(), detail, payload)
        }
    }
}

impl LatencyProbe {
    async fn measure(&self, target: &str) -> Result<(f64, u16), String> {
        let mut samples_ms = Vec::with_capacity(self.repetitions as usize);
        let mut last_status = 0u16;

        for _ in 0..self.repetitions {
            let (elapsed, status_code) = self.sampler.sample(target).await?;
            samples_ms.push(elapsed.as_secs_f64() * 1000.0);
            last_status = status_code;
            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        let avg = samples_ms.iter().sum::<f64>() / samples_ms.len() as f64;
        Ok((round2(avg), last_status))
    }
}

/// Single quick GET used by the smoke suite.
pub struct QuickFetchProbe {
    client: Client,
    url: String,
}

impl Default for QuickFetchProbe {
    fn default() -> Self {
        Self {
            client: probe_client(LATENCY_TIMEOUT),
            url: "https://httpbin.org/json".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Probe for QuickFetchProbe {
    fn name(&self) -> &str {
        "http_get"
    }

    async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let mut payload = Map::new();
                payload.insert("url".into(), json!(self.url));
                payload.insert("status_code".into(), json!(response.status().as_u16()));
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

    struct FixedSampler {
        durations_ms: Vec<u64>,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LatencySampler for FixedSampler {
        async fn sample(&self, _url: &str) -> Result<(Duration, u16), String> {
            let i = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok((Duration::from_millis(self.durations_ms[i]), 200))
        }
    }

    struct FailingSampler;

    #[async_trait::async_trait]
    impl LatencySampler for FailingSampler {
        async fn sample(&self, _url: &str) -> Result<(Duration, u16), String> {
            Err("connection timed out".to_string())
        }
    }

    #[tokio::test]
    async fn latency_average_over_three_repetitions() {
        let sampler = FixedSampler {
            durations_ms: vec![100, 120, 110],
            calls: Default::default(),
        };
        let probe = LatencyProbe::with_sampler(
            vec!["https://example.com".to_string()],
            3,
            Duration::ZERO,
            Box::new(sampler),
        );

        let outcome = probe.run(None).await;
        assert_eq!(outcome.status, ProbeStatus::Success);
        let entry = &outcome.payload["https://example.com"];
        assert_eq!(entry["latency_ms"], 110.0);
        assert_eq!(entry["status_code"], 200);
    }

    #[tokio::test]
    async fn zero_repetitions_still_yields_a_defined_mean() {
        let sampler = FixedSampler {
            durations_ms: vec![100],
            calls: Default::default(),
        };
        let probe = LatencyProbe::with_sampler(
            vec!["https://example.com".to_string()],
            0,
            Duration::ZERO,
            Box::new(sampler),
        );

        let outcome = probe.run(None).await;
        assert_eq!(outcome.status, ProbeStatus::Success);
        assert_eq!(outcome.payload["https://example.com"]["latency_ms"], 100.0);
    }

    #[tokio::test]
    async fn latency_failure_is_an_error_outcome_not_a_panic() {
        let probe = LatencyProbe::with_sampler(
            vec!["https://example.com".to_string()],
            3,
            Duration::ZERO,
            Box::new(FailingSampler),
        );

        let outcome = probe.run(None).await;
        assert_eq!(outcome.status, ProbeStatus::Error);
        assert!(outcome
            .error_detail
            .as_deref()
            .unwrap()
            .contains("https://example.com"));
        assert_eq!(outcome.payload["https://example.com"]["latency_ms"], serde_json::Value::Null);
    }

    #[test]
    fn title_extraction() {
        let html = "<html><head><title> Herman Melville </title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Herman Melville"));
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
    }

    #[test]
    fn paragraph_summary_counts_and_samples() {
        let html = "<html><body><p>first paragraph</p><p>second</p></body></html>";
        let (count, sample) = paragraph_summary(html);
        assert_eq!(count, 2);
        assert_eq!(sample.as_deref(), Some("first paragraph"));

        let (count, sample) = paragraph_summary("<html><body></body></html>");
        assert_eq!(count, 0);
        assert!(sample.is_none());
    }
}
