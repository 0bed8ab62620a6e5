//! Probe core: one named check against an external capability, normalized
//! into a JSON-serializable outcome that never aborts the surrounding run.

pub mod browser;
pub mod dns;
pub mod http;
pub mod speed;

use crate::driver::BrowserSession;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal state of one probe execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Success,
    Error,
    Skipped,
}

/// Result of one probe. Construct through `success` / `error` / `skipped`,
/// which uphold the shape rules: `error_detail` is set exactly for Error
/// outcomes, Skipped outcomes carry an empty payload and a skip reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub name: String,
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProbeOutcome {
    pub fn success(name: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Success,
            payload,
            error_detail: None,
            reason: None,
        }
    }

    /// Failed probe. Partial measurements gathered before the failure may be
    /// kept in the payload.
    pub fn error(
        name: impl Into<String>,
        detail: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Error,
            payload,
            error_detail: Some(detail.into()),
            reason: None,
        }
    }

    /// Probe not run in this environment (e.g. no browser driver).
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Skipped,
            payload: Map::new(),
            error_detail: None,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }
}

/// One self-contained check against an external capability.
///
/// `run` never returns `Err`: any failure of the underlying call is caught
/// and folded into an Error outcome so the orchestration always continues.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Identifier, unique within a run.
    fn name(&self) -> &str;

    /// Whether this probe needs a live browser session to do anything.
    fn needs_browser(&self) -> bool {
        false
    }

    async fn run(&self, browser: Option<&BrowserSession>) -> ProbeOutcome;
}

/// Round to two decimal places, the precision all reported measurements use.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_detail_present_exactly_for_errors() {
        let mut payload = Map::new();
        payload.insert("latency_ms".into(), json!(12.5));

        let ok = ProbeOutcome::success("latency", payload.clone());
        assert_eq!(ok.status, ProbeStatus::Success);
        assert!(ok.error_detail.is_none());

        let err = ProbeOutcome::error("latency", "connection refused", payload);
        assert_eq!(err.status, ProbeStatus::Error);
        assert!(err.error_detail.as_deref().is_some_and(|d| !d.is_empty()));

        let skip = ProbeOutcome::skipped("latency", "no network");
        assert!(skip.error_detail.is_none());
    }

    #[test]
    fn skipped_has_empty_payload_and_a_reason() {
        let skip = ProbeOutcome::skipped("screenshot", "browser driver unavailable");
        assert_eq!(skip.status, ProbeStatus::Skipped);
        assert!(skip.payload.is_empty());
        assert_eq!(skip.reason.as_deref(), Some("browser driver unavailable"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let skip = ProbeOutcome::skipped("x", "y");
        let json = serde_json::to_value(&skip).unwrap();
        assert_eq!(json["status"], "skipped");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn round2_matches_reporting_precision() {
        assert_eq!(round2(110.004), 110.0);
        assert_eq!(round2(123.456), 123.46);
        assert_eq!(round2((100.0 + 120.0 + 110.0) / 3.0), 110.0);
    }
}
