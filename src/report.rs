//! Run report: ordered probe outcomes, JSON artifact, console summary.

use crate::environment::Environment;
use crate::probes::{ProbeOutcome, ProbeStatus};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to persist results to {path}: {source}")]
    PersistenceFailure {
        path: String,
        source: std::io::Error,
    },
}

/// Aggregate of one orchestration run. Outcomes are stored in execution
/// order; the report is append-only until persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: String,
    pub environment: Environment,
    pub outcomes: Vec<ProbeOutcome>,
}

impl RunReport {
    pub fn new(environment: Environment) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            environment,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: ProbeOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Lenient by design: a single Success makes the run pass, so total
    /// environmental unavailability is not confused with a broken runner.
    pub fn overall_success(&self) -> bool {
        self.outcomes.iter().any(ProbeOutcome::is_success)
    }
}

fn glyph(status: ProbeStatus) -> &'static str {
    match status {
        ProbeStatus::Success => "✅ PASS",
        ProbeStatus::Error => "❌ FAIL",
        ProbeStatus::Skipped => "⏭  SKIP",
    }
}

/// Render the report: a line-per-outcome console summary and the JSON
/// artifact bytes. Serialization is deterministic, so re-rendering an
/// unchanged report is byte-identical.
pub fn render(report: &RunReport) -> Result<(String, Vec<u8>), ReportError> {
    let mut summary = String::new();
    for outcome in &report.outcomes {
        summary.push_str(&format!("{:<25} {}\n", outcome.name, glyph(outcome.status)));
    }
    summary.push_str(&format!(
        "\nRESULTS: {}/{} probes passed\n",
        report.successes(),
        report.outcomes.len()
    ));

    // 2-space indentation, UTF-8, non-ASCII preserved.
    let artifact = serde_json::to_vec_pretty(report)?;
    Ok((summary, artifact))
}

/// Write the artifact to disk. IO failure here is fatal to the process, not
/// to the report, which remains intact in memory.
pub fn persist(report: &RunReport, path: &Path) -> Result<(), ReportError> {
    let (_, artifact) = render(report)?;
    std::fs::write(path, artifact).map_err(|source| ReportError::PersistenceFailure {
        path: path.display().to_string(),
        source,
    })
}
