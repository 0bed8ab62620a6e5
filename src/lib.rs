//! termprobe -- network and browser reachability probes for mobile terminal
//! environments.
//!
//! This crate runs ordered sequences of probes (HTTP scraping, latency, DNS,
//! throughput, browser automation) against external services, isolates their
//! failures, and aggregates the outcomes into one JSON-serializable report.

pub mod deps;
pub mod driver;
pub mod environment;
pub mod probes;
pub mod report;
pub mod runner;

/// User agent presented by HTTP probes and the automated browser.
pub const TERMUX_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 10; Termux) AppleWebKit/537.36";
