//! Timed DNS resolution probe.

use super::{round2, Probe, ProbeOutcome};
use crate::driver::BrowserSession;
use serde_json::{json, Map};
use std::time::Instant;
use tracing::warn;
use trust_dns_resolver::TokioAsyncResolver;

/// Resolve a fixed domain list via the system resolver, recording the first
/// address and the wall-clock resolve time per domain.
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
    domains: Vec<String>,
}

impl Default for DnsProbe {
    fn default() -> Self {
        // System config (/etc/resolv.conf), falling back to Google DNS where
        // Termux has no resolv.conf.
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            TokioAsyncResolver::tokio(
                trust_dns_resolver::config::ResolverConfig::google(),
                trust_dns_resolver::config::ResolverOpts::default(),
            )
        });
        Self {
            resolver,
            domains: vec![
                "google.com".to_string(),
                "github.com".to_string(),
                "example.com".to_string(),
            ],
        }
    }
}

#[async_trait::async_trait]
impl Probe for DnsProbe {
    fn name(&self) -> &str {
        "dns_resolution"
    }

    async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
        let mut payload = Map::new();
        let mut failures = Vec::new();

        for domain in &self.domains {
            let start = Instant::now();
            match self.resolver.lookup_ip(domain.as_str()).await {
                Ok(lookup) => {
                    let resolve_ms = round2(start.elapsed().as_secs_f64() * 1000.0);
                    match lookup.iter().next() {
                        Some(ip) => {
                            payload.insert(
                                domain.clone(),
                                json!({
                                    "ip_address": ip.to_string(),
                                    "resolve_time_ms": resolve_ms,
                                    "status": "success",
                                }),
                            );
                        }
                        None => {
                            payload.insert(
                                domain.clone(),
                                json!({ "status": "error", "error": "no addresses returned" }),
                            );
                            failures.push(domain.clone());
                        }
                    }
                }
                Err(e) => {
                    warn!(%domain, error = %e, "DNS resolution failed");
                    payload.insert(
                        domain.clone(),
                        json!({ "status": "error", "error": e.to_string() }),
                    );
                    failures.push(domain.clone());
                }
            }
        }

        if failures.is_empty() {
            ProbeOutcome::success(self.name(), payload)
        } else {
            let detail = format!("resolution failed for: {}", failures.join(", "));
            ProbeOutcome::error(self.name(), detail, payload)
        }
    }
}
