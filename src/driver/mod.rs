//! Geckodriver lifecycle: locate the executable, spawn it, tear it down.

pub mod session;

pub use session::BrowserSession;

use crate::environment::Environment;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DRIVER_BINARY: &str = "geckodriver";
const DEFAULT_PORT: u16 = 4444;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);
const READY_POLL_ATTEMPTS: u32 = 40;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("geckodriver not found in any candidate location or on PATH")]
    NotFound,

    #[error("failed to spawn geckodriver at {path}: {source}")]
    SpawnFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("geckodriver did not become ready on port {port} within {waited_secs}s")]
    NotReady { port: u16, waited_secs: u64 },

    #[error("WebDriver session could not be created: {0}")]
    SessionFailed(String),

    #[error("WebDriver command failed: {0}")]
    Command(String),

    #[error("WebDriver request failed: {0}")]
    Protocol(#[from] reqwest::Error),
}

/// Candidate install locations, most-specific first. CI runners install to a
/// single known system path; elsewhere we mirror the manual install spots a
/// Termux or desktop user would use.
pub fn candidate_paths(environment: Environment) -> Vec<PathBuf> {
    match environment {
        Environment::ContinuousIntegration => vec![PathBuf::from("/usr/bin/geckodriver")],
        _ => {
            let mut paths = vec![
                PathBuf::from("/usr/bin/geckodriver"),
                PathBuf::from("/usr/local/bin/geckodriver"),
            ];
            if let Some(home) = std::env::var_os("HOME") {
                paths.push(Path::new(&home).join(DRIVER_BINARY));
            }
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd.join(DRIVER_BINARY));
            }
            paths
        }
    }
}

/// Resolve the geckodriver executable for this environment. Explicit
/// candidates are tried in order before the PATH scan so that runs behave
/// the same across machines with inconsistent installs. A missing driver is
/// an expected outcome, reported as `NotFound`.
pub fn locate(environment: Environment) -> Result<PathBuf, DriverError> {
    locate_in(&candidate_paths(environment), std::env::var_os("PATH").as_deref())
}

fn locate_in(candidates: &[PathBuf], path_var: Option<&OsStr>) -> Result<PathBuf, DriverError> {
    for candidate in candidates {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "geckodriver found at candidate path");
            return Ok(candidate.clone());
        }
    }
    search_path(DRIVER_BINARY, path_var).ok_or(DriverError::NotFound)
}

/// Scan the PATH entries for an executable, first hit wins.
pub fn search_path(name: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// A running geckodriver child process. Owned by the orchestrator for the
/// duration of one run; the process is terminated on every exit path, with
/// `Drop` as the backstop if `shutdown` was never reached.
pub struct DriverHandle {
    executable_path: PathBuf,
    port: u16,
    child: tokio::process::Child,
}

impl DriverHandle {
    /// Spawn geckodriver and wait until its /status endpoint answers.
    pub async fn spawn(executable_path: PathBuf, port: Option<u16>) -> Result<Self, DriverError> {
        let port = port.unwrap_or(DEFAULT_PORT);
        let child = tokio::process::Command::new(&executable_path)
            .arg("--port")
            .arg(port.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|source| DriverError::SpawnFailed {
                path: executable_path.display().to_string(),
                source,
            })?;

        let mut handle = Self {
            executable_path,
            port,
            child,
        };
        handle.wait_ready().await?;
        Ok(handle)
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    async fn wait_ready(&mut self) -> Result<(), DriverError> {
        let status_url = format!("{}/status", self.base_url());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        for _ in 0..READY_POLL_ATTEMPTS {
            if let Ok(resp) = client.get(&status_url).send().await {
                if resp.status().is_success() {
                    debug!(port = self.port, "geckodriver ready");
                    return Ok(());
                }
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        self.terminate().await;
        Err(DriverError::NotReady {
            port: self.port,
            waited_secs: (READY_POLL_INTERVAL * READY_POLL_ATTEMPTS).as_secs(),
        })
    }

    /// Kill the driver process and reap it.
    pub async fn terminate(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "failed to kill geckodriver process");
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        // Normal teardown goes through terminate(); this covers early-error
        // paths where the handle is dropped while the child is still alive.
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_picks_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let third = dir.path().join("geckodriver");
        std::fs::write(&third, b"#!/bin/sh\n").unwrap();

        let candidates = vec![
            dir.path().join("missing-a"),
            dir.path().join("missing-b"),
            third.clone(),
        ];
        let found = locate_in(&candidates, None).unwrap();
        assert_eq!(found, third);
    }

    #[test]
    fn locate_falls_back_to_path_scan() {
        let dir = tempfile::tempdir().unwrap();
        let on_path = dir.path().join("geckodriver");
        std::fs::write(&on_path, b"#!/bin/sh\n").unwrap();

        let path_var = std::env::join_paths([dir.path()]).unwrap();
        let found = locate_in(&[PathBuf::from("/nonexistent/geckodriver")], Some(&path_var));
        assert_eq!(found.unwrap(), on_path);
    }

    #[test]
    fn locate_reports_not_found_without_raising() {
        let result = locate_in(&[PathBuf::from("/nonexistent/geckodriver")], None);
        assert!(matches!(result, Err(DriverError::NotFound)));
    }

    #[test]
    fn ci_candidates_are_the_system_install_only() {
        let paths = candidate_paths(Environment::ContinuousIntegration);
        assert_eq!(paths, vec![PathBuf::from("/usr/bin/geckodriver")]);
    }

    #[test]
    fn search_path_handles_missing_path_var() {
        assert!(search_path("geckodriver", None).is_none());
    }
}
