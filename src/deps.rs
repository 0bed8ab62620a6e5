//! Pre-flight checks for external collaborators the browser suites need.

use crate::driver;
use crate::environment::Environment;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepsError {
    #[error("missing dependency '{name}': {hint}")]
    DependencyMissing { name: String, hint: String },
}

/// What was found on this machine.
#[derive(Debug)]
pub struct DepsReport {
    pub geckodriver: Option<PathBuf>,
    pub firefox: Option<PathBuf>,
}

/// Verify the browser stack is present before a run starts. Network-only
/// suites need nothing beyond the compiled-in clients, so they never call
/// this; a failure here is fatal to `--check-only` invocations.
pub fn check(environment: Environment) -> Result<DepsReport, DepsError> {
    let path_var = std::env::var_os("PATH");
    let geckodriver = driver::locate(environment).ok();
    let firefox = driver::search_path("firefox", path_var.as_deref());
    evaluate(environment, geckodriver, firefox)
}

fn evaluate(
    environment: Environment,
    geckodriver: Option<PathBuf>,
    firefox: Option<PathBuf>,
) -> Result<DepsReport, DepsError> {
    if firefox.is_none() {
        return Err(DepsError::DependencyMissing {
            name: "firefox".to_string(),
            hint: install_hint(environment, "firefox"),
        });
    }
    if geckodriver.is_none() {
        return Err(DepsError::DependencyMissing {
            name: "geckodriver".to_string(),
            hint: install_hint(environment, "geckodriver"),
        });
    }
    Ok(DepsReport {
        geckodriver,
        firefox,
    })
}

fn install_hint(environment: Environment, package: &str) -> String {
    match environment {
        Environment::MobileTerminal => format!("install with: pkg install {package}"),
        _ => format!("install with: apt install {package}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_firefox_reports_termux_hint() {
        let err = evaluate(
            Environment::MobileTerminal,
            Some(PathBuf::from("/usr/bin/geckodriver")),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pkg install firefox"));
    }

    #[test]
    fn missing_geckodriver_reports_apt_hint() {
        let err = evaluate(
            Environment::Local,
            None,
            Some(PathBuf::from("/usr/bin/firefox")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("apt install geckodriver"));
    }

    #[test]
    fn complete_stack_passes() {
        let report = evaluate(
            Environment::Local,
            Some(PathBuf::from("/usr/bin/geckodriver")),
            Some(PathBuf::from("/usr/bin/firefox")),
        )
        .unwrap();
        assert!(report.geckodriver.is_some());
        assert!(report.firefox.is_some());
    }
}
