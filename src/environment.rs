//! Execution environment detection: CI runner, Termux, or generic local.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable set to "true" by GitHub Actions runners.
pub const CI_MARKER: &str = "GITHUB_ACTIONS";

/// Home directory that only exists inside a Termux install.
pub const TERMUX_HOME: &str = "/data/data/com.termux/files/home";

/// The execution context a run was started from. Fixed at report
/// construction; never re-detected mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "github_actions")]
    ContinuousIntegration,
    #[serde(rename = "termux")]
    MobileTerminal,
    #[serde(rename = "local")]
    Local,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::ContinuousIntegration => write!(f, "github_actions"),
            Environment::MobileTerminal => write!(f, "termux"),
            Environment::Local => write!(f, "local"),
        }
    }
}

/// Classify the current process environment. Reads the CI marker variable
/// and probes for the Termux home directory; always returns a value.
pub fn detect() -> Environment {
    let ci = std::env::var(CI_MARKER).map(|v| v == "true").unwrap_or(false);
    classify(ci, Path::new(TERMUX_HOME).exists())
}

/// CI marker wins over the Termux filesystem marker; both absent means Local.
fn classify(ci_marker: bool, termux_home_exists: bool) -> Environment {
    if ci_marker {
        Environment::ContinuousIntegration
    } else if termux_home_exists {
        Environment::MobileTerminal
    } else {
        Environment::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_marker_takes_priority_over_termux() {
        assert_eq!(classify(true, true), Environment::ContinuousIntegration);
        assert_eq!(classify(true, false), Environment::ContinuousIntegration);
    }

    #[test]
    fn termux_marker_beats_local() {
        assert_eq!(classify(false, true), Environment::MobileTerminal);
    }

    #[test]
    fn no_marker_is_local() {
        assert_eq!(classify(false, false), Environment::Local);
    }

    #[test]
    fn serializes_to_original_labels() {
        let json = serde_json::to_string(&Environment::MobileTerminal).unwrap();
        assert_eq!(json, "\"termux\"");
        let json = serde_json::to_string(&Environment::ContinuousIntegration).unwrap();
        assert_eq!(json, "\"github_actions\"");
    }
}
