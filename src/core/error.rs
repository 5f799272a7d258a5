//! Error handling for release runs
//!
//! Errors are grouped the way an operator acts on them: usage errors stop the
//! process before anything runs, dependency errors fail one target up front,
//! step errors fail one step, and dispatch errors come from the CI system.

use crate::core::model::{Step, Target};
use std::time::Duration;
use thiserror::Error;

/// Main error type for release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Usage errors
    #[error("invalid value for {flag}: {message}")]
    Usage { flag: String, message: String },

    // Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("credential missing: set one of {}", .variables.join(", "))]
    CredentialMissing { variables: Vec<String> },

    // Dependency errors
    #[error("[{target}] required tools missing: {}", .missing.join(", "))]
    DependencyMissing { target: Target, missing: Vec<String> },

    // Step execution errors
    #[error("[{target}] {step} failed: {message}")]
    StepFailed {
        target: Target,
        step: Step,
        message: String,
    },

    // Remote dispatch errors
    #[error("[{target}] workflow dispatch failed: {message}")]
    DispatchFailed { target: Target, message: String },

    #[error("[{target}] workflow run did not finish within {}s", .waited.as_secs())]
    PollTimeout { target: Target, waited: Duration },

    // State errors
    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Shorthand for a usage error naming the offending flag
    pub fn usage(flag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Usage {
            flag: flag.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn step(target: Target, step: Step, message: impl Into<String>) -> Self {
        Self::StepFailed {
            target,
            step,
            message: message.into(),
        }
    }

    /// Get the target associated with this error, if any
    pub fn target(&self) -> Option<Target> {
        match self {
            Self::DependencyMissing { target, .. }
            | Self::StepFailed { target, .. }
            | Self::DispatchFailed { target, .. }
            | Self::PollTimeout { target, .. } => Some(*target),
            Self::Usage { .. }
            | Self::Config { .. }
            | Self::CredentialMissing { .. }
            | Self::InvalidTransition { .. }
            | Self::Io(_) => None,
        }
    }

    /// Whether this error must stop the process before any step runs
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    /// Process exit code for errors that end the run
    pub fn exit_code(&self) -> i32 {
        if self.is_usage() { 2 } else { 1 }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Usage { .. } => vec!["Run with --help to list valid flags and values"],
            Self::Config { .. } => vec![
                "Check .release-config.yaml or the file passed with --config",
                "Check RELEASE_REPOSITORY / RELEASE_WORKFLOW overrides",
            ],
            Self::CredentialMissing { .. } => {
                vec!["Export the token in the environment before re-running"]
            }
            Self::DependencyMissing { .. } => vec![
                "Install the missing tools and make sure they are on PATH",
                "Check that the packaging scripts exist under the scripts directory",
            ],
            Self::StepFailed { .. } => vec![
                "Inspect the tool output above",
                "Re-run the failed step alone with --local and the step flag",
            ],
            Self::DispatchFailed { .. } => vec![
                "Check that the token can dispatch workflows (actions: write)",
                "Check the workflow file name and the git ref",
            ],
            Self::PollTimeout { .. } => vec![
                "Check the run on GitHub; it may still finish",
                "Raise poll.max_wait_secs in .release-config.yaml",
            ],
            Self::InvalidTransition { .. } => vec!["Report this as a bug"],
            Self::Io(_) => vec!["Check file permissions and free disk space"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usage { .. } => "USAGE",
            Self::Config { .. } => "CONFIG",
            Self::CredentialMissing { .. } => "CREDENTIAL_MISSING",
            Self::DependencyMissing { .. } => "DEPENDENCY_MISSING",
            Self::StepFailed { .. } => "STEP_FAILED",
            Self::DispatchFailed { .. } => "DISPATCH_FAILED",
            Self::PollTimeout { .. } => "POLL_TIMEOUT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error() {
        let error = ReleaseError::usage("--publish-to", "unknown target 'npm'");

        assert!(error.is_usage());
        assert_eq!(error.exit_code(), 2);
        assert_eq!(error.code(), "USAGE");
        assert!(error.target().is_none());
        assert!(error.to_string().contains("--publish-to"));
    }

    #[test]
    fn test_step_failed_error_with_message() {
        let error = ReleaseError::step(Target::Apt, Step::Build, "exit status 2");

        assert_eq!(error.target(), Some(Target::Apt));
        assert_eq!(error.exit_code(), 1);
        assert_eq!(error.code(), "STEP_FAILED");
        let msg = error.to_string();
        assert!(msg.contains("os-package-a"));
        assert!(msg.contains("build failed"));
        assert!(msg.contains("exit status 2"));
    }

    #[test]
    fn test_dependency_missing_lists_tools() {
        let error = ReleaseError::DependencyMissing {
            target: Target::Index,
            missing: vec!["poetry".to_string(), "PYPI_TOKEN".to_string()],
        };

        assert_eq!(error.code(), "DEPENDENCY_MISSING");
        assert!(error.to_string().contains("poetry, PYPI_TOKEN"));
        assert!(error.suggested_actions().len() >= 2);
    }

    #[test]
    fn test_dispatch_errors_are_distinct() {
        let failed = ReleaseError::DispatchFailed {
            target: Target::VcsRelease,
            message: "404 Not Found".to_string(),
        };
        let timeout = ReleaseError::PollTimeout {
            target: Target::VcsRelease,
            waited: Duration::from_secs(90),
        };

        assert_ne!(failed.code(), timeout.code());
        assert!(timeout.to_string().contains("90s"));
    }

    #[test]
    fn test_credential_missing_display() {
        let error = ReleaseError::CredentialMissing {
            variables: vec!["GITHUB_TOKEN".to_string(), "GH_TOKEN".to_string()],
        };

        assert_eq!(error.exit_code(), 1);
        assert!(error.to_string().contains("GITHUB_TOKEN, GH_TOKEN"));
    }
}
