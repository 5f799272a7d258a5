//! Release targets, steps and the records a run produces
//!
//! Targets and steps are closed sets: anything that does not name one of the
//! variants below is rejected at parse time instead of being ignored.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Targets
// ============================================================================

/// Distribution channel that can receive a published artifact
///
/// Variant order is the run priority: the package index goes first because
/// the release and both OS packages are generated from the indexed artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// Language package index (PyPI)
    #[value(name = "index", alias = "pypi")]
    Index,
    /// GitHub release with the built distributions attached
    #[value(name = "vcs-release", alias = "github")]
    VcsRelease,
    /// Debian/APT package tree committed to this repository
    #[value(name = "os-package-a", alias = "apt")]
    #[serde(rename = "os-package-a")]
    Apt,
    /// Homebrew formula committed to this repository
    #[value(name = "os-package-b", alias = "brew")]
    #[serde(rename = "os-package-b")]
    Brew,
}

impl Target {
    /// Every target, in run priority order
    pub const ALL: [Target; 4] = [Target::Index, Target::VcsRelease, Target::Apt, Target::Brew];

    /// Canonical name used on the command line and in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Index => "index",
            Target::VcsRelease => "vcs-release",
            Target::Apt => "os-package-a",
            Target::Brew => "os-package-b",
        }
    }

    /// Channel name understood by the release workflow's `publish_to` input
    pub fn channel(&self) -> &'static str {
        match self {
            Target::Index => "pypi",
            Target::VcsRelease => "github",
            Target::Apt => "apt",
            Target::Brew => "brew",
        }
    }

    /// Steps this target supports, in execution order
    pub fn supported_steps(&self) -> &'static [Step] {
        &Step::ALL
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::ALL
            .into_iter()
            .find(|target| target.as_str() == s || target.channel() == s)
            .ok_or_else(|| {
                format!(
                    "unknown target '{}' (expected one of: {})",
                    s,
                    Target::ALL.map(|t| t.as_str()).join(", ")
                )
            })
    }
}

// ============================================================================
// Steps
// ============================================================================

/// One phase of publishing a target
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Generate the artifact
    Build,
    /// Test the generated artifact
    Verify,
    /// Persist or publish the artifact
    Commit,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Build, Step::Verify, Step::Commit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Build => "build",
            Step::Verify => "verify",
            Step::Commit => "commit",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step '{}' (expected build, verify or commit)", s))
    }
}

/// Where steps execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Local,
    Remote,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => f.write_str("local"),
            ExecutionMode::Remote => f.write_str("remote"),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Terminal outcome of a step or a remote dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Skipped,
    Failed,
    /// Remote run did not reach a terminal state within the poll budget
    Unknown,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed)
    }

    /// Whether the run may proceed past this outcome without continue-on-error
    pub fn allows_progress(&self) -> bool {
        matches!(self, StepOutcome::Success | StepOutcome::Skipped)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            StepOutcome::Success => "✅",
            StepOutcome::Skipped => "⏭️ ",
            StepOutcome::Failed => "❌",
            StepOutcome::Unknown => "❔",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepOutcome::Success => "success",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Failed => "failed",
            StepOutcome::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of one locally executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub target: Target,
    pub step: Step,
    pub outcome: StepOutcome,
    pub message: String,
    pub duration_ms: u64,
}

/// Result of one remote workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub target: Target,
    pub workflow: String,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
    pub outcome: StepOutcome,
    pub message: String,
}

/// Point at which a run stopped early
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltPoint {
    pub target: Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
}

/// Aggregated record of a whole invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub mode: ExecutionMode,
    pub package_name: String,
    pub version: String,
    pub steps: Vec<StepResult>,
    pub dispatches: Vec<DispatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<HaltPoint>,
    pub not_started: Vec<Target>,
}

impl RunReport {
    pub fn new(mode: ExecutionMode, package_name: &str, version: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            mode,
            package_name: package_name.to_string(),
            version: version.to_string(),
            steps: Vec::new(),
            dispatches: Vec::new(),
            halted_at: None,
            not_started: Vec::new(),
        }
    }

    fn outcomes(&self) -> impl Iterator<Item = StepOutcome> + '_ {
        self.steps
            .iter()
            .map(|r| r.outcome)
            .chain(self.dispatches.iter().map(|d| d.outcome))
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes().any(|o| o.is_failure())
    }

    pub fn has_unknown(&self) -> bool {
        self.outcomes().any(|o| o == StepOutcome::Unknown)
    }

    /// Process exit code: 0 success or all skipped, 1 any failure, 3 unknown
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else if self.has_unknown() {
            3
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_priority_order() {
        let mut targets = vec![Target::Brew, Target::Index, Target::Apt, Target::VcsRelease];
        targets.sort();
        assert_eq!(targets, Target::ALL.to_vec());
    }

    #[test]
    fn test_target_from_str_accepts_aliases() {
        assert_eq!("index".parse::<Target>(), Ok(Target::Index));
        assert_eq!("pypi".parse::<Target>(), Ok(Target::Index));
        assert_eq!("github".parse::<Target>(), Ok(Target::VcsRelease));
        assert_eq!("os-package-a".parse::<Target>(), Ok(Target::Apt));
        assert_eq!("brew".parse::<Target>(), Ok(Target::Brew));
    }

    #[test]
    fn test_target_from_str_rejects_partial_names() {
        let err = "os-package".parse::<Target>().unwrap_err();
        assert!(err.contains("unknown target 'os-package'"));
        assert!("PYPI".parse::<Target>().is_err());
    }

    #[test]
    fn test_step_order() {
        assert!(Step::Build < Step::Verify);
        assert!(Step::Verify < Step::Commit);
        assert!("deploy".parse::<Step>().is_err());
    }

    #[test]
    fn test_target_serialization() {
        let json = serde_json::to_string(&Target::Apt).unwrap();
        assert_eq!(json, r#""os-package-a""#);
        let json = serde_json::to_string(&Target::VcsRelease).unwrap();
        assert_eq!(json, r#""vcs-release""#);
    }

    #[test]
    fn test_report_exit_codes() {
        let mut report = RunReport::new(ExecutionMode::Local, "demo", "1.0.0");
        assert_eq!(report.exit_code(), 0);

        report.steps.push(StepResult {
            target: Target::Apt,
            step: Step::Commit,
            outcome: StepOutcome::Skipped,
            message: "no changes".to_string(),
            duration_ms: 3,
        });
        assert_eq!(report.exit_code(), 0);

        report.dispatches.push(DispatchResult {
            target: Target::Index,
            workflow: "package-release.yml".to_string(),
            steps: Step::ALL.to_vec(),
            run_id: None,
            run_url: None,
            outcome: StepOutcome::Unknown,
            message: "timed out".to_string(),
        });
        assert_eq!(report.exit_code(), 3);

        report.steps.push(StepResult {
            target: Target::Brew,
            step: Step::Build,
            outcome: StepOutcome::Failed,
            message: "exit status 1".to_string(),
            duration_ms: 10,
        });
        assert_eq!(report.exit_code(), 1);
    }
}
