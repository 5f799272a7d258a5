//! Run configuration and repository settings
//!
//! `RunConfig` is what the command line asks for: built once per invocation
//! and never mutated. `Settings` is how this repository is laid out and where
//! its CI lives, loaded from `.release-config.yaml`.

use crate::core::backoff::BackoffOptions;
use crate::core::error::ReleaseError;
use crate::core::model::{ExecutionMode, Step, Target};
use crate::validation::PackageNameValidator;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Run configuration
// ============================================================================

/// Validated, immutable selection for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    targets: BTreeSet<Target>,
    steps: BTreeSet<Step>,
    mode: ExecutionMode,
    force: bool,
    continue_on_error: bool,
    version: Version,
    package_name: String,
    release_notes: Option<PathBuf>,
}

impl RunConfig {
    /// Create a run configuration
    ///
    /// Empty target or step selections mean "all". The package name must be
    /// a valid distribution identifier.
    pub fn new(
        targets: impl IntoIterator<Item = Target>,
        steps: impl IntoIterator<Item = Step>,
        mode: ExecutionMode,
        version: Version,
        package_name: impl Into<String>,
    ) -> Result<Self, ReleaseError> {
        let package_name = package_name.into();
        PackageNameValidator::new()
            .validate(&package_name)
            .map_err(|message| ReleaseError::usage("--package-name", message))?;

        let mut targets: BTreeSet<Target> = targets.into_iter().collect();
        if targets.is_empty() {
            targets.extend(Target::ALL);
        }
        let mut steps: BTreeSet<Step> = steps.into_iter().collect();
        if steps.is_empty() {
            steps.extend(Step::ALL);
        }

        Ok(Self {
            targets,
            steps,
            mode,
            force: false,
            continue_on_error: false,
            version,
            package_name,
            release_notes: None,
        })
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_release_notes(mut self, release_notes: Option<PathBuf>) -> Self {
        self.release_notes = release_notes;
        self
    }

    /// Selected targets in run priority order
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.targets.iter().copied()
    }

    /// Selected steps in execution order
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps.iter().copied()
    }

    pub fn runs_step(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Git tag for this version (`v1.2.3`)
    pub fn tag(&self) -> String {
        format!("v{}", self.version)
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn release_notes(&self) -> Option<&Path> {
        self.release_notes.as_deref()
    }
}

// ============================================================================
// Repository settings
// ============================================================================

/// Repository layout and CI settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// GitHub repository slug (`owner/name`); falls back to the origin remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Git ref the release workflow runs on
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// GitHub REST API base URL
    pub api_url: String,

    /// Package index base URL
    pub index_url: String,

    /// Directory holding the packaging scripts
    pub scripts_dir: PathBuf,

    /// Build output of the package index step
    pub dist_dir: PathBuf,

    /// Scratch space for staged release notes
    pub staging_dir: PathBuf,

    /// APT package trees, one directory per version
    pub apt_output_dir: PathBuf,

    /// Homebrew formulae
    pub brew_formula_dir: PathBuf,

    pub workflows: WorkflowSettings,

    pub poll: PollSettings,

    /// Upper bound for any single external command
    pub command_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repository: None,
            git_ref: "main".to_string(),
            api_url: "https://api.github.com".to_string(),
            index_url: "https://pypi.org".to_string(),
            scripts_dir: PathBuf::from("py-release"),
            dist_dir: PathBuf::from("dist"),
            staging_dir: PathBuf::from(".release"),
            apt_output_dir: PathBuf::from("py-release/debian"),
            brew_formula_dir: PathBuf::from("py-release/brew/Formula"),
            workflows: WorkflowSettings::default(),
            poll: PollSettings::default(),
            command_timeout_secs: 60 * 60,
        }
    }
}

impl Settings {
    /// Workflow file dispatched for `target`
    pub fn workflow_for(&self, target: Target) -> &str {
        self.workflows
            .overrides
            .get(target.as_str())
            .map(String::as_str)
            .unwrap_or(self.workflows.default.as_str())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Remote workflow identifiers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Workflow file used by every target without an override
    pub default: String,

    /// Per-target workflow files keyed by canonical target name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, String>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default: "package-release.yml".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

/// Remote run polling policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSettings {
    pub initial_interval_secs: u64,
    pub max_interval_secs: u64,
    pub multiplier: f64,
    pub max_wait_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval_secs: 5,
            max_interval_secs: 60,
            multiplier: 1.5,
            max_wait_secs: 60 * 60,
        }
    }
}

impl PollSettings {
    pub fn backoff(&self) -> BackoffOptions {
        BackoffOptions {
            initial_delay: Duration::from_secs(self.initial_interval_secs),
            max_delay: Duration::from_secs(self.max_interval_secs),
            backoff_multiplier: self.multiplier.max(1.0),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}
