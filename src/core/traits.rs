//! Core traits and types for release targets
//!
//! A target knows how to build, verify and commit its artifact and how to
//! tell whether a commit would change anything. Sequencing, skipping and
//! halting belong to the orchestrator.

use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::model::{Step, Target};
use crate::security::CredentialKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Requirements
// ============================================================================

/// Something a step needs before it can run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Executable looked up on `PATH`
    Program(&'static str),
    /// Packaging script, relative to the project root
    Script(PathBuf),
    /// Token in the environment
    Credential(CredentialKind),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Program(name) => f.write_str(name),
            Requirement::Script(path) => write!(f, "{}", path.display()),
            Requirement::Credential(kind) => write!(f, "{}", kind),
        }
    }
}

// ============================================================================
// Change detection
// ============================================================================

/// How to find out whether a commit would change published state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeProbe {
    /// Version already listed by the package index JSON API
    IndexVersion { url: String },
    /// Release for this tag already exists
    ReleaseTag { tag: String },
    /// Uncommitted changes under these paths
    WorkingTree { paths: Vec<PathBuf> },
}

/// Result of a change probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Changed,
    Unchanged,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Changed => f.write_str("changed"),
            ChangeStatus::Unchanged => f.write_str("unchanged"),
        }
    }
}

// ============================================================================
// Targets
// ============================================================================

/// One distribution channel
///
/// Each step returns a short human-readable message on success. A step that
/// fails returns `ReleaseError::StepFailed` carrying the tool's output.
#[async_trait]
pub trait ReleaseTarget: Send + Sync {
    /// Which channel this is
    fn target(&self) -> Target;

    /// Files and directories this target produces, relative to the project
    fn artifact_paths(&self, ctx: &StepContext<'_>) -> Vec<PathBuf>;

    /// Tools, scripts and credentials `step` needs
    fn requirements(&self, ctx: &StepContext<'_>, step: Step) -> Vec<Requirement>;

    /// How the commit step decides whether there is anything to do
    fn change_probe(&self, ctx: &StepContext<'_>) -> ChangeProbe;

    /// Generate the artifact
    async fn build(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError>;

    /// Test the generated artifact
    async fn verify(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError>;

    /// Persist or publish the artifact
    ///
    /// `change` is `Unchanged` only when the run is forced.
    async fn commit(
        &self,
        ctx: &StepContext<'_>,
        change: ChangeStatus,
    ) -> Result<String, ReleaseError>;
}
