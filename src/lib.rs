//! Release automation for a Python package
//!
//! Publishes one version to a package index, a GitHub release, an APT
//! package tree and a Homebrew formula, either locally or by dispatching
//! GitHub Actions workflows.

pub mod cli;
pub mod core;
pub mod orchestration;
pub mod security;
pub mod targets;
pub mod validation;

#[cfg(test)]
mod testing;

pub use core::{ReleaseError, RunConfig, RunReport, Settings};
pub use orchestration::Orchestrator;
