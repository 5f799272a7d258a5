//! APT target - Debian package tree kept in this repository

use super::os_package::{commit_paths, remove_stale_versions, run_script, script_args};
use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::model::{Step, Target};
use crate::core::traits::{ChangeProbe, ChangeStatus, ReleaseTarget, Requirement};
use async_trait::async_trait;
use std::path::PathBuf;

const BUILD_SCRIPT: &str = "debian/pypi-to-apt";
const TEST_SCRIPT: &str = "debian/test-apt-package.sh";

/// Debian/APT package target
#[derive(Debug, Default)]
pub struct AptTarget;

impl AptTarget {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReleaseTarget for AptTarget {
    fn target(&self) -> Target {
        Target::Apt
    }

    fn artifact_paths(&self, ctx: &StepContext<'_>) -> Vec<PathBuf> {
        vec![ctx.settings().apt_output_dir.clone()]
    }

    fn requirements(&self, ctx: &StepContext<'_>, step: Step) -> Vec<Requirement> {
        match step {
            Step::Build => vec![Requirement::Script(ctx.script(BUILD_SCRIPT))],
            Step::Verify => vec![Requirement::Script(ctx.script(TEST_SCRIPT))],
            Step::Commit => vec![Requirement::Program("git")],
        }
    }

    fn change_probe(&self, ctx: &StepContext<'_>) -> ChangeProbe {
        ChangeProbe::WorkingTree {
            paths: self.artifact_paths(ctx),
        }
    }

    async fn build(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        let package = ctx.config.package_name();
        let version = ctx.config.version().to_string();

        let output_dir = ctx.project_dir().join(&ctx.settings().apt_output_dir);
        let removed = remove_stale_versions(&output_dir, package, &version)
            .await
            .map_err(|e| ReleaseError::step(Target::Apt, Step::Build, e.to_string()))?;

        run_script(ctx, Step::Build, &ctx.script(BUILD_SCRIPT), script_args(ctx)).await?;

        let mut message = format!("generated APT package {}_{}", package, version);
        if !removed.is_empty() {
            message.push_str(&format!(" (removed {})", removed.join(", ")));
        }
        Ok(message)
    }

    async fn verify(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        run_script(ctx, Step::Verify, &ctx.script(TEST_SCRIPT), script_args(ctx)).await?;
        Ok(format!(
            "APT package for {} {} passed its tests",
            ctx.config.package_name(),
            ctx.config.version()
        ))
    }

    async fn commit(
        &self,
        ctx: &StepContext<'_>,
        _change: ChangeStatus,
    ) -> Result<String, ReleaseError> {
        let message = format!(
            "Update APT package for {} to version {}",
            ctx.config.package_name(),
            ctx.config.version()
        );
        commit_paths(ctx, &self.artifact_paths(ctx), &message).await
    }
}
