//! Homebrew target - formula kept in this repository

use super::os_package::{commit_paths, run_script, script_args};
use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::model::{Step, Target};
use crate::core::traits::{ChangeProbe, ChangeStatus, ReleaseTarget, Requirement};
use async_trait::async_trait;
use std::path::PathBuf;

const BUILD_SCRIPT: &str = "brew/pypi-to-brew";
const TEST_SCRIPT: &str = "brew/test-brew-formula.sh";

/// Homebrew formula target
#[derive(Debug, Default)]
pub struct BrewTarget;

impl BrewTarget {
    pub fn new() -> Self {
        Self
    }

    fn formula_path(&self, ctx: &StepContext<'_>) -> PathBuf {
        ctx.settings()
            .brew_formula_dir
            .join(format!("{}.rb", ctx.config.package_name()))
    }
}

#[async_trait]
impl ReleaseTarget for BrewTarget {
    fn target(&self) -> Target {
        Target::Brew
    }

    fn artifact_paths(&self, ctx: &StepContext<'_>) -> Vec<PathBuf> {
        vec![self.formula_path(ctx)]
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
        run_script(ctx, Step::Build, &ctx.script(BUILD_SCRIPT), script_args(ctx)).await?;

        let formula = self.formula_path(ctx);
        if !ctx.project_dir().join(&formula).is_file() {
            return Err(ReleaseError::step(
                Target::Brew,
                Step::Build,
                format!("{} did not produce {}", BUILD_SCRIPT, formula.display()),
            ));
        }

        Ok(format!("generated {}", formula.display()))
    }

    async fn verify(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        run_script(ctx, Step::Verify, &ctx.script(TEST_SCRIPT), script_args(ctx)).await?;
        Ok(format!(
            "formula for {} {} passed its tests",
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
            "Update Homebrew formula for {} to version {}",
            ctx.config.package_name(),
            ctx.config.version()
        );
        commit_paths(ctx, &self.artifact_paths(ctx), &message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, Fixture};

    #[tokio::test]
    async fn test_build_requires_formula() {
        let fixture = Fixture::new(FakeRunner::new());
        let ctx = fixture.step_context(Target::Brew);

        let err = BrewTarget::new().build(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("nanodoc.rb"));

        fixture.write("py-release/brew/Formula/nanodoc.rb", "class Nanodoc < Formula\nend\n");
        let message = BrewTarget::new().build(&ctx).await.unwrap();
        assert_eq!(message, "generated py-release/brew/Formula/nanodoc.rb");
        assert_eq!(
            fixture.runner.calls_matching("py-release/brew/pypi-to-brew").len(),
            2
        );
    }

    #[tokio::test]
    async fn test_verify_runs_test_script() {
        let fixture = Fixture::new(FakeRunner::new());
        let ctx = fixture.step_context(Target::Brew);

        BrewTarget::new().verify(&ctx).await.unwrap();

        assert_eq!(
            fixture.runner.calls(),
            vec!["py-release/brew/test-brew-formula.sh nanodoc --version=1.2.0"]
        );
    }

    #[tokio::test]
    async fn test_commit_is_scoped_to_formula() {
        let runner = FakeRunner::new().respond("git diff --cached", 1, "");
        let fixture = Fixture::new(runner);
        let ctx = fixture.step_context(Target::Brew);

        let message = BrewTarget::new()
            .commit(&ctx, ChangeStatus::Changed)
            .await
            .unwrap();

        assert_eq!(
            message,
            "committed: Update Homebrew formula for nanodoc to version 1.2.0"
        );
        assert_eq!(
            fixture.runner.calls_matching("git add"),
            vec!["git add --all -- py-release/brew/Formula/nanodoc.rb"]
        );
    }
}
