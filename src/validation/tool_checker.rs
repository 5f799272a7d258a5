//! Tool Checker - verifies a target's external requirements up front
//!
//! Runs before a target's first step so that a missing `poetry`, a missing
//! packaging script or an unset token fails the target immediately instead
//! of halfway through a build.

use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::traits::Requirement;

/// Checker for tools, scripts and credentials
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolChecker;

impl ToolChecker {
    pub fn new() -> Self {
        Self
    }

    /// Requirements that are not satisfied, rendered for the operator
    ///
    /// Duplicates are reported once, in first-seen order.
    pub fn missing(&self, ctx: &StepContext<'_>, requirements: &[Requirement]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();

        for requirement in requirements {
            let satisfied = match requirement {
                Requirement::Program(name) => ctx.run.runner.locate(name).is_some(),
                Requirement::Script(path) => ctx.project_dir().join(path).is_file(),
                Requirement::Credential(kind) => ctx.credentials().has(*kind),
            };

            let rendered = requirement.to_string();
            if !satisfied && !missing.contains(&rendered) {
                tracing::debug!(target_name = %ctx.target, "missing requirement: {}", rendered);
                missing.push(rendered);
            }
        }

        missing
    }

    /// Fail with `DependencyMissing` if anything is unsatisfied
    pub fn check(
        &self,
        ctx: &StepContext<'_>,
        requirements: &[Requirement],
    ) -> Result<(), ReleaseError> {
        let missing = self.missing(ctx, requirements);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReleaseError::DependencyMissing {
                target: ctx.target,
                missing,
            })
        }
    }
}
