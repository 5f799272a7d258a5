//! Shared state handed to every target step

use crate::core::config::{RunConfig, Settings};
use crate::core::error::ReleaseError;
use crate::core::model::{Step, Target};
use crate::security::{CommandError, CommandOutput, CommandRunner, CommandSpec, CredentialStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything that stays fixed for the whole run
pub struct RunContext {
    pub project_dir: PathBuf,
    pub settings: Settings,
    pub credentials: CredentialStore,
    pub runner: Arc<dyn CommandRunner>,
}

impl RunContext {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        settings: Settings,
        credentials: CredentialStore,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            settings,
            credentials,
            runner,
        }
    }
}

/// One target's view of the run
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub config: &'a RunConfig,
    pub run: &'a RunContext,
    pub target: Target,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a RunConfig, run: &'a RunContext, target: Target) -> Self {
        Self {
            config,
            run,
            target,
        }
    }

    pub fn settings(&self) -> &'a Settings {
        &self.run.settings
    }

    pub fn credentials(&self) -> &'a CredentialStore {
        &self.run.credentials
    }

    pub fn project_dir(&self) -> &'a Path {
        &self.run.project_dir
    }

    /// Path of a packaging script relative to the project root
    pub fn script(&self, relative: &str) -> PathBuf {
        self.settings().scripts_dir.join(relative)
    }

    /// Run a command without interpreting its exit status
    pub async fn probe(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.run.runner.run(spec).await
    }

    /// Run a command as part of `step`; a non-zero exit fails the step
    ///
    /// Output embedded in errors has every held token masked.
    pub async fn exec(&self, step: Step, spec: CommandSpec) -> Result<CommandOutput, ReleaseError> {
        let output = self.run.runner.run(&spec).await.map_err(|e| {
            ReleaseError::step(self.target, step, self.credentials().mask_in(&e.to_string()))
        })?;

        if !output.success() {
            return Err(ReleaseError::step(
                self.target,
                step,
                format!(
                    "`{}` failed: {}",
                    spec.display(),
                    self.credentials().mask_in(&output.failure_summary())
                ),
            ));
        }

        Ok(output)
    }
}
