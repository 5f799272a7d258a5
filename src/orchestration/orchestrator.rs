//! Orchestrator - runs the selected steps of the selected targets
//!
//! Manages one release run:
//! - Targets in priority order, steps in build/verify/commit order
//! - Requirement checks before a target's first step
//! - Change detection in front of every commit
//! - Halting on the first failure unless continue-on-error is set
//! - Delegation to the remote dispatcher in remote mode

use super::change_detector::ChangeDetector;
use super::remote_dispatcher::RemoteDispatcher;
use crate::core::config::RunConfig;
use crate::core::context::{RunContext, StepContext};
use crate::core::error::ReleaseError;
use crate::core::model::{ExecutionMode, HaltPoint, RunReport, Step, StepOutcome, StepResult};
use crate::core::state_machine::StepTracker;
use crate::core::traits::{ChangeStatus, ReleaseTarget, Requirement};
use crate::targets::TargetRegistry;
use crate::validation::ToolChecker;
use chrono::Utc;

/// Main release orchestrator
pub struct Orchestrator {
    run: RunContext,
    registry: TargetRegistry,
    detector: ChangeDetector,
    checker: ToolChecker,
    dispatcher: Option<RemoteDispatcher>,
}

impl Orchestrator {
    /// Create an orchestrator with every built-in target
    pub fn new(run: RunContext, detector: ChangeDetector) -> Self {
        Self {
            run,
            registry: TargetRegistry::standard(),
            detector,
            checker: ToolChecker::new(),
            dispatcher: None,
        }
    }

    /// Enable remote mode
    pub fn with_dispatcher(mut self, dispatcher: RemoteDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Execute `config` and report every step or dispatch outcome
    ///
    /// Step failures are recorded in the report, not returned. Only errors
    /// that prevent the run from starting at all are returned.
    pub async fn run(&self, config: &RunConfig) -> Result<RunReport, ReleaseError> {
        let mut report = RunReport::new(
            config.mode(),
            config.package_name(),
            &config.version().to_string(),
        );

        tracing::info!(
            run_id = %report.run_id,
            mode = %config.mode(),
            package = config.package_name(),
            version = %config.version(),
            "starting release run"
        );

        match config.mode() {
            ExecutionMode::Local => self.run_local(config, &mut report).await?,
            ExecutionMode::Remote => {
                let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
                    ReleaseError::config("remote mode requires a workflow client")
                })?;
                dispatcher
                    .run(config, &self.run.settings, &self.run.project_dir, &mut report)
                    .await?;
            }
        }

        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    async fn run_local(
        &self,
        config: &RunConfig,
        report: &mut RunReport,
    ) -> Result<(), ReleaseError> {
        let mut halted = false;

        for target in config.targets() {
            if halted {
                report.not_started.push(target);
                continue;
            }

            let implementation = self.registry.get(target).ok_or_else(|| {
                ReleaseError::config(format!("no implementation registered for {}", target))
            })?;
            let ctx = StepContext::new(config, &self.run, target);

            if let Some(halt) = self.run_target(implementation, &ctx, report).await {
                if !config.continue_on_error() {
                    report.halted_at = Some(halt);
                    halted = true;
                }
            }
        }

        Ok(())
    }

    /// Run one target's selected steps; returns where it stopped on failure
    async fn run_target(
        &self,
        implementation: &dyn ReleaseTarget,
        ctx: &StepContext<'_>,
        report: &mut RunReport,
    ) -> Option<HaltPoint> {
        let target = ctx.target;
        let steps: Vec<Step> = self
            .registry
            .steps_for(target)
            .iter()
            .copied()
            .filter(|step| ctx.config.runs_step(*step))
            .collect();
        let first = *steps.first()?;

        println!("\n📦 {} ({})", target, steps_label(&steps));

        let requirements: Vec<Requirement> = steps
            .iter()
            .flat_map(|step| implementation.requirements(ctx, *step))
            .collect();
        if let Err(e) = self.checker.check(ctx, &requirements) {
            println!("  ❌ {}", e);
            report.steps.push(StepResult {
                target,
                step: first,
                outcome: StepOutcome::Failed,
                message: e.to_string(),
                duration_ms: 0,
            });
            return Some(HaltPoint {
                target,
                step: Some(first),
            });
        }

        for step in steps {
            let result = self.run_step(implementation, ctx, step).await;
            println!(
                "  {} {}: {} ({}ms)",
                result.outcome.symbol(),
                step,
                result.message,
                result.duration_ms
            );

            let outcome = result.outcome;
            report.steps.push(result);

            // A failure always stops this target's remaining steps
            if !outcome.allows_progress() {
                return Some(HaltPoint {
                    target,
                    step: Some(step),
                });
            }
        }

        None
    }

    async fn run_step(
        &self,
        implementation: &dyn ReleaseTarget,
        ctx: &StepContext<'_>,
        step: Step,
    ) -> StepResult {
        let target = ctx.target;
        let mut tracker = StepTracker::new(target, Some(step));

        let (outcome, message) = match tracker.start() {
            Ok(()) => match self.execute(implementation, ctx, step).await {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!("{}", e);
                    (StepOutcome::Failed, e.to_string())
                }
            },
            Err(e) => (StepOutcome::Failed, e.to_string()),
        };

        if let Err(e) = tracker.finish(outcome) {
            tracing::error!("{}", e);
        }
        tracing::debug!(target_name = %target, %step, "step history:\n{}", tracker.history());

        StepResult {
            target,
            step,
            outcome,
            message,
            duration_ms: tracker.elapsed_ms(),
        }
    }

    async fn execute(
        &self,
        implementation: &dyn ReleaseTarget,
        ctx: &StepContext<'_>,
        step: Step,
    ) -> Result<(StepOutcome, String), ReleaseError> {
        let message = match step {
            Step::Build => implementation.build(ctx).await?,
            Step::Verify => implementation.verify(ctx).await?,
            Step::Commit => {
                let probe = implementation.change_probe(ctx);
                let change = self.detector.detect(ctx, &probe).await;

                if change == ChangeStatus::Unchanged && !ctx.config.force() {
                    return Ok((
                        StepOutcome::Skipped,
                        "no changes since last publish".to_string(),
                    ));
                }
                implementation.commit(ctx, change).await?
            }
        };

        Ok((StepOutcome::Success, message))
    }
}

fn steps_label(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" → ")
}
