//! Remote Dispatcher - runs targets as GitHub Actions workflow runs
//!
//! One `workflow_dispatch` per target, sequentially. After dispatching, the
//! created run is located by listing recent dispatch-triggered runs and then
//! polled with bounded backoff. Locating and watching share one wait budget
//! per dispatch. A run that is still going when the budget runs out is
//! reported as `unknown`, never as success.

use super::github_actions::{WorkflowApi, WorkflowRun};
use crate::core::backoff::{BackoffOptions, PollOutcome, Poller};
use crate::core::config::{RunConfig, Settings};
use crate::core::error::ReleaseError;
use crate::core::model::{DispatchResult, HaltPoint, RunReport, StepOutcome, Target};
use crate::core::state_machine::StepTracker;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Tolerated clock difference between this machine and GitHub, in seconds
const CLOCK_SKEW_SECS: i64 = 60;

/// Dispatches and watches remote workflow runs
pub struct RemoteDispatcher {
    api: Arc<dyn WorkflowApi>,
    poll: BackoffOptions,
}

impl RemoteDispatcher {
    pub fn new(api: Arc<dyn WorkflowApi>, poll: BackoffOptions) -> Self {
        Self { api, poll }
    }

    /// Dispatch every selected target, recording results into `report`
    ///
    /// Fails before any dispatch if the release notes cannot be read.
    pub async fn run(
        &self,
        config: &RunConfig,
        settings: &Settings,
        project_dir: &Path,
        report: &mut RunReport,
    ) -> Result<(), ReleaseError> {
        let notes = match config.release_notes() {
            Some(path) => {
                let path = project_dir.join(path);
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ReleaseError::usage(
                        "--release-notes",
                        format!("cannot read {}: {}", path.display(), e),
                    )
                })?;
                Some(content)
            }
            None => None,
        };

        let mut claimed = HashSet::new();
        let mut halted = false;

        for target in config.targets() {
            if halted {
                report.not_started.push(target);
                continue;
            }

            let inputs = Self::inputs(config, target, notes.as_deref());
            let result = self
                .dispatch_target(target, settings, inputs, config, &mut claimed)
                .await;

            println!(
                "{} {}: {}",
                result.outcome.symbol(),
                target,
                result.message
            );

            let stop = !result.outcome.allows_progress() && !config.continue_on_error();
            report.dispatches.push(result);
            if stop {
                report.halted_at = Some(HaltPoint { target, step: None });
                halted = true;
            }
        }

        Ok(())
    }

    /// Polling options for whatever is left of the budget ending at `deadline`
    fn remaining(&self, deadline: Instant) -> BackoffOptions {
        BackoffOptions {
            max_wait: deadline.saturating_duration_since(Instant::now()),
            ..self.poll.clone()
        }
    }

    /// Workflow inputs for one target
    pub fn inputs(
        config: &RunConfig,
        target: Target,
        release_notes: Option<&str>,
    ) -> BTreeMap<String, String> {
        let steps: Vec<&str> = config.steps().map(|s| s.as_str()).collect();

        let mut inputs = BTreeMap::from([
            ("publish_to".to_string(), target.channel().to_string()),
            ("steps".to_string(), steps.join(",")),
            ("force_update".to_string(), config.force().to_string()),
            ("version".to_string(), config.version().to_string()),
            ("package_name".to_string(), config.package_name().to_string()),
        ]);
        if let Some(notes) = release_notes {
            inputs.insert("release_notes".to_string(), notes.to_string());
        }
        inputs
    }

    async fn dispatch_target(
        &self,
        target: Target,
        settings: &Settings,
        inputs: BTreeMap<String, String>,
        config: &RunConfig,
        claimed: &mut HashSet<u64>,
    ) -> DispatchResult {
        let workflow = settings.workflow_for(target).to_string();
        let mut tracker = StepTracker::new(target, None);
        let mut result = DispatchResult {
            target,
            workflow: workflow.clone(),
            steps: config.steps().collect(),
            run_id: None,
            run_url: None,
            outcome: StepOutcome::Failed,
            message: String::new(),
        };

        if let Err(e) = tracker.start() {
            result.message = e.to_string();
            return result;
        }

        println!("\n🚀 Dispatching {} for {}...", workflow, target);
        let dispatched_at = Utc::now();
        let deadline = Instant::now() + self.poll.max_wait;
        if let Err(e) = self.api.dispatch(&workflow, &settings.git_ref, &inputs).await {
            let error = ReleaseError::DispatchFailed {
                target,
                message: e.to_string(),
            };
            tracing::error!("{}", error);
            result.message = error.to_string();
            let _ = tracker.finish(StepOutcome::Failed);
            return result;
        }

        let run = match self
            .locate_run(&workflow, &settings.git_ref, dispatched_at, deadline, claimed)
            .await
        {
            Some(run) => run,
            None => {
                result.outcome = StepOutcome::Unknown;
                result.message = format!(
                    "dispatched, but no run of {} appeared within {}s",
                    workflow,
                    self.poll.max_wait.as_secs()
                );
                let _ = tracker.finish(StepOutcome::Unknown);
                return result;
            }
        };

        claimed.insert(run.id);
        result.run_id = Some(run.id);
        result.run_url = Some(run.html_url.clone());
        println!("   ⏳ Watching {}", run.html_url);

        let (outcome, message) = self.watch_run(target, run, deadline).await;
        result.outcome = outcome;
        result.message = message;

        if let Err(e) = tracker.finish(outcome) {
            tracing::error!("{}", e);
        }
        result
    }

    /// Find the run created by our dispatch
    ///
    /// Newest unclaimed run on the ref created at or after the dispatch.
    /// Runs up to `CLOCK_SKEW_SECS` older are accepted only once the first
    /// listing came back empty. Listing errors are logged and retried.
    async fn locate_run(
        &self,
        workflow: &str,
        git_ref: &str,
        dispatched_at: DateTime<Utc>,
        deadline: Instant,
        claimed: &HashSet<u64>,
    ) -> Option<WorkflowRun> {
        let api = &self.api;
        let since = dispatched_at - chrono::Duration::seconds(CLOCK_SKEW_SECS);
        let poller = Poller::new(self.remaining(deadline));
        let mut listings = 0u32;

        let outcome = poller
            .until(|| {
                listings += 1;
                let earliest = if listings > 1 { since } else { dispatched_at };
                async move {
                    match api.list_runs(workflow, git_ref, since).await {
                        Ok(runs) => {
                            let unclaimed = runs.iter().filter(|run| !claimed.contains(&run.id));
                            unclaimed
                                .clone()
                                .find(|run| run.created_at >= dispatched_at)
                                .or_else(|| unclaimed.clone().find(|run| run.created_at >= earliest))
                                .cloned()
                        }
                        Err(e) => {
                            tracing::warn!("listing workflow runs failed: {}", e);
                            None
                        }
                    }
                }
            })
            .await;

        match outcome {
            PollOutcome::Ready(run) => Some(run),
            PollOutcome::TimedOut { .. } => None,
        }
    }

    /// Poll a run until it completes or the budget is spent
    async fn watch_run(
        &self,
        target: Target,
        run: WorkflowRun,
        deadline: Instant,
    ) -> (StepOutcome, String) {
        let api = &self.api;
        let run_id = run.id;
        let last_seen = Mutex::new(run);
        let last_seen_ref = &last_seen;
        let poller = Poller::new(self.remaining(deadline));

        let outcome = poller
            .until(|| async move {
                match api.get_run(run_id).await {
                    Ok(run) => {
                        tracing::debug!(run_id, status = %run.status, "workflow run status");
                        let completed = run.is_completed();
                        if let Ok(mut guard) = last_seen_ref.lock() {
                            *guard = run.clone();
                        }
                        completed.then_some(run)
                    }
                    Err(e) => {
                        tracing::warn!(run_id, "polling workflow run failed: {}", e);
                        None
                    }
                }
            })
            .await;

        match outcome {
            PollOutcome::Ready(run) => {
                let conclusion = run.conclusion.as_deref().unwrap_or("unknown");
                (run.outcome(), format!("run {} concluded: {}", run.id, conclusion))
            }
            PollOutcome::TimedOut { waited, probes } => {
                let status = last_seen
                    .lock()
                    .map(|run| run.status.clone())
                    .unwrap_or_else(|_| "unknown".to_string());
                let error = ReleaseError::PollTimeout { target, waited };
                tracing::warn!(probes, "{}", error);
                (
                    StepOutcome::Unknown,
                    format!(
                        "run {} still {} after {}s; check it on GitHub",
                        run_id,
                        status,
                        waited.as_secs()
                    ),
                )
            }
        }
    }
}
