//! Test doubles shared by unit tests

use crate::core::config::{RunConfig, Settings};
use crate::core::context::{RunContext, StepContext};
use crate::core::model::{ExecutionMode, Target};
use crate::orchestration::github_actions::{ApiError, WorkflowApi, WorkflowRun};
use crate::security::{CommandError, CommandOutput, CommandRunner, CommandSpec, CredentialStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use semver::Version;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Command runner
// ============================================================================

/// Scripted command runner
///
/// Responses are matched by command-line prefix; the longest matching prefix
/// wins and unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    programs: HashSet<String>,
    responses: Vec<(String, CommandOutput)>,
    calls: Mutex<Vec<String>>,
    secret_keys: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs `locate` reports as installed
    pub fn with_programs<I: IntoIterator<Item = &'static str>>(mut self, programs: I) -> Self {
        self.programs.extend(programs.into_iter().map(str::to_string));
        self
    }

    pub fn respond(mut self, prefix: &str, status: i32, stdout: &str) -> Self {
        self.responses.push((
            prefix.to_string(),
            CommandOutput {
                status: Some(status),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    pub fn fail(mut self, prefix: &str, stderr: &str) -> Self {
        self.responses.push((
            prefix.to_string(),
            CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Command lines run so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls starting with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Names of secret environment variables passed to commands
    pub fn secret_keys(&self) -> Vec<String> {
        self.secret_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let line = spec.display();
        self.calls.lock().unwrap().push(line.clone());
        self.secret_keys
            .lock()
            .unwrap()
            .extend(spec.secret_env.iter().map(|(k, _)| k.clone()));

        let response = self
            .responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, output)| output.clone());

        Ok(response.unwrap_or(CommandOutput {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }))
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// Temporary project with a run context around a `FakeRunner`
pub struct Fixture {
    pub dir: TempDir,
    pub runner: Arc<FakeRunner>,
    pub run: RunContext,
    pub config: RunConfig,
}

impl Fixture {
    pub fn new(runner: FakeRunner) -> Self {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(runner);
        let run = RunContext::new(
            dir.path(),
            Settings::default(),
            CredentialStore::default(),
            runner.clone(),
        );
        let config = RunConfig::new(
            [],
            [],
            ExecutionMode::Local,
            Version::new(1, 2, 0),
            "nanodoc",
        )
        .unwrap();

        Self {
            dir,
            runner,
            run,
            config,
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, pairs: &[(&str, &str)]) -> Self {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.run.credentials = CredentialStore::from_env(&env);
        self
    }

    /// Write a file relative to the project root, creating parents
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.dir.path().join(relative).exists()
    }

    pub fn step_context(&self, target: Target) -> StepContext<'_> {
        StepContext::new(&self.config, &self.run, target)
    }
}

/// Run config for the default fixture package
pub fn config(
    targets: &[Target],
    steps: &[crate::core::model::Step],
    mode: ExecutionMode,
) -> RunConfig {
    RunConfig::new(
        targets.iter().copied(),
        steps.iter().copied(),
        mode,
        Version::new(1, 2, 0),
        "nanodoc",
    )
    .unwrap()
}

// ============================================================================
// Workflow API
// ============================================================================

/// Recorded dispatch request
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCall {
    pub workflow: String,
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

/// Scripted workflow API
///
/// Every dispatch creates a run whose status reads come from `script`; once
/// the script is exhausted the last status repeats.
#[derive(Default)]
pub struct FakeWorkflowApi {
    state: Mutex<FakeApiState>,
    /// Status sequence each new run walks through
    script: Vec<(&'static str, Option<&'static str>)>,
    reject_dispatch: Option<u16>,
    /// Listings that miss a freshly dispatched run
    listing_lag: usize,
}

#[derive(Default)]
struct FakeApiState {
    next_id: u64,
    dispatches: Vec<DispatchCall>,
    runs: Vec<WorkflowRun>,
    pending: HashMap<u64, VecDeque<(&'static str, Option<&'static str>)>>,
    lag_remaining: usize,
}

impl FakeWorkflowApi {
    /// Runs that go queued, in progress, then complete with `conclusion`
    pub fn completing(conclusion: &'static str) -> Self {
        Self {
            script: vec![
                ("queued", None),
                ("in_progress", None),
                ("completed", Some(conclusion)),
            ],
            ..Self::default()
        }
    }

    /// Runs that never leave `in_progress`
    pub fn stuck() -> Self {
        Self {
            script: vec![("in_progress", None)],
            ..Self::default()
        }
    }

    /// Dispatch requests fail with this HTTP status
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_dispatch: Some(status),
            ..Self::default()
        }
    }

    /// Add a finished run of the same workflow created `age` before now
    pub fn with_earlier_run(mut self, id: u64, conclusion: &'static str, age: chrono::Duration) -> Self {
        let run = Self::run(id, "completed", Some(conclusion), Utc::now() - age);
        if let Ok(state) = self.state.get_mut() {
            state.runs.push(run);
        }
        self
    }

    /// Hide each new run from the next `listings` run listings
    pub fn with_listing_lag(mut self, listings: usize) -> Self {
        self.listing_lag = listings;
        self
    }

    pub fn dispatches(&self) -> Vec<DispatchCall> {
        self.state.lock().unwrap().dispatches.clone()
    }

    fn run(id: u64, status: &str, conclusion: Option<&str>, created_at: DateTime<Utc>) -> WorkflowRun {
        WorkflowRun {
            id,
            html_url: format!("https://github.com/acme/nanodoc/actions/runs/{}", id),
            status: status.to_string(),
            conclusion: conclusion.map(str::to_string),
            created_at,
            event: "workflow_dispatch".to_string(),
            head_branch: Some("main".to_string()),
        }
    }
}

#[async_trait]
impl WorkflowApi for FakeWorkflowApi {
    async fn dispatch(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        if let Some(status) = self.reject_dispatch {
            return Err(ApiError::Status {
                status,
                body: "Unexpected inputs provided".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.dispatches.push(DispatchCall {
            workflow: workflow.to_string(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        });
        let mut script: VecDeque<_> = self.script.iter().copied().collect();
        let (status, conclusion) = script.front().copied().unwrap_or(("queued", None));
        // Newest first, like the GitHub API
        state.runs.insert(0, Self::run(id, status, conclusion, Utc::now()));
        script.pop_front();
        state.pending.insert(id, script);
        state.lag_remaining = self.listing_lag;
        Ok(())
    }

    async fn list_runs(
        &self,
        _workflow: &str,
        _branch: &str,
        _created_after: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRun>, ApiError> {
        let mut state = self.state.lock().unwrap();
        let newest = state.next_id;
        if state.lag_remaining > 0 {
            state.lag_remaining -= 1;
            return Ok(state.runs.iter().filter(|r| r.id != newest).cloned().collect());
        }
        Ok(state.runs.clone())
    }

    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun, ApiError> {
        let mut state = self.state.lock().unwrap();
        let next = state
            .pending
            .get_mut(&run_id)
            .and_then(|script| if script.len() > 1 { script.pop_front() } else { script.front().copied() });

        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(ApiError::Status {
                status: 404,
                body: "Not Found".to_string(),
            })?;
        if let Some((status, conclusion)) = next {
            run.status = status.to_string();
            run.conclusion = conclusion.map(str::to_string);
        }
        Ok(run.clone())
    }
}
