//! Orchestration layer for release runs
//!
//! Local runs go through the `Orchestrator` step by step; remote runs are
//! handed to the `RemoteDispatcher`, which drives GitHub Actions.

pub mod change_detector;
pub mod github_actions;
pub mod journal;
pub mod orchestrator;
pub mod remote_dispatcher;
pub mod report;

// Re-export main types for convenience
pub use change_detector::ChangeDetector;
pub use github_actions::{
    ApiError, GitHubActionsClient, WorkflowApi, WorkflowRun, parse_github_slug, resolve_repository,
};
pub use journal::{JOURNAL_FILE, RunJournal};
pub use orchestrator::Orchestrator;
pub use remote_dispatcher::RemoteDispatcher;
pub use report::print_summary;
