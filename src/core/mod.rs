pub mod backoff;
pub mod config;
pub mod config_loader;
pub mod context;
pub mod error;
pub mod model;
pub mod project;
pub mod state_machine;
pub mod traits;

pub use backoff::{Backoff, BackoffOptions, PollOutcome, Poller};
pub use config::{PollSettings, RunConfig, Settings, WorkflowSettings};
pub use config_loader::{CONFIG_FILENAME, SettingsLoadOptions, SettingsLoader};
pub use context::{RunContext, StepContext};
pub use error::ReleaseError;
pub use model::*;
pub use project::ProjectMetadata;
pub use state_machine::{StateTransition, StepState, StepTracker};
pub use traits::*;
