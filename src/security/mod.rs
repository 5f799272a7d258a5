pub mod command_executor;
pub mod token_manager;

pub use command_executor::{
    CommandError, CommandOutput, CommandRunner, CommandSpec, SafeCommandExecutor,
};
pub use token_manager::{CredentialKind, CredentialStore};
