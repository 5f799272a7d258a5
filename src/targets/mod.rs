pub mod apt;
pub mod brew;
pub mod index;
pub mod os_package;
pub mod registry;
pub mod vcs_release;

pub use apt::AptTarget;
pub use brew::BrewTarget;
pub use index::IndexTarget;
pub use registry::TargetRegistry;
pub use vcs_release::VcsReleaseTarget;
