pub mod name_validator;
pub mod tool_checker;
pub mod version_validator;

pub use name_validator::{PackageNameValidator, parse_package_name};
pub use tool_checker::ToolChecker;
pub use version_validator::{VersionValidator, parse_version};
