//! Version Validator - Validates semantic versioning (semver)
//!
//! Release versions must follow Semantic Versioning 2.0.0. The tag is derived
//! from the version (`v1.2.3`), so a leading `v` on input is rejected with a
//! hint instead of being silently stripped.
//!
//! # Example
//!
//! ```
//! use release_publisher::validation::VersionValidator;
//!
//! let validator = VersionValidator::new();
//! let version = validator.parse("1.2.3").unwrap();
//!
//! assert_eq!(version.major, 1);
//! assert!(validator.parse("v1.2.3").is_err());
//! ```

use semver::Version;

/// Validator for semantic versioning
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionValidator;

impl VersionValidator {
    pub fn new() -> Self {
        Self
    }

    /// Parse a release version
    ///
    /// Returns a message suitable for a usage error on failure.
    pub fn parse(&self, version_str: &str) -> Result<Version, String> {
        let trimmed = version_str.trim();

        if trimmed.is_empty() {
            return Err("version must not be empty".to_string());
        }

        if let Some(rest) = trimmed.strip_prefix(['v', 'V']) {
            if Version::parse(rest).is_ok() {
                return Err(format!(
                    "'{}' is a tag, not a version; pass '{}'",
                    trimmed, rest
                ));
            }
        }

        Version::parse(trimmed)
            .map_err(|e| format!("'{}' is not a semantic version: {}", trimmed, e))
    }

    /// Check if version is a prerelease
    pub fn is_prerelease(&self, version: &Version) -> bool {
        !version.pre.is_empty()
    }
}

/// `clap` value parser for `--version`
pub fn parse_version(value: &str) -> Result<Version, String> {
    VersionValidator::new().parse(value)
}
