//! Package name validation
//!
//! Names end up in file paths (`Formula/<name>.rb`, `<name>_<version>/`),
//! commit messages and index URLs, so only distribution-safe identifiers are
//! accepted: ASCII alphanumerics with inner `.`, `_` and `-`.

use regex::Regex;
use std::sync::OnceLock;

const NAME_PATTERN: &str = r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$";

/// Maximum accepted name length
const MAX_NAME_LENGTH: usize = 214;

fn name_regex() -> Result<&'static Regex, String> {
    static REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(NAME_PATTERN))
        .as_ref()
        .map_err(|e| format!("invalid name pattern: {}", e))
}

/// Validator for package names
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageNameValidator;

impl PackageNameValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("package name must not be empty".to_string());
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(format!(
                "package name is {} characters long (max {})",
                name.len(),
                MAX_NAME_LENGTH
            ));
        }

        if !name_regex()?.is_match(name) {
            return Err(format!(
                "'{}' is not a valid package name (letters, digits, '.', '_' and '-'; \
                 must start and end with a letter or digit)",
                name
            ));
        }

        Ok(())
    }
}

/// `clap` value parser for `--package-name`
pub fn parse_package_name(value: &str) -> Result<String, String> {
    PackageNameValidator::new().validate(value)?;
    Ok(value.to_string())
}
