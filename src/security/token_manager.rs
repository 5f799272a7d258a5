//! Credential store with memory-safe handling and masking capabilities
//!
//! Tokens are read once from the process environment at startup and kept as
//! `SecretString`s. They only leave the store as environment variables of a
//! child process or as an HTTP `Authorization` header.

use crate::core::error::ReleaseError;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;

/// Credentials a release may need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Upload token for the package index
    PackageIndex,
    /// GitHub token for releases and workflow dispatch
    GitHub,
}

impl CredentialKind {
    /// Environment variables that may carry this credential, in priority order
    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            CredentialKind::PackageIndex => &["PYPI_TOKEN", "POETRY_PYPI_TOKEN_PYPI"],
            CredentialKind::GitHub => &["GITHUB_TOKEN", "GH_TOKEN"],
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.variables().join("|"))
    }
}

/// Tokens available to this run
///
/// # Examples
///
/// ```
/// use release_publisher::security::{CredentialKind, CredentialStore};
/// use std::collections::HashMap;
///
/// let env = HashMap::from([("GH_TOKEN".to_string(), "ghp_example_token".to_string())]);
/// let store = CredentialStore::from_env(&env);
/// assert!(store.get(CredentialKind::GitHub).is_some());
/// assert!(store.get(CredentialKind::PackageIndex).is_none());
/// ```
#[derive(Default)]
pub struct CredentialStore {
    tokens: HashMap<CredentialKind, SecretString>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("kinds", &self.tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialStore {
    /// Collect credentials from an environment snapshot
    ///
    /// Empty values count as unset.
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let mut tokens = HashMap::new();

        for kind in [CredentialKind::PackageIndex, CredentialKind::GitHub] {
            let value = kind
                .variables()
                .iter()
                .filter_map(|name| env.get(*name))
                .find(|value| !value.trim().is_empty());
            if let Some(value) = value {
                tokens.insert(kind, SecretString::new(value.clone().into()));
            }
        }

        Self { tokens }
    }

    pub fn get(&self, kind: CredentialKind) -> Option<&SecretString> {
        self.tokens.get(&kind)
    }

    pub fn has(&self, kind: CredentialKind) -> bool {
        self.tokens.contains_key(&kind)
    }

    /// Get a credential or fail naming the variables that would provide it
    pub fn require(&self, kind: CredentialKind) -> Result<&SecretString, ReleaseError> {
        self.get(kind).ok_or_else(|| ReleaseError::CredentialMissing {
            variables: kind.variables().iter().map(|v| v.to_string()).collect(),
        })
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    pub fn mask_token(token: &str) -> String {
        if token.chars().count() < 10 {
            return "****".to_string();
        }

        let prefix: String = token.chars().take(3).collect();
        let suffix: String = token
            .chars()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks every held token in a string
    ///
    /// Applied to tool output before it is logged or stored in a report.
    pub fn mask_in(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for token in self.tokens.values() {
            let token_str = token.expose_secret();
            if let Ok(regex) = Regex::new(&regex::escape(token_str)) {
                let masked_token = Self::mask_token(token_str);
                masked = regex
                    .replace_all(&masked, masked_token.as_str())
                    .into_owned();
            }
        }

        masked
    }
}
