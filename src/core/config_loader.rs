//! Settings file loader
//!
//! Priority (high to low):
//! 1. Environment variables (`RELEASE_REPOSITORY`, `GITHUB_REPOSITORY`,
//!    `RELEASE_WORKFLOW`, `RELEASE_REF`)
//! 2. Explicit `--config` file, else `<project>/.release-config.yaml`
//! 3. Default values
//!
//! String values may reference environment variables as `${VAR_NAME}`.

use super::config::Settings;
use crate::core::error::ReleaseError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".release-config.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Largest accepted `poll.multiplier`
const MAX_POLL_MULTIPLIER: f64 = 10.0;

/// Settings load options
#[derive(Debug, Clone)]
pub struct SettingsLoadOptions {
    /// Project root
    pub project_path: PathBuf,

    /// File passed with `--config`; must exist when given
    pub explicit_path: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Settings loader
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from file and environment
    pub async fn load(options: SettingsLoadOptions) -> Result<Settings, ReleaseError> {
        let mut settings = match &options.explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ReleaseError::config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::load_file(path).await?
            }
            None => {
                let path = options.project_path.join(CONFIG_FILENAME);
                if path.exists() {
                    Self::load_file(&path).await?
                } else {
                    tracing::debug!("no {} found, using defaults", CONFIG_FILENAME);
                    Settings::default()
                }
            }
        };

        Self::apply_env_overrides(&mut settings, &options.env);
        Self::expand_env_vars(&mut settings, &options.env)?;
        Self::validate(&settings)?;

        Ok(settings)
    }

    async fn load_file(path: &Path) -> Result<Settings, ReleaseError> {
        tracing::debug!("loading settings from {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| {
            ReleaseError::config(format!("failed to read {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            ReleaseError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn apply_env_overrides(settings: &mut Settings, env: &HashMap<String, String>) {
        // RELEASE_REPOSITORY wins over the slug GitHub Actions exports
        if let Some(repository) = env
            .get("RELEASE_REPOSITORY")
            .or_else(|| env.get("GITHUB_REPOSITORY"))
            .filter(|v| !v.is_empty())
        {
            settings.repository = Some(repository.clone());
        }

        if let Some(workflow) = env.get("RELEASE_WORKFLOW").filter(|v| !v.is_empty()) {
            settings.workflows.default = workflow.clone();
        }

        if let Some(git_ref) = env.get("RELEASE_REF").filter(|v| !v.is_empty()) {
            settings.git_ref = git_ref.clone();
        }
    }

    /// Expand `${VAR}` references in string settings
    fn expand_env_vars(
        settings: &mut Settings,
        env: &HashMap<String, String>,
    ) -> Result<(), ReleaseError> {
        let pattern = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| ReleaseError::config(format!("invalid env pattern: {}", e)))?;

        let expand = |value: &str| -> Result<String, ReleaseError> {
            let mut missing = None;
            let expanded = pattern.replace_all(value, |caps: &regex::Captures| {
                let name = &caps[1];
                env.get(name).cloned().unwrap_or_else(|| {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                })
            });
            match missing {
                Some(name) => Err(ReleaseError::config(format!(
                    "environment variable {} referenced in settings is not set",
                    name
                ))),
                None => Ok(expanded.into_owned()),
            }
        };

        if let Some(repository) = &settings.repository {
            settings.repository = Some(expand(repository)?);
        }
        settings.git_ref = expand(&settings.git_ref)?;
        settings.api_url = expand(&settings.api_url)?;
        settings.index_url = expand(&settings.index_url)?;
        settings.workflows.default = expand(&settings.workflows.default)?;
        for workflow in settings.workflows.overrides.values_mut() {
            *workflow = expand(workflow)?;
        }

        Ok(())
    }

    fn validate(settings: &Settings) -> Result<(), ReleaseError> {
        if let Some(repository) = &settings.repository {
            let mut parts = repository.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
            );
            if !valid {
                return Err(ReleaseError::config(format!(
                    "repository must be 'owner/name', got '{}'",
                    repository
                )));
            }
        }

        for key in settings.workflows.overrides.keys() {
            key.parse::<crate::core::model::Target>()
                .map_err(|e| ReleaseError::config(format!("workflows.overrides: {}", e)))?;
        }

        if settings.poll.max_wait_secs == 0 {
            return Err(ReleaseError::config("poll.max_wait_secs must be positive"));
        }

        let multiplier = settings.poll.multiplier;
        if !multiplier.is_finite() || multiplier > MAX_POLL_MULTIPLIER {
            return Err(ReleaseError::config(format!(
                "poll.multiplier must be a number no greater than {}, got {}",
                MAX_POLL_MULTIPLIER, multiplier
            )));
        }

        Ok(())
    }
}
