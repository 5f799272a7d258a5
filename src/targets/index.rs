//! Package index target - `poetry build` / `poetry publish`

use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::model::{Step, Target};
use crate::core::traits::{ChangeProbe, ChangeStatus, ReleaseTarget, Requirement};
use crate::security::{CommandSpec, CredentialKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable poetry reads the PyPI token from
const POETRY_TOKEN_VAR: &str = "POETRY_PYPI_TOKEN_PYPI";

/// Package index (PyPI) target
#[derive(Debug, Default)]
pub struct IndexTarget;

impl IndexTarget {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReleaseTarget for IndexTarget {
    fn target(&self) -> Target {
        Target::Index
    }

    fn artifact_paths(&self, ctx: &StepContext<'_>) -> Vec<PathBuf> {
        vec![ctx.settings().dist_dir.clone()]
    }

    fn requirements(&self, _ctx: &StepContext<'_>, step: Step) -> Vec<Requirement> {
        match step {
            Step::Build | Step::Verify => vec![Requirement::Program("poetry")],
            Step::Commit => vec![
                Requirement::Program("poetry"),
                Requirement::Credential(CredentialKind::PackageIndex),
            ],
        }
    }

    fn change_probe(&self, ctx: &StepContext<'_>) -> ChangeProbe {
        ChangeProbe::IndexVersion {
            url: format!(
                "{}/pypi/{}/{}/json",
                ctx.settings().index_url.trim_end_matches('/'),
                ctx.config.package_name(),
                ctx.config.version()
            ),
        }
    }

    async fn build(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        let dist_dir = ctx.project_dir().join(&ctx.settings().dist_dir);
        let stale = remove_stale_distributions(
            &dist_dir,
            ctx.config.package_name(),
            &ctx.config.version().to_string(),
        )
        .await
        .map_err(|e| ReleaseError::step(Target::Index, Step::Build, e.to_string()))?;
        if !stale.is_empty() {
            tracing::info!("removed stale distributions: {}", stale.join(", "));
        }

        ctx.exec(Step::Build, CommandSpec::new("poetry").arg("build"))
            .await?;

        let built = distributions(ctx).await?;
        if built.is_empty() {
            return Err(ReleaseError::step(
                Target::Index,
                Step::Build,
                format!(
                    "poetry build produced no distributions for version {}; \
                     does pyproject.toml declare it?",
                    ctx.config.version()
                ),
            ));
        }

        Ok(format!("built {} distribution(s)", built.len()))
    }

    async fn verify(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        ctx.exec(Step::Verify, CommandSpec::new("poetry").arg("check"))
            .await?;

        let built = distributions(ctx).await?;
        if built.is_empty() {
            return Err(ReleaseError::step(
                Target::Index,
                Step::Verify,
                format!(
                    "no distributions for {} {} in {}",
                    ctx.config.package_name(),
                    ctx.config.version(),
                    ctx.settings().dist_dir.display()
                ),
            ));
        }

        Ok(format!(
            "metadata valid, {} distribution(s) ready",
            built.len()
        ))
    }

    async fn commit(
        &self,
        ctx: &StepContext<'_>,
        change: ChangeStatus,
    ) -> Result<String, ReleaseError> {
        let token = ctx
            .credentials()
            .require(CredentialKind::PackageIndex)
            .map_err(|e| ReleaseError::step(Target::Index, Step::Commit, e.to_string()))?;

        let mut spec = CommandSpec::new("poetry")
            .arg("publish")
            .secret_env(POETRY_TOKEN_VAR, token.clone());
        if change == ChangeStatus::Unchanged {
            // Forced re-publish of a version the index already has
            spec = spec.arg("--skip-existing");
        }
        ctx.exec(Step::Commit, spec).await?;

        Ok(format!(
            "published {} {} to {}",
            ctx.config.package_name(),
            ctx.config.version(),
            ctx.settings().index_url
        ))
    }
}

// ============================================================================
// Distribution files
// ============================================================================

/// Distribution files for the configured package and version, sorted
///
/// Paths are relative to the project root.
pub(crate) async fn distributions(ctx: &StepContext<'_>) -> Result<Vec<PathBuf>, ReleaseError> {
    let relative = &ctx.settings().dist_dir;
    let dir = ctx.project_dir().join(relative);
    let version = normalize_version(&ctx.config.version().to_string());

    let mut found = Vec::new();
    for name in list_files(&dir).await? {
        if dist_version(&name, ctx.config.package_name()).as_deref() == Some(version.as_str()) {
            found.push(relative.join(name));
        }
    }
    found.sort();
    Ok(found)
}

async fn list_files(dir: &Path) -> Result<Vec<String>, ReleaseError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Delete this package's distributions of any other version
async fn remove_stale_distributions(
    dir: &Path,
    package: &str,
    version: &str,
) -> Result<Vec<String>, ReleaseError> {
    let version = normalize_version(version);
    let mut removed = Vec::new();

    for name in list_files(dir).await? {
        match dist_version(&name, package) {
            Some(found) if found != version => {
                fs::remove_file(dir.join(&name)).await?;
                removed.push(name);
            }
            _ => {}
        }
    }

    removed.sort();
    Ok(removed)
}

/// Version encoded in a wheel or sdist file name, normalized
fn dist_version(file_name: &str, package: &str) -> Option<String> {
    let lower = file_name.to_lowercase();
    let package = package.to_lowercase();
    let normalized_package: String = package
        .chars()
        .map(|c| if matches!(c, '-' | '.') { '_' } else { c })
        .collect();

    let rest = [normalized_package.as_str(), package.as_str()]
        .iter()
        .find_map(|prefix| lower.strip_prefix(&format!("{}-", prefix)))?;

    let version = if let Some(v) = rest.strip_suffix(".tar.gz") {
        v
    } else if let Some(v) = rest.strip_suffix(".zip") {
        v
    } else if rest.ends_with(".whl") {
        rest.split('-').next()?
    } else {
        return None;
    };

    Some(normalize_version(version))
}

/// Bring semver and PEP 440 spellings of a version together
///
/// `1.0.0-alpha.1` and `1.0.0a1` both become `1.0.0a1`.
fn normalize_version(version: &str) -> String {
    let lower = version
        .to_lowercase()
        .replace("alpha", "a")
        .replace("beta", "b");
    let chars: Vec<char> = lower.chars().collect();

    chars
        .iter()
        .enumerate()
        .filter(|&(i, c)| {
            let separator = matches!(*c, '-' | '_' | '.');
            let next_to_letter = chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic())
                || (i > 0 && chars[i - 1].is_ascii_alphabetic());
            !(separator && next_to_letter)
        })
        .map(|(_, c)| *c)
        .collect()
}
