//! Shared plumbing for OS package targets
//!
//! Both OS packages are generated by scripts into directories tracked by
//! this repository, so committing them means a scoped git commit.

use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::model::Step;
use crate::security::CommandSpec;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Arguments every packaging script receives
pub fn script_args(ctx: &StepContext<'_>) -> Vec<String> {
    let mut args = vec![
        ctx.config.package_name().to_string(),
        format!("--version={}", ctx.config.version()),
    ];
    if ctx.config.force() {
        args.push("--force".to_string());
    }
    args
}

/// Run a packaging script for `step`
pub async fn run_script(
    ctx: &StepContext<'_>,
    step: Step,
    script: &Path,
    args: Vec<String>,
) -> Result<(), ReleaseError> {
    let spec = CommandSpec::new(script.to_string_lossy()).args(args);
    ctx.exec(step, spec).await?;
    Ok(())
}

/// Stage `paths` and commit them alone
///
/// Returns `Ok` without committing when staging leaves nothing to record,
/// which happens for forced commits of an unchanged tree.
pub async fn commit_paths(
    ctx: &StepContext<'_>,
    paths: &[PathBuf],
    message: &str,
) -> Result<String, ReleaseError> {
    let pathspec: Vec<String> = paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    ctx.exec(
        Step::Commit,
        CommandSpec::new("git")
            .args(["add", "--all", "--"])
            .args(pathspec.iter().cloned()),
    )
    .await?;

    let staged = ctx
        .probe(
            &CommandSpec::new("git")
                .args(["diff", "--cached", "--quiet", "--"])
                .args(pathspec.iter().cloned()),
        )
        .await
        .map_err(|e| ReleaseError::step(ctx.target, Step::Commit, e.to_string()))?;

    match staged.status {
        Some(0) => {
            tracing::info!(target_name = %ctx.target, "nothing staged, skipping git commit");
            return Ok("no changes to record".to_string());
        }
        Some(1) => {}
        _ => {
            return Err(ReleaseError::step(
                ctx.target,
                Step::Commit,
                format!("git diff --cached failed: {}", staged.failure_summary()),
            ));
        }
    }

    ctx.exec(
        Step::Commit,
        CommandSpec::new("git")
            .args(["commit", "-m", message, "--"])
            .args(pathspec),
    )
    .await?;

    Ok(format!("committed: {}", message))
}

/// Remove `<package>_<version>` directories left by other versions
///
/// Returns the removed directory names.
pub async fn remove_stale_versions(
    output_dir: &Path,
    package: &str,
    version: &str,
) -> Result<Vec<String>, ReleaseError> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }

    let prefix = format!("{}_", package);
    let current = format!("{}_{}", package, version);
    let mut removed = Vec::new();

    let mut entries = fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type().await?.is_dir() || name == current {
            continue;
        }
        // `nano_doc_3.0.0` belongs to package `nano_doc`, not `nano`
        match name.strip_prefix(&prefix) {
            Some(rest) if is_version_suffix(rest) => {}
            _ => continue,
        }
        tracing::debug!("removing stale package directory {}", name);
        fs::remove_dir_all(entry.path()).await?;
        removed.push(name);
    }

    removed.sort();
    Ok(removed)
}

/// Whether a directory name suffix reads as a package version
///
/// Accepts semver, PEP 440 and Debian spellings such as `1.2.0`, `1.0.0a1`
/// and `1.2.0-1`.
fn is_version_suffix(rest: &str) -> bool {
    rest.starts_with(|c: char| c.is_ascii_digit())
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '~'))
}
