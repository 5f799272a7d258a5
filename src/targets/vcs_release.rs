//! GitHub release target - `gh release create` with the built distributions

use super::index::distributions;
use crate::core::context::StepContext;
use crate::core::error::ReleaseError;
use crate::core::model::{Step, Target};
use crate::core::traits::{ChangeProbe, ChangeStatus, ReleaseTarget, Requirement};
use crate::security::{CommandSpec, CredentialKind};
use async_trait::async_trait;
use secrecy::SecretString;
use std::path::PathBuf;
use tokio::fs;

/// Environment variable `gh` reads its token from
const GH_TOKEN_VAR: &str = "GH_TOKEN";

/// GitHub release target
#[derive(Debug, Default)]
pub struct VcsReleaseTarget;

impl VcsReleaseTarget {
    pub fn new() -> Self {
        Self
    }

    /// Where build stages the release notes for this version
    fn staged_notes(&self, ctx: &StepContext<'_>) -> PathBuf {
        ctx.settings()
            .staging_dir
            .join(format!("release-notes-{}.md", ctx.config.tag()))
    }

    /// Notes file to publish
    ///
    /// A `--release-notes` file wins unless this run's build step staged it.
    /// Without the flag, a copy staged by an earlier build is used.
    fn notes_source(&self, ctx: &StepContext<'_>) -> Option<PathBuf> {
        if let Some(notes) = ctx.config.release_notes() {
            if !ctx.config.runs_step(Step::Build) {
                return Some(notes.to_path_buf());
            }
        }
        let staged = self.staged_notes(ctx);
        if ctx.project_dir().join(&staged).is_file() {
            return Some(staged);
        }
        ctx.config.release_notes().map(|p| p.to_path_buf())
    }

    fn gh(&self, ctx: &StepContext<'_>) -> CommandSpec {
        let spec = CommandSpec::new("gh");
        match ctx.credentials().get(CredentialKind::GitHub) {
            Some(token) => spec.secret_env(GH_TOKEN_VAR, SecretString::clone(token)),
            None => spec,
        }
    }
}

#[async_trait]
impl ReleaseTarget for VcsReleaseTarget {
    fn target(&self) -> Target {
        Target::VcsRelease
    }

    fn artifact_paths(&self, ctx: &StepContext<'_>) -> Vec<PathBuf> {
        vec![self.staged_notes(ctx), ctx.settings().dist_dir.clone()]
    }

    fn requirements(&self, _ctx: &StepContext<'_>, step: Step) -> Vec<Requirement> {
        match step {
            Step::Build => Vec::new(),
            Step::Verify => vec![Requirement::Program("gh")],
            Step::Commit => vec![
                Requirement::Program("gh"),
                Requirement::Credential(CredentialKind::GitHub),
            ],
        }
    }

    fn change_probe(&self, ctx: &StepContext<'_>) -> ChangeProbe {
        ChangeProbe::ReleaseTag {
            tag: ctx.config.tag(),
        }
    }

    async fn build(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        let staged = ctx.project_dir().join(self.staged_notes(ctx));
        let fail = |message: String| ReleaseError::step(Target::VcsRelease, Step::Build, message);

        let Some(notes) = ctx.config.release_notes() else {
            if staged.exists() {
                fs::remove_file(&staged).await?;
            }
            return Ok("release notes will be generated from commits".to_string());
        };

        let source = ctx.project_dir().join(notes);
        let content = fs::read_to_string(&source)
            .await
            .map_err(|e| fail(format!("cannot read {}: {}", source.display(), e)))?;
        if content.trim().is_empty() {
            return Err(fail(format!("{} is empty", notes.display())));
        }

        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&staged, content).await?;

        Ok(format!("staged release notes from {}", notes.display()))
    }

    async fn verify(&self, ctx: &StepContext<'_>) -> Result<String, ReleaseError> {
        ctx.exec(Step::Verify, self.gh(ctx).args(["auth", "status"]))
            .await?;

        if let Some(notes) = self.notes_source(ctx) {
            if !ctx.project_dir().join(&notes).is_file() {
                return Err(ReleaseError::step(
                    Target::VcsRelease,
                    Step::Verify,
                    format!("release notes {} not found", notes.display()),
                ));
            }
        }

        let assets = distributions(ctx).await?;
        Ok(format!(
            "gh authenticated, {} asset(s) to attach",
            assets.len()
        ))
    }

    async fn commit(
        &self,
        ctx: &StepContext<'_>,
        change: ChangeStatus,
    ) -> Result<String, ReleaseError> {
        let tag = ctx.config.tag();
        let notes = self.notes_source(ctx);
        let assets: Vec<String> = distributions(ctx)
            .await?
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        if change == ChangeStatus::Unchanged {
            // Forced run against an existing release: refresh it in place
            if !assets.is_empty() {
                ctx.exec(
                    Step::Commit,
                    self.gh(ctx)
                        .args(["release", "upload", tag.as_str(), "--clobber"])
                        .args(assets.iter().cloned()),
                )
                .await?;
            }
            if let Some(notes) = &notes {
                ctx.exec(
                    Step::Commit,
                    self.gh(ctx)
                        .args(["release", "edit", tag.as_str(), "--notes-file"])
                        .arg(notes.to_string_lossy()),
                )
                .await?;
            }
            return Ok(format!(
                "updated release {} ({} asset(s))",
                tag,
                assets.len()
            ));
        }

        let mut spec = self.gh(ctx).args([
            "release".to_string(),
            "create".to_string(),
            tag.clone(),
            "--title".to_string(),
            format!("Release {}", tag),
        ]);
        spec = match &notes {
            Some(notes) => spec.arg("--notes-file").arg(notes.to_string_lossy()),
            None => spec.arg("--generate-notes"),
        };
        ctx.exec(Step::Commit, spec.args(assets.iter().cloned()))
            .await?;

        Ok(format!("created release {} ({} asset(s))", tag, assets.len()))
    }
}
