//! Change Detector - decides whether a commit step has anything to do
//!
//! Each target names a probe; the detector runs it and answers changed or
//! unchanged. A probe that cannot give an answer counts as changed, so the
//! commit runs and the operator sees the tool's own verdict.

use crate::core::context::StepContext;
use crate::core::traits::{ChangeProbe, ChangeStatus};
use crate::security::{CommandSpec, CredentialKind};
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use std::time::Duration;

const USER_AGENT: &str = concat!("release-publisher/", env!("CARGO_PKG_VERSION"));

/// Runs change probes
pub struct ChangeDetector {
    http: Client,
}

impl ChangeDetector {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Answer `probe`; errors are logged and count as changed
    pub async fn detect(&self, ctx: &StepContext<'_>, probe: &ChangeProbe) -> ChangeStatus {
        match self.run_probe(ctx, probe).await {
            Ok(status) => {
                tracing::debug!(target_name = %ctx.target, ?probe, %status, "change probe");
                status
            }
            Err(message) => {
                tracing::warn!(
                    target_name = %ctx.target,
                    "change probe failed, assuming changed: {}",
                    ctx.credentials().mask_in(&message)
                );
                ChangeStatus::Changed
            }
        }
    }

    async fn run_probe(
        &self,
        ctx: &StepContext<'_>,
        probe: &ChangeProbe,
    ) -> Result<ChangeStatus, String> {
        match probe {
            ChangeProbe::IndexVersion { url } => self.index_has_version(url).await,
            ChangeProbe::ReleaseTag { tag } => {
                let mut spec = CommandSpec::new("gh").args(["release", "view", tag.as_str()]);
                if let Some(token) = ctx.credentials().get(CredentialKind::GitHub) {
                    spec = spec.secret_env("GH_TOKEN", SecretString::clone(token));
                }
                let output = ctx.probe(&spec).await.map_err(|e| e.to_string())?;
                if output.success() {
                    Ok(ChangeStatus::Unchanged)
                } else if output.stderr.contains("release not found") {
                    Ok(ChangeStatus::Changed)
                } else {
                    Err(format!("gh release view: {}", output.failure_summary()))
                }
            }
            ChangeProbe::WorkingTree { paths } => {
                let spec = CommandSpec::new("git")
                    .args(["status", "--porcelain", "--"])
                    .args(paths.iter().map(|p| p.to_string_lossy().into_owned()));
                let output = ctx.probe(&spec).await.map_err(|e| e.to_string())?;
                if !output.success() {
                    return Err(format!("git status: {}", output.failure_summary()));
                }
                if output.stdout.trim().is_empty() {
                    Ok(ChangeStatus::Unchanged)
                } else {
                    Ok(ChangeStatus::Changed)
                }
            }
        }
    }

    async fn index_has_version(&self, url: &str) -> Result<ChangeStatus, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("GET {}: {}", url, e))?;

        match response.status() {
            StatusCode::OK => Ok(ChangeStatus::Unchanged),
            StatusCode::NOT_FOUND => Ok(ChangeStatus::Changed),
            status => Err(format!("GET {}: HTTP {}", url, status)),
        }
    }
}
