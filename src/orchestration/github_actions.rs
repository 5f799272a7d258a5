//! GitHub Actions client - workflow dispatch and run status
//!
//! Only the three REST calls the remote dispatcher needs are wrapped:
//! create a `workflow_dispatch` event, list runs of a workflow, and read a
//! single run.

use crate::core::config::Settings;
use crate::core::error::ReleaseError;
use crate::core::model::StepOutcome;
use crate::security::{CommandRunner, CommandSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("release-publisher/", env!("CARGO_PKG_VERSION"));

/// Errors returned by the workflow API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// One workflow run as reported by GitHub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub html_url: String,
    /// `queued`, `in_progress`, `completed`, ...
    pub status: String,
    /// Set once `status` is `completed`
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub event: String,
    pub head_branch: Option<String>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    /// Outcome of a completed run
    pub fn outcome(&self) -> StepOutcome {
        match self.conclusion.as_deref() {
            Some("success") | Some("neutral") => StepOutcome::Success,
            Some("skipped") => StepOutcome::Skipped,
            _ => StepOutcome::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    workflow_runs: Vec<WorkflowRun>,
}

/// Remote CI operations
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Request a `workflow_dispatch` run of `workflow` on `git_ref`
    async fn dispatch(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), ApiError>;

    /// Dispatch-triggered runs of `workflow` on `branch`, newest first
    async fn list_runs(
        &self,
        workflow: &str,
        branch: &str,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRun>, ApiError>;

    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun, ApiError>;
}

/// REST client for one repository
pub struct GitHubActionsClient {
    http: Client,
    api_url: String,
    repository: String,
}

impl GitHubActionsClient {
    pub fn new(
        api_url: &str,
        repository: &str,
        token: &SecretString,
    ) -> Result<Self, ReleaseError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| ReleaseError::config("GitHub token contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReleaseError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.repository, path)
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl WorkflowApi for GitHubActionsClient {
    async fn dispatch(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "ref": git_ref, "inputs": inputs });
        let response = self
            .http
            .post(self.url(&format!("actions/workflows/{}/dispatches", workflow)))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_runs(
        &self,
        workflow: &str,
        branch: &str,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRun>, ApiError> {
        let created = format!(">={}", created_after.format("%Y-%m-%dT%H:%M:%SZ"));
        let query = HashMap::from([
            ("event", "workflow_dispatch"),
            ("branch", branch),
            ("created", created.as_str()),
            ("per_page", "20"),
        ]);
        let response = self
            .http
            .get(self.url(&format!("actions/workflows/{}/runs", workflow)))
            .query(&query)
            .send()
            .await?;
        let list: WorkflowRunList = Self::check(response).await?.json().await?;
        Ok(list.workflow_runs)
    }

    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("actions/runs/{}", run_id)))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

// ============================================================================
// Repository resolution
// ============================================================================

/// Repository to dispatch workflows in
///
/// Uses the configured slug when present, else the `origin` remote.
pub async fn resolve_repository(
    settings: &Settings,
    runner: &dyn CommandRunner,
) -> Result<String, ReleaseError> {
    if let Some(repository) = &settings.repository {
        return Ok(repository.clone());
    }

    let output = runner
        .run(&CommandSpec::new("git").args(["remote", "get-url", "origin"]))
        .await
        .map_err(|e| ReleaseError::config(format!("cannot read origin remote: {}", e)))?;
    if !output.success() {
        return Err(ReleaseError::config(format!(
            "no repository configured and no origin remote: {}",
            output.failure_summary()
        )));
    }

    parse_github_slug(&output.stdout).ok_or_else(|| {
        ReleaseError::config(format!(
            "origin remote '{}' is not a GitHub repository; set `repository` in {}",
            output.stdout.trim(),
            crate::core::CONFIG_FILENAME
        ))
    })
}

/// Extract `owner/name` from a GitHub remote URL
///
/// Handles `https://github.com/owner/name(.git)`, `git@github.com:owner/name.git`
/// and `ssh://git@github.com/owner/name.git`.
pub fn parse_github_slug(remote: &str) -> Option<String> {
    let remote = remote.trim();
    let path = if let Some(rest) = remote.strip_prefix("git@") {
        rest.split_once(':')?.1
    } else {
        let without_scheme = remote.split_once("://")?.1;
        without_scheme.split_once('/')?.1
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Some(format!("{}/{}", owner, name))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str, conclusion: Option<&str>) -> WorkflowRun {
        WorkflowRun {
            id: 1,
            html_url: "https://github.com/acme/nanodoc/actions/runs/1".to_string(),
            status: status.to_string(),
            conclusion: conclusion.map(str::to_string),
            created_at: Utc::now(),
            event: "workflow_dispatch".to_string(),
            head_branch: Some("main".to_string()),
        }
    }

    #[test]
    fn test_run_outcome() {
        assert!(!run("in_progress", None).is_completed());
        assert_eq!(run("completed", Some("success")).outcome(), StepOutcome::Success);
        assert_eq!(run("completed", Some("skipped")).outcome(), StepOutcome::Skipped);
        assert_eq!(run("completed", Some("failure")).outcome(), StepOutcome::Failed);
        assert_eq!(run("completed", Some("cancelled")).outcome(), StepOutcome::Failed);
        assert_eq!(run("completed", Some("timed_out")).outcome(), StepOutcome::Failed);
    }

    #[test]
    fn test_deserialize_run_list() {
        let json = r#"{
            "total_count": 1,
            "workflow_runs": [{
                "id": 42,
                "name": "Package Release",
                "html_url": "https://github.com/acme/nanodoc/actions/runs/42",
                "status": "queued",
                "conclusion": null,
                "created_at": "2026-10-16T09:30:00Z",
                "event": "workflow_dispatch",
                "head_branch": "main"
            }]
        }"#;

        let list: WorkflowRunList = serde_json::from_str(json).unwrap();
        assert_eq!(list.workflow_runs.len(), 1);
        assert_eq!(list.workflow_runs[0].id, 42);
        assert!(list.workflow_runs[0].conclusion.is_none());
    }

    #[test]
    fn test_parse_github_slug() {
        for remote in [
            "https://github.com/acme/nanodoc.git",
            "https://github.com/acme/nanodoc",
            "git@github.com:acme/nanodoc.git",
            "ssh://git@github.com/acme/nanodoc.git",
            "https://github.com/acme/nanodoc/\n",
        ] {
            assert_eq!(parse_github_slug(remote).as_deref(), Some("acme/nanodoc"), "{}", remote);
        }

        assert_eq!(parse_github_slug("https://github.com/acme"), None);
        assert_eq!(parse_github_slug("/srv/git/nanodoc.git"), None);
    }

    #[tokio::test]
    async fn test_resolve_repository() {
        use crate::testing::FakeRunner;

        let mut settings = Settings::default();
        settings.repository = Some("acme/configured".to_string());
        let runner = FakeRunner::new().respond("git remote", 0, "git@github.com:acme/remote.git\n");
        assert_eq!(
            resolve_repository(&settings, &runner).await.unwrap(),
            "acme/configured"
        );

        settings.repository = None;
        assert_eq!(
            resolve_repository(&settings, &runner).await.unwrap(),
            "acme/remote"
        );

        let runner = FakeRunner::new().fail("git remote", "error: No such remote 'origin'");
        let err = resolve_repository(&settings, &runner).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_client_url() {
        let token = SecretString::from("ghp_test_token".to_string());
        let client =
            GitHubActionsClient::new("https://api.github.com/", "acme/nanodoc", &token).unwrap();

        assert_eq!(
            client.url("actions/runs/7"),
            "https://api.github.com/repos/acme/nanodoc/actions/runs/7"
        );
    }
}
