//! new-release CLI
//!
//! Builds, verifies and publishes one package version to the selected
//! distribution channels, locally or through GitHub Actions.

use anyhow::{Context, Result};
use clap::Parser;
use release_publisher::cli::Cli;
use release_publisher::core::{
    ExecutionMode, ProjectMetadata, ReleaseError, RunContext, SettingsLoadOptions, SettingsLoader,
};
use release_publisher::orchestration::{
    ChangeDetector, GitHubActionsClient, Orchestrator, RemoteDispatcher, RunJournal,
    print_summary, resolve_repository,
};
use release_publisher::security::{
    CommandRunner, CredentialKind, CredentialStore, SafeCommandExecutor,
};
use release_publisher::validation::VersionValidator;
use std::collections::HashMap;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // clap exits with status 2 on usage errors
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            match e.downcast_ref::<ReleaseError>() {
                Some(error) => {
                    eprintln!("[{}] {}", error.code(), error);
                    for action in error.suggested_actions() {
                        eprintln!("  → {}", action);
                    }
                    process::exit(error.exit_code());
                }
                None => {
                    eprintln!("{:#}", e);
                    process::exit(1);
                }
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("release_publisher={0},new_release={0}", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;

    let project_dir = cwd.join(&cli.project_dir);
    let project_dir = std::fs::canonicalize(&project_dir).map_err(|e| {
        ReleaseError::usage("--project-dir", format!("{}: {}", project_dir.display(), e))
    })?;
    let explicit_config = cli.config.as_ref().map(|path| cwd.join(path));
    let write_journal = !cli.no_journal;

    let metadata = ProjectMetadata::load(&project_dir).await?;
    let config = cli.into_run_config(&env, metadata.as_ref(), &cwd)?;

    let settings = SettingsLoader::load(SettingsLoadOptions {
        project_path: project_dir.clone(),
        explicit_path: explicit_config,
        env: env.clone(),
    })
    .await?;
    let credentials = CredentialStore::from_env(&env);
    tracing::debug!(?credentials, ?settings, "loaded settings");

    let executor = SafeCommandExecutor::new(
        &project_dir,
        &settings.scripts_dir,
        settings.command_timeout(),
    )
    .map_err(|e| ReleaseError::config(e.to_string()))?;
    let runner: Arc<dyn CommandRunner> = Arc::new(executor);
    let detector = ChangeDetector::new()
        .map_err(|e| ReleaseError::config(format!("cannot build HTTP client: {}", e)))?;

    // Remote mode needs a token and a repository before anything is dispatched
    let dispatcher = match config.mode() {
        ExecutionMode::Remote => {
            let token = credentials.require(CredentialKind::GitHub)?.clone();
            let repository = resolve_repository(&settings, runner.as_ref()).await?;
            let client = GitHubActionsClient::new(&settings.api_url, &repository, &token)?;
            println!("🔗 Repository: {} (ref {})", repository, settings.git_ref);
            Some(RemoteDispatcher::new(
                Arc::new(client),
                settings.poll.backoff(),
            ))
        }
        ExecutionMode::Local => None,
    };

    println!(
        "\n📦 new-release: {} {} ({})",
        config.package_name(),
        config.version(),
        config.mode()
    );
    if VersionValidator::new().is_prerelease(config.version()) {
        println!("⚠️  {} is a pre-release version", config.version());
    }

    let journal = RunJournal::new(&project_dir);
    if let Ok(Some(previous)) = journal.load().await {
        if let Some(halt) = previous.halted_at {
            println!(
                "ℹ️  Previous run ({} {}) halted at {}",
                previous.package_name, previous.version, halt.target
            );
        }
    }

    let mut orchestrator = Orchestrator::new(
        RunContext::new(&project_dir, settings, credentials, runner),
        detector,
    );
    if let Some(dispatcher) = dispatcher {
        orchestrator = orchestrator.with_dispatcher(dispatcher);
    }

    let report = orchestrator.run(&config).await?;
    print_summary(&report);

    if write_journal {
        match journal.save(&report).await {
            Ok(()) => println!("📝 Run journal: {}", journal.path().display()),
            Err(e) => tracing::warn!(
                "could not write run journal {}: {}",
                journal.path().display(),
                e
            ),
        }
    }

    Ok(report.exit_code())
}
