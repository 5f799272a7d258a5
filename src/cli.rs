//! Command-line interface of `new-release`
//!
//! Parsing is done by clap; `Cli::into_run_config` then resolves defaults
//! from the environment and `pyproject.toml` and produces the validated
//! `RunConfig`. Everything rejected here is a usage error and nothing runs.

use crate::core::config::RunConfig;
use crate::core::error::ReleaseError;
use crate::core::model::{ExecutionMode, Step, Target};
use crate::core::project::ProjectMetadata;
use crate::validation::{VersionValidator, parse_package_name, parse_version};
use clap::Parser;
use semver::Version;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Build and publish a package release
#[derive(Parser, Debug)]
#[command(name = "new-release")]
#[command(about = "Build and publish a package release to PyPI, GitHub, APT and Homebrew")]
#[command(long_about = None)]
pub struct Cli {
    /// Comma-separated targets (index, vcs-release, os-package-a, os-package-b)
    #[arg(long, value_enum, value_delimiter = ',', value_name = "TARGETS")]
    pub publish_to: Vec<Target>,

    /// Add one target; may be repeated
    #[arg(long, value_enum, value_name = "TARGET")]
    pub target: Vec<Target>,

    /// Run steps on this machine instead of dispatching CI workflows
    #[arg(long)]
    pub local: bool,

    /// Run the build step
    #[arg(long)]
    pub build: bool,

    /// Run the verify step
    #[arg(long)]
    pub verify: bool,

    /// Run the commit step
    #[arg(long)]
    pub commit: bool,

    /// Commit even when nothing changed since the last publish
    #[arg(long)]
    pub force: bool,

    /// Release version (defaults to the version in pyproject.toml)
    #[arg(long, value_parser = parse_version)]
    pub version: Option<Version>,

    /// Package name (defaults to $PACKAGE_NAME, then pyproject.toml)
    #[arg(long, value_parser = parse_package_name)]
    pub package_name: Option<String>,

    /// Markdown file used as the release notes
    #[arg(long, value_name = "PATH")]
    pub release_notes: Option<PathBuf>,

    /// Keep going with later targets after a failure
    #[arg(long)]
    pub continue_on_error: bool,

    /// Project root
    #[arg(long, default_value = ".", value_name = "PATH")]
    pub project_dir: PathBuf,

    /// Settings file (defaults to <project-dir>/.release-config.yaml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not write the run journal
    #[arg(long)]
    pub no_journal: bool,
}

impl Cli {
    /// Selected targets; empty means all
    pub fn targets(&self) -> Vec<Target> {
        self.publish_to
            .iter()
            .chain(self.target.iter())
            .copied()
            .collect()
    }

    /// Selected steps; empty means all
    pub fn steps(&self) -> Vec<Step> {
        [
            (self.build, Step::Build),
            (self.verify, Step::Verify),
            (self.commit, Step::Commit),
        ]
        .into_iter()
        .filter_map(|(selected, step)| selected.then_some(step))
        .collect()
    }

    pub fn mode(&self) -> ExecutionMode {
        if self.local {
            ExecutionMode::Local
        } else {
            ExecutionMode::Remote
        }
    }

    /// Resolve defaults and build the run configuration
    ///
    /// Version: `--version`, else `pyproject.toml`. Package name:
    /// `--package-name`, else `PACKAGE_NAME`, else `pyproject.toml`.
    /// A relative `--release-notes` path is taken relative to `cwd`.
    pub fn into_run_config(
        self,
        env: &HashMap<String, String>,
        metadata: Option<&ProjectMetadata>,
        cwd: &Path,
    ) -> Result<RunConfig, ReleaseError> {
        let version = match &self.version {
            Some(version) => version.clone(),
            None => {
                let declared = metadata
                    .and_then(|m| m.version.as_deref())
                    .ok_or_else(|| {
                        ReleaseError::usage(
                            "--version",
                            "not given and pyproject.toml declares no version",
                        )
                    })?;
                VersionValidator::new().parse(declared).map_err(|message| {
                    ReleaseError::usage("--version", format!("pyproject.toml version: {}", message))
                })?
            }
        };

        let package_name = self
            .package_name
            .clone()
            .or_else(|| env.get("PACKAGE_NAME").filter(|v| !v.is_empty()).cloned())
            .or_else(|| metadata.and_then(|m| m.name.clone()))
            .ok_or_else(|| {
                ReleaseError::usage(
                    "--package-name",
                    "not given, PACKAGE_NAME is unset and pyproject.toml declares no name",
                )
            })?;

        let release_notes = self.release_notes.as_ref().map(|p| cwd.join(p));

        Ok(RunConfig::new(
            self.targets(),
            self.steps(),
            self.mode(),
            version,
            package_name,
        )?
        .with_force(self.force)
        .with_continue_on_error(self.continue_on_error)
        .with_release_notes(release_notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("new-release").chain(args.iter().copied())).unwrap()
    }

    fn metadata(name: Option<&str>, version: Option<&str>) -> ProjectMetadata {
        ProjectMetadata {
            name: name.map(str::to_string),
            version: version.map(str::to_string),
        }
    }

    fn resolve(args: &[&str], env: &[(&str, &str)], meta: Option<&ProjectMetadata>) -> Result<RunConfig, ReleaseError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        parse(args).into_run_config(&env, meta, Path::new("/work"))
    }

    #[test]
    fn test_defaults() {
        let meta = metadata(Some("nanodoc"), Some("1.2.0"));
        let config = resolve(&[], &[], Some(&meta)).unwrap();

        assert_eq!(config.targets().collect::<Vec<_>>(), Target::ALL.to_vec());
        assert_eq!(config.steps().collect::<Vec<_>>(), Step::ALL.to_vec());
        assert_eq!(config.mode(), ExecutionMode::Remote);
        assert_eq!(config.version(), &Version::new(1, 2, 0));
        assert_eq!(config.package_name(), "nanodoc");
        assert!(!config.force());
    }

    #[test]
    fn test_publish_to_and_target_are_merged() {
        let cli = parse(&["--publish-to=os-package-b,index", "--target", "apt", "--target=github"]);

        assert_eq!(
            cli.targets(),
            vec![Target::Brew, Target::Index, Target::Apt, Target::VcsRelease]
        );
    }

    #[test]
    fn test_local_build_only() {
        let config = resolve(
            &["--publish-to=os-package-a", "--local", "--build", "--version=2.0.0", "--package-name=nanodoc"],
            &[],
            None,
        )
        .unwrap();

        assert_eq!(config.targets().collect::<Vec<_>>(), vec![Target::Apt]);
        assert_eq!(config.steps().collect::<Vec<_>>(), vec![Step::Build]);
        assert_eq!(config.mode(), ExecutionMode::Local);
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let err = Cli::try_parse_from(["new-release", "--publish-to=index,npm"]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let err = Cli::try_parse_from(["new-release", "--version=1.2"]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("not a semantic version"));
    }

    #[test]
    fn test_package_name_resolution_order() {
        let meta = metadata(Some("from-pyproject"), Some("1.0.0"));

        let config = resolve(&["--package-name=from-flag"], &[("PACKAGE_NAME", "from-env")], Some(&meta)).unwrap();
        assert_eq!(config.package_name(), "from-flag");

        let config = resolve(&[], &[("PACKAGE_NAME", "from-env")], Some(&meta)).unwrap();
        assert_eq!(config.package_name(), "from-env");

        let config = resolve(&[], &[("PACKAGE_NAME", "")], Some(&meta)).unwrap();
        assert_eq!(config.package_name(), "from-pyproject");
    }

    #[test]
    fn test_missing_package_name_is_usage_error() {
        let err = resolve(&["--version=1.0.0"], &[], None).unwrap_err();

        assert!(err.is_usage());
        assert!(err.to_string().contains("--package-name"));
    }

    #[test]
    fn test_missing_version_is_usage_error() {
        let meta = metadata(Some("nanodoc"), None);
        let err = resolve(&[], &[], Some(&meta)).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("--version"));

        let meta = metadata(Some("nanodoc"), Some("0.3"));
        let err = resolve(&[], &[], Some(&meta)).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_flags() {
        let config = resolve(
            &[
                "--version=1.0.0",
                "--package-name=nanodoc",
                "--force",
                "--continue-on-error",
                "--release-notes=notes/v1.md",
            ],
            &[],
            None,
        )
        .unwrap();

        assert!(config.force());
        assert!(config.continue_on_error());
        assert_eq!(config.release_notes(), Some(Path::new("/work/notes/v1.md")));
    }
}
