//! Project metadata from `pyproject.toml`
//!
//! Supplies the default version and package name when the command line does
//! not override them. Both PEP 621 (`[project]`) and Poetry
//! (`[tool.poetry]`) layouts are read; `[project]` wins when both exist.

use crate::core::error::ReleaseError;
use std::path::Path;
use tokio::fs;

const PYPROJECT: &str = "pyproject.toml";

/// Name and version declared by the project
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
}

impl ProjectMetadata {
    /// Load metadata from `<project_path>/pyproject.toml`
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub async fn load(project_path: &Path) -> Result<Option<Self>, ReleaseError> {
        let path = project_path.join(PYPROJECT);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        Self::parse(&content).map(Some)
    }

    /// Parse the contents of a `pyproject.toml`
    pub fn parse(content: &str) -> Result<Self, ReleaseError> {
        let parsed: toml::Value = toml::from_str(content)
            .map_err(|e| ReleaseError::config(format!("failed to parse {}: {}", PYPROJECT, e)))?;

        let project = parsed.get("project");
        let poetry = parsed.get("tool").and_then(|t| t.get("poetry"));

        let field = |key: &str| -> Option<String> {
            project
                .and_then(|p| p.get(key))
                .or_else(|| poetry.and_then(|p| p.get(key)))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(Self {
            name: field("name"),
            version: field("version"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_pep621() {
        let meta = ProjectMetadata::parse(
            "[project]\nname = \"nanodoc\"\nversion = \"0.8.1\"\n",
        )
        .unwrap();

        assert_eq!(meta.name.as_deref(), Some("nanodoc"));
        assert_eq!(meta.version.as_deref(), Some("0.8.1"));
    }

    #[test]
    fn test_parse_poetry() {
        let meta = ProjectMetadata::parse(
            "[tool.poetry]\nname = \"nanodoc\"\nversion = \"0.9.0\"\n",
        )
        .unwrap();

        assert_eq!(meta.name.as_deref(), Some("nanodoc"));
        assert_eq!(meta.version.as_deref(), Some("0.9.0"));
    }

    #[test]
    fn test_project_table_wins() {
        let meta = ProjectMetadata::parse(
            "[project]\nname = \"pep\"\n\n[tool.poetry]\nname = \"poetry\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();

        assert_eq!(meta.name.as_deref(), Some("pep"));
        assert_eq!(meta.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = ProjectMetadata::parse("[project\nname =").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ProjectMetadata::load(dir.path()).await.unwrap(), None);
    }
}
