//! Per-package changelog kept next to the package sources as `changelog.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::package::SemanticVersion;
use crate::runtime::Runtime;

pub const CHANGELOG_NAME: &str = "changelog.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    pub version: SemanticVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub breaking_changes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<Vec<Commit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<String>>,
}

impl ChangelogEntry {
    pub fn new(version: SemanticVersion, breaking_changes: impl Into<String>) -> Self {
        Self {
            version,
            date: None,
            breaking_changes: breaking_changes.into(),
            commits: None,
            entries: None,
        }
    }

    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Changelog {
    /// Empty until the owning package writes its first entry
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub versions: Vec<ChangelogEntry>,

    #[serde(skip)]
    pub path: PathBuf,
}

impl Changelog {
    /// Load `<dir>/changelog.json`. A package without one gets an empty changelog.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Self> {
        let path = dir.join(CHANGELOG_NAME);
        if !runtime.exists(&path) {
            debug!("No changelog at {:?}", path);
            return Ok(Self {
                path,
                ..Default::default()
            });
        }

        let content = runtime.read_to_string(&path)?;
        let mut changelog: Changelog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse changelog {:?}", path))?;
        changelog.path = path;
        Ok(changelog)
    }

    /// Return this changelog with `entry` added at the end.
    pub fn append(mut self, entry: ChangelogEntry) -> Self {
        self.versions.push(entry);
        self
    }

    pub fn save<R: Runtime + ?Sized>(&self, runtime: &R) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        runtime
            .write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to save changelog to {:?}", self.path))
    }

    pub fn entry_for(&self, version: &SemanticVersion) -> Option<&ChangelogEntry> {
        self.versions.iter().find(|e| e.version == *version)
    }

    /// Entries with a major in `(from.major, to.major]` that describe breaking changes.
    pub fn breaking_changes_between(
        &self,
        from: &SemanticVersion,
        to: &SemanticVersion,
    ) -> Vec<&ChangelogEntry> {
        self.versions
            .iter()
            .filter(|e| e.version.major > from.major && e.version.major <= to.major)
            .filter(|e| e.has_breaking_changes())
            .collect()
    }
}
