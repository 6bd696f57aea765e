//! Package version catalog.
//!
//! The catalog is the append-only record of every released `(name, version)`
//! pair, persisted as `.packages.json` in the registry directory:
//!
//! ```json
//! { "packages": [ { "packageName": "...", "version": "1.0.0", "fileName": "...",
//!                   "fileHash": "...", "breakingChangesDescription": "" } ] }
//! ```
//!
//! Entries keep release order. The file is read whole and rewritten whole;
//! the only mutation is [`Catalog::register`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::EmpError;
use crate::package::SemanticVersion;
use crate::runtime::Runtime;
use crate::transfer::partial_path;

pub const OVERVIEW_FILE_NAME: &str = ".packages.json";

/// One released artifact. Never mutated after registration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    pub package_name: String,
    pub version: SemanticVersion,
    pub file_name: String,
    pub file_hash: String,
    #[serde(default)]
    pub breaking_changes_description: String,
}

impl PackageVersion {
    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes_description.trim().is_empty()
    }
}

/// Serialized form of the overview file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PackagesOverview {
    #[serde(default)]
    pub packages: Vec<PackageVersion>,
}

impl PackagesOverview {
    pub fn all_versions_of(&self, name: &str) -> Vec<&PackageVersion> {
        self.packages
            .iter()
            .filter(|p| p.package_name == name)
            .collect()
    }

    pub fn latest_of(&self, name: &str) -> Option<&PackageVersion> {
        // The accumulator goes second so ties keep the earlier release.
        self.all_versions_of(name).into_iter().reduce(|acc, entry| {
            if *SemanticVersion::largest(&entry.version, &acc.version) == acc.version {
                acc
            } else {
                entry
            }
        })
    }

    pub fn all_package_names(&self) -> BTreeSet<String> {
        self.packages
            .iter()
            .map(|p| p.package_name.clone())
            .collect()
    }

    pub fn find(&self, name: &str, version: &SemanticVersion) -> Option<&PackageVersion> {
        self.packages
            .iter()
            .find(|p| p.package_name == name && p.version == *version)
    }

    /// Entries whose major is in `(from.major, to.major]` and that carry a description.
    pub fn breaking_changes_between(
        &self,
        name: &str,
        from: &SemanticVersion,
        to: &SemanticVersion,
    ) -> Vec<&PackageVersion> {
        self.all_versions_of(name)
            .into_iter()
            .filter(|p| p.version.major > from.major && p.version.major <= to.major)
            .filter(|p| p.has_breaking_changes())
            .collect()
    }
}

/// Holds the catalog lock file for as long as it lives.
struct CatalogLock<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime + ?Sized> CatalogLock<'a, R> {
    fn acquire(runtime: &'a R, overview_path: &Path) -> Result<Self> {
        let path = lock_path(overview_path);
        let pid = std::process::id().to_string();
        if !runtime.create_new(&path, pid.as_bytes())? {
            return Err(EmpError::Locked { path }.into());
        }
        debug!("Acquired catalog lock {:?}", path);
        Ok(Self { runtime, path })
    }
}

impl<R: Runtime + ?Sized> Drop for CatalogLock<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.remove_file(&self.path) {
            warn!("Failed to release catalog lock {:?}: {}", self.path, e);
        }
    }
}

fn lock_path(overview_path: &Path) -> PathBuf {
    let mut name = overview_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    overview_path.with_file_name(name)
}

/// Catalog bound to a registry directory.
pub struct Catalog<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    path: PathBuf,
    overview: PackagesOverview,
}

impl<'a, R: Runtime + ?Sized> Catalog<'a, R> {
    /// Load the overview under `registry_dir`. A missing file is an empty catalog.
    #[tracing::instrument(skip(runtime))]
    pub fn load(runtime: &'a R, registry_dir: &Path) -> Result<Self> {
        let path = registry_dir.join(OVERVIEW_FILE_NAME);
        let overview = read_overview(runtime, &path)?;
        Ok(Self {
            runtime,
            path,
            overview,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn overview(&self) -> &PackagesOverview {
        &self.overview
    }

    pub fn all_versions_of(&self, name: &str) -> Vec<&PackageVersion> {
        self.overview.all_versions_of(name)
    }

    pub fn latest_of(&self, name: &str) -> Option<&PackageVersion> {
        self.overview.latest_of(name)
    }

    pub fn all_package_names(&self) -> BTreeSet<String> {
        self.overview.all_package_names()
    }

    pub fn find(&self, name: &str, version: &SemanticVersion) -> Option<&PackageVersion> {
        self.overview.find(name, version)
    }

    pub fn breaking_changes_between(
        &self,
        name: &str,
        from: &SemanticVersion,
        to: &SemanticVersion,
    ) -> Vec<&PackageVersion> {
        self.overview.breaking_changes_between(name, from, to)
    }

    /// Append `entry` and persist.
    ///
    /// The overview is re-read under the lock, so an entry written by another
    /// process since [`Catalog::load`] is neither lost nor duplicated.
    #[tracing::instrument(skip(self, entry), fields(name = %entry.package_name, version = %entry.version))]
    pub fn register(&mut self, entry: PackageVersion) -> Result<()> {
        let _lock = CatalogLock::acquire(self.runtime, &self.path)?;

        let mut current = read_overview(self.runtime, &self.path)?;
        if current.find(&entry.package_name, &entry.version).is_some() {
            self.overview = current;
            return Err(EmpError::DuplicateVersion {
                name: entry.package_name,
                version: entry.version.to_string(),
            }
            .into());
        }

        current.packages.push(entry);
        write_overview(self.runtime, &self.path, &current)?;
        self.overview = current;
        Ok(())
    }
}

fn read_overview<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<PackagesOverview> {
    if !runtime.exists(path) {
        debug!("No packages overview at {:?} yet", path);
        return Ok(PackagesOverview::default());
    }
    let content = runtime.read_to_string(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse packages overview {:?}", path))
}

fn write_overview<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    overview: &PackagesOverview,
) -> Result<()> {
    let content = serde_json::to_string_pretty(overview)?;
    let staging = partial_path(path);
    runtime.write(&staging, content.as_bytes())?;
    runtime
        .rename(&staging, path)
        .with_context(|| format!("Failed to save packages overview to {:?}", path))
}
