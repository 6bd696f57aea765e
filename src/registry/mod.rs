//! Registry abstraction.
//!
//! A registry is a catalog plus an artifact store, addressable by package
//! name and version. The installer and releaser only talk to the
//! [`Registry`] trait; [`LocalRegistry`] is the filesystem-backed
//! implementation.

mod local;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::PackageVersion;
use crate::package::SemanticVersion;

pub use local::{LocalRegistry, REGISTRY_DIR_NAME};

/// Everything needed to ingest one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    /// Artifact file to copy into the store
    pub artifact: PathBuf,
    /// Name of the artifact inside the store
    pub file_name: String,
    pub package_name: String,
    pub version: SemanticVersion,
    /// Digest computed from the artifact before transfer
    pub file_hash: String,
    /// Empty when the release has no breaking changes
    pub breaking_changes: String,
}

/// Problem found while checking the store against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreProblem {
    Missing,
    HashMismatch { actual: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreIssue {
    pub entry: PackageVersion,
    pub problem: StoreProblem,
}

/// Capability interface for package registries.
///
/// Only a local filesystem backend exists; a remote backend can implement
/// the same trait without the installer changing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Ensure the store exists. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Whether `file_name` is present in the store.
    async fn has_release(&self, file_name: &str) -> Result<bool>;

    /// Copy an artifact into the store and record it in the catalog.
    async fn release(&self, request: ReleaseRequest) -> Result<PackageVersion>;

    /// Copy the stored artifact of `name@version` to `dest`.
    async fn download_release(
        &self,
        package_name: &str,
        version: &SemanticVersion,
        dest: &Path,
    ) -> Result<()>;

    /// Distinct package names, sorted.
    async fn all_package_names(&self) -> Result<Vec<String>>;

    async fn package_latest_version(&self, package_name: &str) -> Result<Option<PackageVersion>>;

    /// All versions of a package in release order.
    async fn package_versions(&self, package_name: &str) -> Result<Vec<PackageVersion>>;

    async fn breaking_changes_between(
        &self,
        package_name: &str,
        from: &SemanticVersion,
        to: &SemanticVersion,
    ) -> Result<Vec<PackageVersion>>;

    /// Re-hash every stored artifact and report the ones that do not match the catalog.
    async fn verify_store(&self) -> Result<Vec<StoreIssue>>;
}
