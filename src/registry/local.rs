//! Filesystem-backed registry.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/.emp-registry/
//!     .packages.json
//!     <sanitizedName>-v<version>.tgz
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};

use crate::catalog::{Catalog, PackageVersion};
use crate::error::EmpError;
use crate::package::SemanticVersion;
use crate::runtime::Runtime;
use crate::transfer::{copy_file, hash_file};

use super::{Registry, ReleaseRequest, StoreIssue, StoreProblem};

pub const REGISTRY_DIR_NAME: &str = ".emp-registry";

pub struct LocalRegistry<'a, R: Runtime> {
    runtime: &'a R,
    store_dir: PathBuf,
}

impl<'a, R: Runtime> LocalRegistry<'a, R> {
    /// Registry rooted at `registry_root`; files live in `<registry_root>/.emp-registry`.
    pub fn new(runtime: &'a R, registry_root: &Path) -> Self {
        Self {
            runtime,
            store_dir: registry_root.join(REGISTRY_DIR_NAME),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.store_dir.join(file_name)
    }

    fn catalog(&self) -> Result<Catalog<'a, R>> {
        Catalog::load(self.runtime, &self.store_dir)
    }

    /// Best-effort removal of a file this registry just wrote.
    fn discard(&self, path: &Path) {
        if let Err(e) = self.runtime.remove_file(path) {
            warn!("Failed to remove {:?} after a failed transfer: {}", path, e);
        }
    }
}

#[async_trait]
impl<R: Runtime> Registry for LocalRegistry<'_, R> {
    #[tracing::instrument(skip(self))]
    async fn initialize(&self) -> Result<()> {
        if !self.runtime.is_dir(&self.store_dir) {
            debug!("Creating registry store {:?}", self.store_dir);
            self.runtime.create_dir_all(&self.store_dir)?;
        }
        Ok(())
    }

    async fn has_release(&self, file_name: &str) -> Result<bool> {
        Ok(self.runtime.exists(&self.artifact_path(file_name)))
    }

    #[tracing::instrument(skip(self, request), fields(name = %request.package_name, version = %request.version))]
    async fn release(&self, request: ReleaseRequest) -> Result<PackageVersion> {
        let target = self.artifact_path(&request.file_name);
        if self.runtime.exists(&target) {
            return Err(EmpError::AlreadyReleased {
                file_name: request.file_name,
            }
            .into());
        }

        let mut catalog = self.catalog()?;
        if catalog.find(&request.package_name, &request.version).is_some() {
            return Err(EmpError::DuplicateVersion {
                name: request.package_name,
                version: request.version.to_string(),
            }
            .into());
        }

        let source_hash = hash_file(self.runtime, &request.artifact)?;
        if source_hash != request.file_hash {
            return Err(EmpError::Integrity {
                name: request.package_name,
                version: request.version.to_string(),
                path: request.artifact,
                expected: request.file_hash,
                actual: source_hash,
            }
            .into());
        }

        copy_file(self.runtime, &request.artifact, &target)?;

        let stored_hash = hash_file(self.runtime, &target)?;
        if stored_hash != request.file_hash {
            self.discard(&target);
            return Err(EmpError::Integrity {
                name: request.package_name,
                version: request.version.to_string(),
                path: target,
                expected: request.file_hash,
                actual: stored_hash,
            }
            .into());
        }

        let entry = PackageVersion {
            package_name: request.package_name,
            version: request.version,
            file_name: request.file_name,
            file_hash: request.file_hash,
            breaking_changes_description: request.breaking_changes,
        };

        // The copy is already in the store; take it back out if the catalog refuses the entry.
        if let Err(e) = catalog.register(entry.clone()) {
            self.discard(&target);
            return Err(e);
        }

        info!(
            "Registered {}@{} as {}",
            entry.package_name, entry.version, entry.file_name
        );
        Ok(entry)
    }

    #[tracing::instrument(skip(self))]
    async fn download_release(
        &self,
        package_name: &str,
        version: &SemanticVersion,
        dest: &Path,
    ) -> Result<()> {
        let catalog = self.catalog()?;
        let entry = catalog.find(package_name, version).ok_or_else(|| {
            EmpError::not_found(format!(
                "No such package in registry: {}@{}",
                package_name, version
            ))
        })?;

        let source = self.artifact_path(&entry.file_name);
        if !self.runtime.exists(&source) {
            return Err(EmpError::io(
                &source,
                format!("Stored artifact for {}@{} is missing", package_name, version),
            )
            .into());
        }

        copy_file(self.runtime, &source, dest)?;

        let actual = hash_file(self.runtime, dest)?;
        if actual != entry.file_hash {
            self.discard(dest);
            return Err(EmpError::Integrity {
                name: package_name.to_string(),
                version: version.to_string(),
                path: source,
                expected: entry.file_hash.clone(),
                actual,
            }
            .into());
        }

        debug!("Copied {:?} to {:?}", source, dest);
        Ok(())
    }

    async fn all_package_names(&self) -> Result<Vec<String>> {
        Ok(self.catalog()?.all_package_names().into_iter().collect())
    }

    async fn package_latest_version(&self, package_name: &str) -> Result<Option<PackageVersion>> {
        Ok(self.catalog()?.latest_of(package_name).cloned())
    }

    async fn package_versions(&self, package_name: &str) -> Result<Vec<PackageVersion>> {
        Ok(self
            .catalog()?
            .all_versions_of(package_name)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn breaking_changes_between(
        &self,
        package_name: &str,
        from: &SemanticVersion,
        to: &SemanticVersion,
    ) -> Result<Vec<PackageVersion>> {
        Ok(self
            .catalog()?
            .breaking_changes_between(package_name, from, to)
            .into_iter()
            .cloned()
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn verify_store(&self) -> Result<Vec<StoreIssue>> {
        let catalog = self.catalog()?;
        let mut issues = Vec::new();

        for entry in &catalog.overview().packages {
            let path = self.artifact_path(&entry.file_name);
            let problem = if !self.runtime.exists(&path) {
                Some(StoreProblem::Missing)
            } else {
                let actual = hash_file(self.runtime, &path)?;
                (actual != entry.file_hash).then_some(StoreProblem::HashMismatch { actual })
            };

            if let Some(problem) = problem {
                issues.push(StoreIssue {
                    entry: entry.clone(),
                    problem,
                });
            }
        }

        Ok(issues)
    }
}
