//! Install use case - installs and upgrades one registry package in a consumer project.
//!
//! Flow for a single package:
//! - Resolve the latest registry version
//! - Compare it with the version referenced by `package.json`
//! - Gate a major upgrade behind a breaking-changes confirmation
//! - Fetch the artifact into `.dependencies` and verify its digest
//! - Rewrite the manifest, then drop the previous artifact

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, info, warn};

use crate::catalog::PackageVersion;
use crate::changelog::Changelog;
use crate::error::EmpError;
use crate::manifest::{
    DEPENDENCY_FOLDER, DependencyCategory, ExistingDependency, Manifest, dependency_reference,
};
use crate::package::{ARTIFACT_SUFFIX, SemanticVersion};
use crate::registry::Registry;
use crate::runtime::path::resolve_relative_path;
use crate::runtime::{Runtime, is_path_under};
use crate::transfer::{hash_file, safe_delete};

/// Options shared by install and upgrade
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Category for a fresh install; prompted for when absent
    pub category: Option<DependencyCategory>,
    /// Skip the breaking-changes confirmation
    pub yes: bool,
    /// Package source directory whose `changelog.json` describes breaking changes.
    /// When absent the registry catalog is used.
    pub changelog_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Installed {
        version: SemanticVersion,
        category: DependencyCategory,
    },
    /// The package is referenced already; upgrading is a separate command
    AlreadyInstalled { version: SemanticVersion },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeOutcome {
    Upgraded {
        from: SemanticVersion,
        to: SemanticVersion,
    },
    UpToDate { version: SemanticVersion },
    NotInstalled,
}

/// One version's breaking-changes text, as shown before a major upgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakingChange {
    pub version: SemanticVersion,
    pub description: String,
}

/// Render the confirmation summary, one `"{version} - {description}"` line per version.
pub fn breaking_changes_summary(package_name: &str, changes: &[BreakingChange]) -> String {
    let mut out = format!("Breaking changes for {}:\n", package_name);
    if changes.is_empty() {
        out.push_str("  (no breaking changes were described)\n");
    }
    for change in changes {
        out.push_str(&format!("  {} - {}\n", change.version, change.description.trim()));
    }
    out
}

pub struct InstallUseCase<'a, R: Runtime> {
    runtime: &'a R,
    registry: &'a dyn Registry,
    project_dir: PathBuf,
}

impl<'a, R: Runtime> InstallUseCase<'a, R> {
    pub fn new(runtime: &'a R, registry: &'a dyn Registry, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            registry,
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn dependency_dir(&self) -> PathBuf {
        self.project_dir.join(DEPENDENCY_FOLDER)
    }

    async fn latest_release(&self, package_name: &str) -> Result<PackageVersion> {
        self.registry
            .package_latest_version(package_name)
            .await?
            .ok_or_else(|| {
                EmpError::not_found(format!("No such package in registry: {}", package_name)).into()
            })
    }

    /// Install `package_name` at its latest version.
    #[tracing::instrument(skip(self, options))]
    pub async fn install(&self, package_name: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        let mut manifest = Manifest::load(self.runtime, &self.project_dir)?;
        let latest = self.latest_release(package_name).await?;

        if let Some(existing) = manifest.existing_dependency(package_name)? {
            info!(
                "{} is already installed at {}, nothing to do",
                package_name, existing.version
            );
            return Ok(InstallOutcome::AlreadyInstalled {
                version: existing.version,
            });
        }

        let category = match options.category {
            Some(category) => category,
            None => self.prompt_category(package_name)?,
        };

        self.fetch_verified(&latest).await?;

        manifest.set_dependency(category, package_name, &dependency_reference(&latest.file_name));
        manifest.save(self.runtime)?;

        info!("Installed {}@{} as {}", package_name, latest.version, category);
        Ok(InstallOutcome::Installed {
            version: latest.version,
            category,
        })
    }

    fn prompt_category(&self, package_name: &str) -> Result<DependencyCategory> {
        let options: Vec<String> = DependencyCategory::ALL
            .iter()
            .map(|c| c.key().to_string())
            .collect();
        let index = self.runtime.select(
            &format!("Install {} as which kind of dependency?", package_name),
            &options,
            0,
        )?;
        DependencyCategory::ALL
            .get(index)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Invalid dependency category selection: {}", index))
    }

    /// Move an installed package to the registry's latest version.
    #[tracing::instrument(skip(self, options))]
    pub async fn upgrade(&self, package_name: &str, options: &InstallOptions) -> Result<UpgradeOutcome> {
        let mut manifest = Manifest::load(self.runtime, &self.project_dir)?;
        let Some(existing) = manifest.existing_dependency(package_name)? else {
            debug!("{} is not referenced by {:?}", package_name, manifest.path);
            return Ok(UpgradeOutcome::NotInstalled);
        };

        let latest = self.latest_release(package_name).await?;

        // Installed copies newer than the registry are left alone
        if latest.version <= existing.version {
            debug!("{} is up to date at {}", package_name, existing.version);
            return Ok(UpgradeOutcome::UpToDate {
                version: existing.version,
            });
        }

        if SemanticVersion::has_new_major(&latest.version, Some(&existing.version)) {
            self.confirm_breaking_changes(package_name, &existing.version, &latest.version, options)
                .await?;
        }

        let fetched = self.fetch_verified(&latest).await?;

        manifest.set_dependency(
            existing.category,
            package_name,
            &dependency_reference(&latest.file_name),
        );
        manifest.save(self.runtime)?;

        self.remove_previous_artifact(&existing, &fetched);

        info!(
            "Upgraded {} from {} to {}",
            package_name, existing.version, latest.version
        );
        Ok(UpgradeOutcome::Upgraded {
            from: existing.version,
            to: latest.version,
        })
    }

    async fn breaking_changes(
        &self,
        package_name: &str,
        from: &SemanticVersion,
        to: &SemanticVersion,
        options: &InstallOptions,
    ) -> Result<Vec<BreakingChange>> {
        if let Some(dir) = &options.changelog_dir {
            let changelog = Changelog::load(self.runtime, dir)?;
            if changelog.entry_for(to).is_none() {
                return Err(EmpError::not_found(format!(
                    "Unable to find changelog version {} for {} in {:?}. Is the package correctly installed?",
                    to, package_name, changelog.path
                ))
                .into());
            }
            return Ok(changelog
                .breaking_changes_between(from, to)
                .into_iter()
                .map(|e| BreakingChange {
                    version: e.version,
                    description: e.breaking_changes.clone(),
                })
                .collect());
        }

        Ok(self
            .registry
            .breaking_changes_between(package_name, from, to)
            .await?
            .into_iter()
            .map(|p| BreakingChange {
                version: p.version,
                description: p.breaking_changes_description,
            })
            .collect())
    }

    async fn confirm_breaking_changes(
        &self,
        package_name: &str,
        from: &SemanticVersion,
        to: &SemanticVersion,
        options: &InstallOptions,
    ) -> Result<()> {
        let changes = self.breaking_changes(package_name, from, to, options).await?;

        println!();
        print!("{}", breaking_changes_summary(package_name, &changes));
        println!();

        if options.yes {
            info!("Continuing past breaking changes of {} (--yes)", package_name);
            return Ok(());
        }

        if !self.runtime.confirm("Do you want to continue?")? {
            return Err(EmpError::UserAborted {
                reason: format!("declined major upgrade of {} from {} to {}", package_name, from, to),
            }
            .into());
        }
        Ok(())
    }

    /// Copy the release into `.dependencies` and check it against the catalog digest.
    async fn fetch_verified(&self, release: &PackageVersion) -> Result<PathBuf> {
        if !self.registry.has_release(&release.file_name).await? {
            return Err(EmpError::not_found(format!(
                "Artifact {} for {}@{} is missing from the registry store",
                release.file_name, release.package_name, release.version
            ))
            .into());
        }

        let dependency_dir = self.dependency_dir();
        if !self.runtime.is_dir(&dependency_dir) {
            self.runtime.create_dir_all(&dependency_dir)?;
        }

        let dest = dependency_dir.join(&release.file_name);
        self.registry
            .download_release(&release.package_name, &release.version, &dest)
            .await?;

        let actual = hash_file(self.runtime, &dest)?;
        if actual != release.file_hash {
            if let Err(e) = self.runtime.remove_file(&dest) {
                warn!("Failed to remove unverified artifact {:?}: {}", dest, e);
            }
            return Err(EmpError::Integrity {
                name: release.package_name.clone(),
                version: release.version.to_string(),
                path: dest,
                expected: release.file_hash.clone(),
                actual,
            }
            .into());
        }

        debug!("Verified {:?}", dest);
        Ok(dest)
    }

    fn remove_previous_artifact(&self, previous: &ExistingDependency, current: &Path) {
        let old = resolve_relative_path(&self.project_dir, Path::new(&previous.reference));
        if old == current || !is_path_under(&old, &self.dependency_dir()) {
            return;
        }

        match safe_delete(self.runtime, &old, ARTIFACT_SUFFIX) {
            Ok(true) => debug!("Removed previous artifact {:?}", old),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove previous artifact {:?}: {}", old, e),
        }
    }
}
