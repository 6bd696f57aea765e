//! Release use case - publishes a package directory into the registry.
//!
//! A new version is recorded in `package.json` and `changelog.json` before
//! the artifact is produced, either by the configured pack command or from
//! a prebuilt file. Both files are put back if the release fails. A
//! successful bump is committed and tagged when the package lives in a
//! clean git checkout.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::{debug, info, warn};

use crate::catalog::PackageVersion;
use crate::changelog::{CHANGELOG_NAME, Changelog, ChangelogEntry, Commit};
use crate::error::EmpError;
use crate::manifest::{MANIFEST_NAME, Manifest};
use crate::package::{ARTIFACT_SUFFIX, SemanticVersion, VersionBump, release_file_name};
use crate::registry::{Registry, ReleaseRequest};
use crate::runtime::path::resolve_relative_path;
use crate::runtime::{Runtime, split_command};
use crate::transfer::{hash_file, move_into_store};
use crate::vcs::Git;

/// Directory inside the package where packed artifacts are kept.
pub const RELEASES_DIR: &str = ".releases";

/// Prefix of the commits that record a version; they are left out of changelogs.
pub const VERSION_COMMIT_PREFIX: &str = "[version] ";

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Version component to bump; prompted for when absent
    pub bump: Option<VersionBump>,
    /// Release the version already in `package.json`
    pub current: bool,
    /// Breaking-changes description for a major release
    pub breaking: Option<String>,
    /// Changelog lines for the new version
    pub entries: Vec<String>,
    /// Prebuilt artifact to release instead of running the pack command
    pub artifact: Option<PathBuf>,
    pub pack_command: String,
    /// Commit and tag a bumped version
    pub commit: bool,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            bump: None,
            current: false,
            breaking: None,
            entries: Vec::new(),
            artifact: None,
            pack_command: "yarn pack".into(),
            commit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Released(PackageVersion),
    AlreadyReleased {
        name: String,
        version: SemanticVersion,
    },
}

/// File contents from before a version was recorded.
struct RecordedFiles {
    manifest: String,
    changelog: Option<String>,
}

pub struct ReleaseUseCase<'a, R: Runtime> {
    runtime: &'a R,
    registry: &'a dyn Registry,
    package_dir: PathBuf,
}

impl<'a, R: Runtime> ReleaseUseCase<'a, R> {
    pub fn new(runtime: &'a R, registry: &'a dyn Registry, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            registry,
            package_dir: package_dir.into(),
        }
    }

    #[tracing::instrument(skip(self, options))]
    pub async fn release(&self, options: &ReleaseOptions) -> Result<ReleaseOutcome> {
        let mut manifest = Manifest::load(self.runtime, &self.package_dir)?;
        let name = manifest.name()?.to_string();
        let current = manifest.version()?;

        if options.current {
            let file_name = release_file_name(&name, &current);
            if self.registry.has_release(&file_name).await? {
                info!("{}@{} was already released.", name, current);
                return Ok(ReleaseOutcome::AlreadyReleased {
                    name,
                    version: current,
                });
            }
            if options.breaking.is_some() && !current.is_major_release() {
                bail!(
                    "Breaking changes can only be released with a major version, and {} is not one",
                    current
                );
            }
            let breaking = options.breaking.clone().unwrap_or_default();
            let entry = self.publish(&name, current, breaking, options).await?;
            return Ok(ReleaseOutcome::Released(entry));
        }

        let kind = match options.bump {
            Some(kind) => kind,
            None => self.prompt_bump(&current)?,
        };
        let next = current.bump(kind)?;
        self.ensure_unreleased(&name, &next).await?;
        let breaking = self.breaking_description(kind, options)?;

        let git = Git::new(self.runtime, &self.package_dir);
        let use_vcs = options.commit && self.is_clean_checkout(&git);
        let commits = if use_vcs {
            self.commits_to_release(&git, &current)
        } else {
            None
        };

        let previous = self.snapshot()?;
        if let Err(e) = self.record_version(&mut manifest, &name, &next, &breaking, commits, options) {
            self.restore(&previous);
            return Err(e);
        }

        let entry = match self.publish(&name, next, breaking, options).await {
            Ok(entry) => entry,
            Err(e) => {
                self.restore(&previous);
                return Err(e);
            }
        };

        if use_vcs {
            self.commit_and_tag(&git, &next);
        }
        Ok(ReleaseOutcome::Released(entry))
    }

    /// Produce and hash the artifact, then hand it to the registry.
    async fn publish(
        &self,
        name: &str,
        version: SemanticVersion,
        breaking: String,
        options: &ReleaseOptions,
    ) -> Result<PackageVersion> {
        let file_name = release_file_name(name, &version);
        let artifact = self.produce_artifact(&file_name, options)?;
        let file_hash = hash_file(self.runtime, &artifact)?;

        self.registry
            .release(ReleaseRequest {
                artifact,
                file_name,
                package_name: name.to_string(),
                version,
                file_hash,
                breaking_changes: breaking,
            })
            .await
    }

    fn is_clean_checkout(&self, git: &Git<'_, R>) -> bool {
        match git.has_uncommitted_changes() {
            Ok(false) => true,
            Ok(true) => {
                warn!("{:?} has uncommitted changes, the release will not be committed", self.package_dir);
                false
            }
            Err(e) => {
                warn!("Cannot query version control, the release will not be committed: {}", e);
                false
            }
        }
    }

    /// Commits since the current version's tag, or since the start of history
    /// when that tag does not exist. `None` when git cannot tell.
    fn commits_to_release(&self, git: &Git<'_, R>, current: &SemanticVersion) -> Option<Vec<Commit>> {
        let tag = current.tag();
        let since = match git.has_tag(&tag) {
            Ok(true) => Some(tag),
            Ok(false) => None,
            Err(e) => {
                warn!("Cannot list git tags: {}", e);
                return None;
            }
        };

        match git.commits_since(since.as_deref()) {
            Ok(commits) => {
                let commits: Vec<Commit> = commits
                    .into_iter()
                    .filter(|c| !c.message.starts_with(VERSION_COMMIT_PREFIX))
                    .collect();
                if commits.is_empty() {
                    info!("No new commits since {}", since.as_deref().unwrap_or("the first commit"));
                }
                Some(commits)
            }
            Err(e) => {
                warn!("Cannot read git history: {}", e);
                None
            }
        }
    }

    fn commit_and_tag(&self, git: &Git<'_, R>, version: &SemanticVersion) {
        let message = format!("{}- Automatically generated version {}", VERSION_COMMIT_PREFIX, version);
        if let Err(e) = git.commit(&[CHANGELOG_NAME, MANIFEST_NAME], &message) {
            warn!("Released {} but failed to commit it: {}", version, e);
            return;
        }
        if let Err(e) = git.create_tag(&version.tag()) {
            warn!("Released {} but failed to tag it: {}", version, e);
        }
    }

    fn snapshot(&self) -> Result<RecordedFiles> {
        let manifest = self.runtime.read_to_string(&self.package_dir.join(MANIFEST_NAME))?;
        let changelog_path = self.package_dir.join(CHANGELOG_NAME);
        let changelog = if self.runtime.exists(&changelog_path) {
            Some(self.runtime.read_to_string(&changelog_path)?)
        } else {
            None
        };
        Ok(RecordedFiles { manifest, changelog })
    }

    /// Put `package.json` and `changelog.json` back as they were before the release.
    fn restore(&self, previous: &RecordedFiles) {
        let manifest_path = self.package_dir.join(MANIFEST_NAME);
        if let Err(e) = self.runtime.write(&manifest_path, previous.manifest.as_bytes()) {
            warn!("Failed to restore {:?}: {}", manifest_path, e);
        }

        let changelog_path = self.package_dir.join(CHANGELOG_NAME);
        let restored = match &previous.changelog {
            Some(raw) => self.runtime.write(&changelog_path, raw.as_bytes()),
            None if self.runtime.exists(&changelog_path) => self.runtime.remove_file(&changelog_path),
            None => Ok(()),
        };
        if let Err(e) = restored {
            warn!("Failed to restore {:?}: {}", changelog_path, e);
        }
        info!("Release failed, restored the previous version in {:?}", self.package_dir);
    }

    fn prompt_bump(&self, current: &SemanticVersion) -> Result<VersionBump> {
        let options: Vec<String> = VersionBump::ALL
            .iter()
            .map(|kind| match current.bump(*kind) {
                Ok(next) => format!("{} ({})", kind, next),
                Err(_) => kind.to_string(),
            })
            .collect();
        let index = self.runtime.select(
            &format!("Current version is {}. Which version do you want to release?", current),
            &options,
            VersionBump::ALL.len() - 1,
        )?;
        VersionBump::ALL
            .get(index)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Invalid version selection: {}", index))
    }

    async fn ensure_unreleased(&self, name: &str, version: &SemanticVersion) -> Result<()> {
        let known = self.registry.package_versions(name).await?;
        if known.iter().any(|p| p.version == *version) {
            return Err(EmpError::DuplicateVersion {
                name: name.to_string(),
                version: version.to_string(),
            }
            .into());
        }

        let file_name = release_file_name(name, version);
        if self.registry.has_release(&file_name).await? {
            return Err(EmpError::AlreadyReleased { file_name }.into());
        }
        Ok(())
    }

    fn breaking_description(&self, kind: VersionBump, options: &ReleaseOptions) -> Result<String> {
        match (kind, &options.breaking) {
            (VersionBump::Major, Some(text)) => Ok(text.trim().to_string()),
            (VersionBump::Major, None) => {
                let text = self.runtime.ask_text("Describe the breaking changes:")?;
                if text.is_empty() {
                    warn!("Releasing a major version without a breaking-changes description");
                }
                Ok(text)
            }
            (_, Some(_)) => bail!("Breaking changes can only be released with a major version bump"),
            (_, None) => Ok(String::new()),
        }
    }

    fn record_version(
        &self,
        manifest: &mut Manifest,
        name: &str,
        version: &SemanticVersion,
        breaking: &str,
        commits: Option<Vec<Commit>>,
        options: &ReleaseOptions,
    ) -> Result<()> {
        manifest.set_version(version);
        manifest.save(self.runtime)?;

        let mut changelog = Changelog::load(self.runtime, &self.package_dir)?;
        if changelog.name.is_empty() {
            changelog.name = name.to_string();
        }
        let mut entry = ChangelogEntry::new(*version, breaking);
        entry.commits = commits.filter(|c| !c.is_empty());
        if !options.entries.is_empty() {
            entry.entries = Some(options.entries.clone());
        }
        changelog.append(entry).save(self.runtime)?;

        debug!("Recorded {}@{} in package.json and changelog", name, version);
        Ok(())
    }

    /// Path of the artifact to release.
    fn produce_artifact(&self, file_name: &str, options: &ReleaseOptions) -> Result<PathBuf> {
        if let Some(artifact) = &options.artifact {
            return Ok(resolve_relative_path(&self.package_dir, artifact));
        }

        let Some((program, args)) = split_command(&options.pack_command) else {
            bail!("The configured pack command is empty");
        };

        info!("Running {} in {:?}", options.pack_command, self.package_dir);
        let output = self.runtime.run_command(&program, &args, &self.package_dir)?;
        if !output.success {
            bail!("\"{}\" failed: {}", options.pack_command, output.stderr.trim());
        }

        let packed = self.package_dir.join(file_name);
        if !self.runtime.exists(&packed) {
            return Err(EmpError::io(
                &packed,
                format!("\"{}\" did not produce the expected artifact", options.pack_command),
            )
            .into());
        }

        let releases_dir = self.releases_dir();
        if !self.runtime.is_dir(&releases_dir) {
            self.runtime.create_dir_all(&releases_dir)?;
        }
        let dest = releases_dir.join(file_name);
        move_into_store(self.runtime, &packed, &dest, ARTIFACT_SUFFIX)?;
        Ok(dest)
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.package_dir.join(RELEASES_DIR)
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }
}
