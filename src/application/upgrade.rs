//! Upgrade use case - brings every registry package a project uses up to date.
//!
//! Each package goes through [`InstallUseCase::upgrade`]. When anything
//! changed, the project's own installer runs and the result is committed.

use std::path::Path;

use anyhow::{Result, bail};
use log::{info, warn};

use crate::manifest::{DEPENDENCY_FOLDER, MANIFEST_NAME};
use crate::package::SemanticVersion;
use crate::registry::Registry;
use crate::runtime::{Runtime, split_command};
use crate::vcs::Git;

use super::install::{InstallOptions, InstallUseCase, UpgradeOutcome};

pub const UPGRADE_COMMIT_MESSAGE: &str =
    "[dependency-upgrade] - Automatically upgraded package versions";

/// Lockfiles the installer may rewrite, staged with the upgrade commit when present.
pub const LOCKFILES: [&str; 3] = ["package-lock.json", "yarn.lock", "pnpm-lock.yaml"];

#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    pub install: InstallOptions,
    /// Restrict the sweep to one package
    pub package: Option<String>,
    /// Command run in the project after something changed, e.g. `npm install`
    pub install_command: String,
    pub skip_install: bool,
    pub commit: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            install: InstallOptions::default(),
            package: None,
            install_command: "npm install".into(),
            skip_install: false,
            commit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradedPackage {
    pub name: String,
    pub from: SemanticVersion,
    pub to: SemanticVersion,
}

#[derive(Debug, Default)]
pub struct UpgradeReport {
    pub upgraded: Vec<UpgradedPackage>,
    pub up_to_date: Vec<String>,
    pub installer_ran: bool,
    pub committed: bool,
}

impl UpgradeReport {
    pub fn has_changes(&self) -> bool {
        !self.upgraded.is_empty()
    }
}

pub struct UpgradeUseCase<'a, R: Runtime> {
    runtime: &'a R,
    registry: &'a dyn Registry,
    installer: InstallUseCase<'a, R>,
}

impl<'a, R: Runtime> UpgradeUseCase<'a, R> {
    pub fn new(runtime: &'a R, registry: &'a dyn Registry, project_dir: &Path) -> Self {
        Self {
            runtime,
            registry,
            installer: InstallUseCase::new(runtime, registry, project_dir),
        }
    }

    /// Upgrade the selected packages.
    ///
    /// A declined major upgrade stops the sweep; upgrades already written stay.
    #[tracing::instrument(skip(self, options))]
    pub async fn upgrade_all(&self, options: &UpgradeOptions) -> Result<UpgradeReport> {
        let project_dir = self.installer.project_dir();
        let git = Git::new(self.runtime, project_dir);

        // Only a tree that was clean beforehand gets an automatic commit
        let was_clean = options.commit
            && match git.has_uncommitted_changes() {
                Ok(dirty) => !dirty,
                Err(e) => {
                    warn!("Cannot query version control, not committing: {}", e);
                    false
                }
            };

        let names = match &options.package {
            Some(name) => vec![name.clone()],
            None => self.registry.all_package_names().await?,
        };

        let mut report = UpgradeReport::default();
        for name in names {
            match self.installer.upgrade(&name, &options.install).await? {
                UpgradeOutcome::Upgraded { from, to } => {
                    report.upgraded.push(UpgradedPackage { name, from, to });
                }
                UpgradeOutcome::UpToDate { .. } => report.up_to_date.push(name),
                UpgradeOutcome::NotInstalled => {}
            }
        }

        if !report.has_changes() {
            info!("All packages are up to date");
            return Ok(report);
        }

        if !options.skip_install {
            run_installer(self.runtime, &options.install_command, project_dir)?;
            report.installer_ran = true;
        }

        if was_clean {
            let mut paths = vec![MANIFEST_NAME, DEPENDENCY_FOLDER];
            paths.extend(
                LOCKFILES
                    .into_iter()
                    .filter(|lockfile| self.runtime.exists(&project_dir.join(lockfile))),
            );
            match git.commit(&paths, UPGRADE_COMMIT_MESSAGE) {
                Ok(()) => report.committed = true,
                Err(e) => warn!("Failed to commit upgraded packages: {}", e),
            }
        }

        Ok(report)
    }
}

/// Run the project's installer-of-record, such as `npm install`, inside `project_dir`.
pub fn run_installer<R: Runtime + ?Sized>(
    runtime: &R,
    command: &str,
    project_dir: &Path,
) -> Result<()> {
    let Some((program, args)) = split_command(command) else {
        bail!("The configured install command is empty");
    };

    info!("Running {} in {:?}", command, project_dir);
    let output = runtime.run_command(&program, &args, project_dir)?;
    if !output.success {
        bail!("\"{}\" failed: {}", command, output.stderr.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmpError, kind_of};
    use crate::registry::LocalRegistry;
    use crate::runtime::{CommandOutput, MockRuntime, RealRuntime};
    use crate::test_utils::{publish, read_manifest, write_manifest};
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Mock runtime that hits the real filesystem and records external commands.
    fn filesystem_runtime(commands: Arc<Mutex<Vec<String>>>, clean_tree: bool) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|p| p.exists());
        runtime.expect_is_dir().returning(|p| p.is_dir());
        runtime
            .expect_read_to_string()
            .returning(|p| Ok(fs::read_to_string(p)?));
        runtime
            .expect_write()
            .returning(|p, c| Ok(fs::write(p, c)?));
        runtime
            .expect_create_dir_all()
            .returning(|p| Ok(fs::create_dir_all(p)?));
        runtime
            .expect_remove_file()
            .returning(|p| Ok(fs::remove_file(p)?));
        runtime
            .expect_open()
            .returning(|p| Ok(Box::new(fs::File::open(p)?) as Box<dyn Read + Send>));
        runtime
            .expect_run_command()
            .returning(move |program, args, cwd| {
                let line = format!("{} {}", program, args.join(" "));
                if line == "npm install" {
                    fs::write(cwd.join("package-lock.json"), "{}")?;
                }
                let status = if line == "git status --porcelain" && !clean_tree {
                    " M package.json"
                } else {
                    ""
                };
                commands.lock().unwrap().push(line);
                Ok(CommandOutput {
                    success: true,
                    stdout: status.into(),
                    stderr: String::new(),
                })
            });
        runtime
    }

    struct Setup {
        reg_root: tempfile::TempDir,
        work: tempfile::TempDir,
        app: tempfile::TempDir,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                reg_root: tempdir().unwrap(),
                work: tempdir().unwrap(),
                app: tempdir().unwrap(),
            }
        }

        fn registry(&self) -> LocalRegistry<'static, RealRuntime> {
            LocalRegistry::new(&RealRuntime, self.reg_root.path())
        }

        fn app(&self) -> PathBuf {
            self.app.path().to_path_buf()
        }
    }

    #[tokio::test]
    async fn test_sweep_upgrades_installs_and_commits() {
        let setup = Setup::new();
        let registry = setup.registry();
        registry.initialize().await.unwrap();
        publish(&registry, setup.work.path(), "a", "1.0.0", "a1", "").await;
        publish(&registry, setup.work.path(), "a", "1.2.0", "a12", "").await;
        publish(&registry, setup.work.path(), "b", "3.0.0", "b3", "").await;
        publish(&registry, setup.work.path(), "unused", "1.0.0", "u", "").await;
        write_manifest(
            &setup.app(),
            r#"{"dependencies":{"a":"./.dependencies/a-v1.0.0.tgz"},
                "devDependencies":{"b":"./.dependencies/b-v3.0.0.tgz"}}"#,
        );

        let commands = Arc::new(Mutex::new(Vec::new()));
        let runtime = filesystem_runtime(commands.clone(), true);
        let use_case = UpgradeUseCase::new(&runtime, &registry, &setup.app());
        let report = use_case.upgrade_all(&UpgradeOptions::default()).await.unwrap();

        assert_eq!(
            report.upgraded,
            vec![UpgradedPackage {
                name: "a".into(),
                from: SemanticVersion::new(1, 0, 0),
                to: SemanticVersion::new(1, 2, 0),
            }]
        );
        assert_eq!(report.up_to_date, vec!["b".to_string()]);
        assert!(report.installer_ran);
        assert!(report.committed);
        assert_eq!(
            *commands.lock().unwrap(),
            vec![
                "git status --porcelain".to_string(),
                "npm install".to_string(),
                "git add -- package.json .dependencies package-lock.json".to_string(),
                format!("git commit -m {}", UPGRADE_COMMIT_MESSAGE),
            ]
        );
        assert_eq!(
            read_manifest(&setup.app())["dependencies"]["a"],
            "./.dependencies/a-v1.2.0.tgz"
        );
    }

    #[tokio::test]
    async fn test_commit_skips_missing_lockfile() {
        let setup = Setup::new();
        let registry = setup.registry();
        registry.initialize().await.unwrap();
        publish(&registry, setup.work.path(), "a", "1.0.0", "a1", "").await;
        publish(&registry, setup.work.path(), "a", "1.1.0", "a11", "").await;
        write_manifest(
            &setup.app(),
            r#"{"dependencies":{"a":"./.dependencies/a-v1.0.0.tgz"}}"#,
        );
        fs::write(setup.app().join("yarn.lock"), "# yarn").unwrap();

        let commands = Arc::new(Mutex::new(Vec::new()));
        let runtime = filesystem_runtime(commands.clone(), true);
        let use_case = UpgradeUseCase::new(&runtime, &registry, &setup.app());
        let options = UpgradeOptions {
            skip_install: true,
            ..Default::default()
        };
        let report = use_case.upgrade_all(&options).await.unwrap();

        assert!(report.committed);
        assert_eq!(
            commands.lock().unwrap()[1],
            "git add -- package.json .dependencies yarn.lock"
        );
    }

    #[tokio::test]
    async fn test_sweep_without_changes_runs_nothing() {
        let setup = Setup::new();
        let registry = setup.registry();
        registry.initialize().await.unwrap();
        publish(&registry, setup.work.path(), "a", "1.0.0", "a1", "").await;
        write_manifest(
            &setup.app(),
            r#"{"dependencies":{"a":"./.dependencies/a-v1.0.0.tgz"}}"#,
        );

        let commands = Arc::new(Mutex::new(Vec::new()));
        let runtime = filesystem_runtime(commands.clone(), true);
        let use_case = UpgradeUseCase::new(&runtime, &registry, &setup.app());
        let report = use_case.upgrade_all(&UpgradeOptions::default()).await.unwrap();

        assert!(!report.has_changes());
        assert!(!report.installer_ran);
        assert_eq!(*commands.lock().unwrap(), vec!["git status --porcelain".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_on_dirty_tree_does_not_commit() {
        let setup = Setup::new();
        let registry = setup.registry();
        registry.initialize().await.unwrap();
        publish(&registry, setup.work.path(), "a", "1.0.0", "a1", "").await;
        publish(&registry, setup.work.path(), "a", "1.0.1", "a101", "").await;
        write_manifest(
            &setup.app(),
            r#"{"dependencies":{"a":"./.dependencies/a-v1.0.0.tgz"}}"#,
        );

        let commands = Arc::new(Mutex::new(Vec::new()));
        let runtime = filesystem_runtime(commands.clone(), false);
        let use_case = UpgradeUseCase::new(&runtime, &registry, &setup.app());
        let options = UpgradeOptions {
            skip_install: true,
            ..Default::default()
        };
        let report = use_case.upgrade_all(&options).await.unwrap();

        assert!(report.has_changes());
        assert!(!report.installer_ran);
        assert!(!report.committed);
        assert_eq!(*commands.lock().unwrap(), vec!["git status --porcelain".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_declined_major_keeps_manifest() {
        let setup = Setup::new();
        let registry = setup.registry();
        registry.initialize().await.unwrap();
        publish(&registry, setup.work.path(), "ui", "1.4.0", "one", "").await;
        publish(&registry, setup.work.path(), "ui", "2.0.0", "two", "Removed Button.size").await;
        let manifest = r#"{"dependencies":{"ui":"./.dependencies/ui-v1.4.0.tgz"}}"#;
        write_manifest(&setup.app(), manifest);

        let commands = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = filesystem_runtime(commands, true);
        runtime.expect_confirm().times(1).returning(|_| Ok(false));

        let use_case = UpgradeUseCase::new(&runtime, &registry, &setup.app());
        let options = UpgradeOptions {
            commit: false,
            ..Default::default()
        };
        let err = use_case.upgrade_all(&options).await.unwrap_err();

        assert!(matches!(kind_of(&err), Some(EmpError::UserAborted { .. })));
        assert_eq!(
            read_manifest(&setup.app())["dependencies"]["ui"],
            "./.dependencies/ui-v1.4.0.tgz"
        );
    }

    #[test]
    fn test_failing_installer_is_an_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run_command().returning(|_, _, _| {
            Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: "npm ERR! missing script".into(),
            })
        });

        let err = run_installer(&runtime, "npm install", Path::new("/app")).unwrap_err();
        assert!(err.to_string().contains("npm ERR!"));
    }
}
