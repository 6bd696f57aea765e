use anyhow::Result;

use crate::application::{InstallOptions, UpgradeOptions, UpgradeReport, UpgradeUseCase};
use crate::registry::{LocalRegistry, Registry};
use crate::runtime::Runtime;

use super::GlobalOptions;
use super::config::Config;

/// Flags of `emp upgrade`.
#[derive(Debug, Clone, Default)]
pub struct UpgradeFlags {
    pub package: Option<String>,
    pub yes: bool,
    pub changelog: Option<std::path::PathBuf>,
    pub skip_install: bool,
    pub no_commit: bool,
}

#[tracing::instrument(skip(runtime, global, flags))]
pub async fn upgrade<R: Runtime>(runtime: R, global: &GlobalOptions, flags: UpgradeFlags) -> Result<()> {
    let config = Config::new(runtime, global.registry.clone(), global.project.clone())?;
    let report = run_upgrade(&config, flags).await?;
    print_report(&report);
    Ok(())
}

pub(crate) async fn run_upgrade<R: Runtime>(config: &Config<R>, flags: UpgradeFlags) -> Result<UpgradeReport> {
    let registry = LocalRegistry::new(&config.runtime, &config.registry_root);
    registry.initialize().await?;

    let options = UpgradeOptions {
        install: InstallOptions {
            category: None,
            yes: flags.yes,
            changelog_dir: flags.changelog,
        },
        package: flags.package,
        install_command: config.install_command.clone(),
        skip_install: flags.skip_install,
        commit: !flags.no_commit,
    };

    let use_case = UpgradeUseCase::new(&config.runtime, &registry, &config.project_dir);
    use_case.upgrade_all(&options).await
}

fn print_report(report: &UpgradeReport) {
    if !report.has_changes() {
        println!("All packages are up to date.");
        return;
    }

    println!("Upgraded packages:");
    for package in &report.upgraded {
        println!("  {} {} -> {}", package.name, package.from, package.to);
    }
    if report.committed {
        println!("Committed the upgrade.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{publish, read_manifest, write_manifest};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_upgrade_single_package() {
        let registry_root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let project = tempdir().unwrap();
        let registry = LocalRegistry::new(&RealRuntime, registry_root.path());
        registry.initialize().await.unwrap();
        publish(&registry, work.path(), "ui", "1.0.0", "one", "").await;
        publish(&registry, work.path(), "ui", "1.0.1", "two", "").await;
        publish(&registry, work.path(), "other", "1.0.1", "o", "").await;
        write_manifest(
            project.path(),
            r#"{"dependencies":{"ui":"./.dependencies/ui-v1.0.0.tgz","other":"./.dependencies/other-v1.0.0.tgz"}}"#,
        );

        let config = Config {
            runtime: RealRuntime,
            registry_root: registry_root.path().to_path_buf(),
            project_dir: project.path().to_path_buf(),
            install_command: "true".into(),
            pack_command: "true".into(),
        };
        let flags = UpgradeFlags {
            package: Some("ui".into()),
            skip_install: true,
            no_commit: true,
            ..Default::default()
        };
        let report = run_upgrade(&config, flags).await.unwrap();

        assert_eq!(report.upgraded.len(), 1);
        let manifest = read_manifest(project.path());
        assert_eq!(manifest["dependencies"]["ui"], "./.dependencies/ui-v1.0.1.tgz");
        assert_eq!(manifest["dependencies"]["other"], "./.dependencies/other-v1.0.0.tgz");
    }
}
