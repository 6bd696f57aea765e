use anyhow::Result;
use log::debug;

use crate::application::{InstallOptions, InstallOutcome, InstallUseCase, run_installer};
use crate::registry::{LocalRegistry, Registry};
use crate::runtime::Runtime;

use super::config::Config;
use super::{GlobalOptions, select_package};

/// Install a registry package into the project
#[tracing::instrument(skip(runtime, global, options))]
pub async fn install<R: Runtime>(
    runtime: R,
    global: &GlobalOptions,
    package: Option<String>,
    options: InstallOptions,
    skip_install: bool,
) -> Result<()> {
    let config = Config::new(runtime, global.registry.clone(), global.project.clone())?;
    run_install(&config, package, &options, skip_install).await
}

pub(crate) async fn run_install<R: Runtime>(
    config: &Config<R>,
    package: Option<String>,
    options: &InstallOptions,
    skip_install: bool,
) -> Result<()> {
    let registry = LocalRegistry::new(&config.runtime, &config.registry_root);
    registry.initialize().await?;

    let name = match package {
        Some(name) => name,
        None => select_package(&config.runtime, &registry, "Select the package to install:").await?,
    };
    debug!("Installing {} into {:?}", name, config.project_dir);

    let use_case = InstallUseCase::new(&config.runtime, &registry, &config.project_dir);
    match use_case.install(&name, options).await? {
        InstallOutcome::Installed { version, category } => {
            println!("Installed {}@{} as {}.", name, version, category);
            if !skip_install {
                run_installer(&config.runtime, &config.install_command, &config.project_dir)?;
            }
        }
        InstallOutcome::AlreadyInstalled { version } => {
            println!(
                "{} is already installed ({}). Use `emp upgrade` to update it.",
                name, version
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::DependencyCategory;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{publish, read_manifest, write_manifest};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_install_writes_manifest() {
        let registry_root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let project = tempdir().unwrap();
        {
            let registry = LocalRegistry::new(&RealRuntime, registry_root.path());
            registry.initialize().await.unwrap();
            publish(&registry, work.path(), "ui", "1.0.0", "X", "").await;
        }
        write_manifest(project.path(), r#"{"name":"app"}"#);

        let config = Config {
            runtime: RealRuntime,
            registry_root: registry_root.path().to_path_buf(),
            project_dir: project.path().to_path_buf(),
            install_command: "true".into(),
            pack_command: "true".into(),
        };
        let options = InstallOptions {
            category: Some(DependencyCategory::Runtime),
            ..Default::default()
        };

        run_install(&config, Some("ui".into()), &options, true).await.unwrap();
        assert_eq!(
            read_manifest(project.path())["dependencies"]["ui"],
            "./.dependencies/ui-v1.0.0.tgz"
        );

        // Re-running only reports
        run_install(&config, Some("ui".into()), &options, true).await.unwrap();
    }
}
