use anyhow::Result;
use log::debug;

use crate::catalog::PackageVersion;
use crate::registry::{LocalRegistry, Registry};
use crate::runtime::Runtime;

use super::GlobalOptions;
use super::config::Config;

/// List every package in the registry with its latest version
#[tracing::instrument(skip(runtime, global))]
pub async fn list<R: Runtime>(runtime: R, global: &GlobalOptions) -> Result<()> {
    let config = Config::new(runtime, global.registry.clone(), global.project.clone())?;
    let latest = latest_versions(&config).await?;

    if latest.is_empty() {
        println!("No packages released yet.");
        return Ok(());
    }

    for entry in latest {
        println!("{} {}", entry.package_name, entry.version);
    }
    Ok(())
}

pub(crate) async fn latest_versions<R: Runtime>(config: &Config<R>) -> Result<Vec<PackageVersion>> {
    let registry = LocalRegistry::new(&config.runtime, &config.registry_root);
    debug!("Listing packages from {:?}", registry.store_dir());

    let mut latest = Vec::new();
    for name in registry.all_package_names().await? {
        if let Some(entry) = registry.package_latest_version(&name).await? {
            latest.push(entry);
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::publish;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_latest_versions_sorted_by_name() {
        let registry_root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let registry = LocalRegistry::new(&RealRuntime, registry_root.path());
        registry.initialize().await.unwrap();
        publish(&registry, work.path(), "zeta", "1.0.0", "z", "").await;
        publish(&registry, work.path(), "alpha", "2.0.0", "a2", "").await;
        publish(&registry, work.path(), "alpha", "1.5.0", "a15", "").await;

        let config = Config {
            runtime: RealRuntime,
            registry_root: registry_root.path().to_path_buf(),
            project_dir: work.path().to_path_buf(),
            install_command: "true".into(),
            pack_command: "true".into(),
        };
        let listed: Vec<String> = latest_versions(&config)
            .await
            .unwrap()
            .iter()
            .map(|e| format!("{} {}", e.package_name, e.version))
            .collect();

        assert_eq!(listed, vec!["alpha 2.0.0", "zeta 1.0.0"]);
    }

    #[tokio::test]
    async fn test_latest_versions_without_store() {
        let registry_root = tempdir().unwrap();
        let config = Config {
            runtime: RealRuntime,
            registry_root: registry_root.path().to_path_buf(),
            project_dir: registry_root.path().to_path_buf(),
            install_command: "true".into(),
            pack_command: "true".into(),
        };
        assert!(latest_versions(&config).await.unwrap().is_empty());
    }
}
