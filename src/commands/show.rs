use anyhow::Result;
use log::debug;

use crate::catalog::PackageVersion;
use crate::error::EmpError;
use crate::manifest::Manifest;
use crate::registry::{LocalRegistry, Registry};
use crate::runtime::Runtime;

use super::GlobalOptions;
use super::config::Config;

/// Show the released versions of a package
#[tracing::instrument(skip(runtime, global))]
pub async fn show<R: Runtime>(runtime: R, global: &GlobalOptions, name: &str) -> Result<()> {
    let config = Config::new(runtime, global.registry.clone(), global.project.clone())?;
    let registry = LocalRegistry::new(&config.runtime, &config.registry_root);

    let versions = registry.package_versions(name).await?;
    if versions.is_empty() {
        return Err(EmpError::not_found(format!("No such package in registry: {}", name)).into());
    }
    let latest = registry.package_latest_version(name).await?;

    println!("Package: {}", name);
    if let Some(latest) = &latest {
        println!("Latest version: {}", latest.version);
    }

    // The project's own reference, if the command runs inside a consumer
    match Manifest::load(&config.runtime, &config.project_dir) {
        Ok(manifest) => {
            if let Some(existing) = manifest.existing_dependency(name)? {
                println!("Installed here: {} ({})", existing.version, existing.category);
            }
        }
        Err(e) => debug!("No manifest in {:?}: {}", config.project_dir, e),
    }

    println!("\nReleases:");
    for line in version_lines(&versions) {
        println!("{}", line);
    }
    Ok(())
}

fn version_lines(versions: &[PackageVersion]) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in versions {
        lines.push(format!(
            "  {}  {}  sha256:{}",
            entry.version, entry.file_name, entry.file_hash
        ));
        if entry.has_breaking_changes() {
            lines.push(format!(
                "      breaking: {}",
                entry.breaking_changes_description.trim()
            ));
        }
    }
    lines
}
