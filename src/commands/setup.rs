use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::registry::{LocalRegistry, Registry};
use crate::runtime::Runtime;
use crate::runtime::path::resolve_relative_path;

use super::config::{ConfigFile, RegistryConfig, config_path};

/// Point the config file at a registry directory and create its store
#[tracing::instrument(skip(runtime))]
pub async fn setup<R: Runtime>(runtime: R, path: Option<PathBuf>) -> Result<()> {
    let registry_root = run_setup(&runtime, path).await?;
    println!("Registry is set up at {}.", registry_root.display());
    Ok(())
}

pub(crate) async fn run_setup<R: Runtime>(runtime: &R, path: Option<PathBuf>) -> Result<PathBuf> {
    let home = runtime
        .home_dir()
        .context("Could not find home directory")?;

    let chosen = match path {
        Some(path) => path,
        None => {
            let answer = runtime.ask_text(&format!(
                "Where should the registry live? (Enter for {})",
                home.display()
            ))?;
            if answer.is_empty() {
                home.clone()
            } else {
                PathBuf::from(answer)
            }
        }
    };
    let registry_root = resolve_relative_path(&runtime.current_dir()?, &chosen);

    if !runtime.is_dir(&registry_root) {
        bail!(
            "The registry directory {} does not exist. Create it first.",
            registry_root.display()
        );
    }

    let path = config_path(runtime)?;
    let mut file = ConfigFile::load(runtime, &path)?;
    file.registries = vec![RegistryConfig::Local {
        registry_path: registry_root.clone(),
    }];
    file.save(runtime, &path)?;

    LocalRegistry::new(runtime, &registry_root).initialize().await?;
    Ok(registry_root)
}
