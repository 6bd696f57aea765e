use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::runtime::path::resolve_relative_path;

pub const CONFIG_FILE_NAME: &str = ".emp-config.json";
pub const DEFAULT_INSTALL_COMMAND: &str = "npm install";
pub const DEFAULT_PACK_COMMAND: &str = "yarn pack";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryConfig {
    #[serde(rename_all = "camelCase")]
    Local { registry_path: PathBuf },
}

/// Contents of `~/.emp-config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_command: Option<String>,
}

impl ConfigFile {
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No config file at {:?}", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config {:?}", path))
    }

    pub fn save<R: Runtime + ?Sized>(&self, runtime: &R, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, json.as_bytes())
            .with_context(|| format!("Failed to save config to {:?}", path))
    }

    pub fn local_registry(&self) -> Option<&Path> {
        self.registries.first().map(|r| match r {
            RegistryConfig::Local { registry_path } => registry_path.as_path(),
        })
    }
}

pub fn config_path<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let home = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home.join(CONFIG_FILE_NAME))
}

/// Settings every command runs with, resolved from flags, environment and the config file.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub registry_root: PathBuf,
    pub project_dir: PathBuf,
    pub install_command: String,
    pub pack_command: String,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, registry: Option<PathBuf>, project: Option<PathBuf>) -> Result<Self> {
        let file = ConfigFile::load(&runtime, &config_path(&runtime)?)?;
        let cwd = runtime.current_dir()?;

        let registry_root = match registry {
            Some(path) => resolve_relative_path(&cwd, &path),
            None => match file.local_registry() {
                Some(path) => path.to_path_buf(),
                None => runtime
                    .home_dir()
                    .context("Could not find home directory")?,
            },
        };
        let project_dir = match project {
            Some(path) => resolve_relative_path(&cwd, &path),
            None => cwd,
        };
        debug!("Registry root {:?}, project {:?}", registry_root, project_dir);

        Ok(Self {
            runtime,
            registry_root,
            project_dir,
            install_command: file
                .install_command
                .unwrap_or_else(|| DEFAULT_INSTALL_COMMAND.to_string()),
            pack_command: file
                .pack_command
                .unwrap_or_else(|| DEFAULT_PACK_COMMAND.to_string()),
        })
    }
}
