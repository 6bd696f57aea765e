use anyhow::Result;
use std::path::PathBuf;

use crate::application::{ReleaseOptions, ReleaseOutcome, ReleaseUseCase};
use crate::package::VersionBump;
use crate::registry::{LocalRegistry, Registry};
use crate::runtime::Runtime;

use super::GlobalOptions;
use super::config::Config;

/// Flags of `emp release`.
#[derive(Debug, Clone, Default)]
pub struct ReleaseFlags {
    pub bump: Option<VersionBump>,
    pub current: bool,
    pub breaking: Option<String>,
    pub entries: Vec<String>,
    pub artifact: Option<PathBuf>,
    pub no_commit: bool,
}

/// Release the package in the project directory
#[tracing::instrument(skip(runtime, global, flags))]
pub async fn release<R: Runtime>(runtime: R, global: &GlobalOptions, flags: ReleaseFlags) -> Result<()> {
    let config = Config::new(runtime, global.registry.clone(), global.project.clone())?;
    match run_release(&config, flags).await? {
        ReleaseOutcome::Released(entry) => println!(
            "Released {}@{} as {} (sha256 {}).",
            entry.package_name, entry.version, entry.file_name, entry.file_hash
        ),
        ReleaseOutcome::AlreadyReleased { name, version } => {
            println!("{}@{} was already released.", name, version)
        }
    }
    Ok(())
}

pub(crate) async fn run_release<R: Runtime>(config: &Config<R>, flags: ReleaseFlags) -> Result<ReleaseOutcome> {
    let registry = LocalRegistry::new(&config.runtime, &config.registry_root);
    registry.initialize().await?;

    let options = ReleaseOptions {
        bump: flags.bump,
        current: flags.current,
        breaking: flags.breaking,
        entries: flags.entries,
        artifact: flags.artifact,
        pack_command: config.pack_command.clone(),
        commit: !flags.no_commit,
    };

    let use_case = ReleaseUseCase::new(&config.runtime, &registry, &config.project_dir);
    use_case.release(&options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::write_manifest;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_release_initializes_store() {
        let registry_root = tempdir().unwrap();
        let package = tempdir().unwrap();
        write_manifest(package.path(), r#"{"name":"ui","version":"0.1.0"}"#);
        fs::write(package.path().join("ui.tgz"), "bytes").unwrap();

        let config = Config {
            runtime: RealRuntime,
            registry_root: registry_root.path().to_path_buf(),
            project_dir: package.path().to_path_buf(),
            install_command: "true".into(),
            pack_command: "true".into(),
        };
        let flags = ReleaseFlags {
            bump: Some(VersionBump::Patch),
            artifact: Some(PathBuf::from("ui.tgz")),
            no_commit: true,
            ..Default::default()
        };
        let outcome = run_release(&config, flags).await.unwrap();

        let ReleaseOutcome::Released(entry) = outcome else {
            panic!("expected a release");
        };
        assert_eq!(entry.file_name, "ui-v0.1.1.tgz");
        assert!(registry_root.path().join(".emp-registry/ui-v0.1.1.tgz").exists());
        assert!(registry_root.path().join(".emp-registry/.packages.json").exists());
    }
}
