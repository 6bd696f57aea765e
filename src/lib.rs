pub mod application;
pub mod catalog;
pub mod changelog;
pub mod commands;
pub mod error;
pub mod manifest;
pub mod package;
pub mod registry;
pub mod runtime;
pub mod transfer;
pub mod vcs;

/// Test utilities for registry fixtures and consumer manifests.
#[cfg(test)]
pub mod test_utils {
    use crate::catalog::PackageVersion;
    use crate::package::{SemanticVersion, release_file_name};
    use crate::registry::{Registry, ReleaseRequest};
    use crate::runtime::RealRuntime;
    use crate::transfer::hash_file;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Returns a test home directory path based on the platform.
    /// - Unix: `/home/user`
    /// - Windows: `C:\Users\user`
    pub fn test_home() -> PathBuf {
        #[cfg(not(windows))]
        {
            PathBuf::from("/home/user")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\Users\user")
        }
    }

    /// Release `name@version` with the given artifact bytes.
    /// The artifact is written to `work_dir` first, as a packer would.
    pub async fn publish(
        registry: &dyn Registry,
        work_dir: &Path,
        name: &str,
        version: &str,
        bytes: &str,
        breaking: &str,
    ) -> PackageVersion {
        let version = SemanticVersion::parse(version).unwrap();
        let file_name = release_file_name(name, &version);
        let artifact = work_dir.join(&file_name);
        fs::write(&artifact, bytes).unwrap();

        registry
            .release(ReleaseRequest {
                file_hash: hash_file(&RealRuntime, &artifact).unwrap(),
                artifact,
                file_name,
                package_name: name.into(),
                version,
                breaking_changes: breaking.into(),
            })
            .await
            .unwrap()
    }

    /// Write `package.json` into `dir`.
    pub fn write_manifest(dir: &Path, json: &str) {
        fs::write(dir.join("package.json"), json).unwrap();
    }

    pub fn read_manifest(dir: &Path) -> serde_json::Value {
        let raw = fs::read_to_string(dir.join("package.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }
}
