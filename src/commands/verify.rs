use anyhow::{Result, bail};

use crate::registry::{LocalRegistry, Registry, StoreIssue, StoreProblem};
use crate::runtime::Runtime;

use super::GlobalOptions;
use super::config::Config;

/// Re-hash every stored artifact against the catalog
#[tracing::instrument(skip(runtime, global))]
pub async fn verify<R: Runtime>(runtime: R, global: &GlobalOptions) -> Result<()> {
    let config = Config::new(runtime, global.registry.clone(), global.project.clone())?;
    let registry = LocalRegistry::new(&config.runtime, &config.registry_root);

    let issues = registry.verify_store().await?;
    if issues.is_empty() {
        println!("All artifacts in {} match the catalog.", registry.store_dir().display());
        return Ok(());
    }

    for issue in &issues {
        println!("{}", describe(issue));
    }
    bail!("{} artifact(s) failed verification", issues.len());
}

fn describe(issue: &StoreIssue) -> String {
    let entry = &issue.entry;
    match &issue.problem {
        StoreProblem::Missing => format!(
            "[MISSING] {}@{}: {}",
            entry.package_name, entry.version, entry.file_name
        ),
        StoreProblem::HashMismatch { actual } => format!(
            "[TAMPERED] {}@{}: {} has sha256 {}, catalog records {}",
            entry.package_name, entry.version, entry.file_name, actual, entry.file_hash
        ),
    }
}
