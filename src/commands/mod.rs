use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::registry::Registry;
use crate::runtime::Runtime;

pub mod config;
mod install;
mod list;
mod release;
mod setup;
mod show;
mod upgrade;
mod verify;

pub use install::install;
pub use list::list;
pub use release::{ReleaseFlags, release};
pub use setup::setup;
pub use show::show;
pub use upgrade::{UpgradeFlags, upgrade};
pub use verify::verify;

/// Options every command accepts.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Directory holding `.emp-registry`
    pub registry: Option<PathBuf>,
    /// Project or package directory to work in
    pub project: Option<PathBuf>,
}

/// Ask the user to pick one of the registry's packages.
pub(crate) async fn select_package<R: Runtime>(
    runtime: &R,
    registry: &dyn Registry,
    prompt: &str,
) -> Result<String> {
    let mut names = registry.all_package_names().await?;
    if names.is_empty() {
        bail!("No packages have been released to the registry yet.");
    }
    let index = runtime.select(prompt, &names, 0)?;
    if index >= names.len() {
        bail!("Invalid package selection: {}", index);
    }
    Ok(names.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MockRegistry;
    use crate::runtime::MockRuntime;

    #[tokio::test]
    async fn test_select_package() {
        let mut registry = MockRegistry::new();
        registry
            .expect_all_package_names()
            .returning(|| Ok(vec!["a".into(), "b".into(), "c".into()]));
        let mut runtime = MockRuntime::new();
        runtime
            .expect_select()
            .withf(|_, options, _| options.len() == 3)
            .returning(|_, _, _| Ok(1));

        let name = select_package(&runtime, &registry, "Pick:").await.unwrap();
        assert_eq!(name, "b");
    }

    #[tokio::test]
    async fn test_select_package_empty_registry() {
        let mut registry = MockRegistry::new();
        registry.expect_all_package_names().returning(|| Ok(vec![]));
        let runtime = MockRuntime::new();

        assert!(select_package(&runtime, &registry, "Pick:").await.is_err());
    }
}
