//! Application layer - Use cases that coordinate the registry, manifest and changelog.
//!
//! This layer contains the install, upgrade and release flows and is driven
//! by the CLI layer in `commands`.

mod install;
mod release;
mod upgrade;

pub use install::{
    BreakingChange, InstallOptions, InstallOutcome, InstallUseCase, UpgradeOutcome,
    breaking_changes_summary,
};
pub use release::{RELEASES_DIR, ReleaseOptions, ReleaseOutcome, ReleaseUseCase};
pub use upgrade::{
    UPGRADE_COMMIT_MESSAGE, UpgradeOptions, UpgradeReport, UpgradeUseCase, UpgradedPackage,
    run_installer,
};
