//! Environment and system directory operations.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn current_dir_impl(&self) -> Result<PathBuf> {
        env::current_dir().context("Failed to determine the current directory")
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_real_runtime_env_and_dirs() {
        let runtime = RealRuntime;

        let home = runtime.home_dir();
        assert!(home.is_some() || cfg!(target_os = "linux")); // CI might not have home

        let cwd = runtime.current_dir().unwrap();
        assert!(cwd.is_absolute());
    }
}
