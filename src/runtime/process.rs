//! External command execution.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::Command;

use super::{CommandOutput, RealRuntime};

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_command_impl(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandOutput> {
        debug!("Running {} {:?} in {:?}", program, args, cwd);

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("Failed to run \"{}\" in {:?}", program, cwd))?;

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with success={}", program, result.success);
        Ok(result)
    }
}

/// Split a configured command line such as `"yarn pack"` into program and arguments.
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(String::from);
    let program = parts.next()?;
    Some((program, parts.collect()))
}
