//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over system operations,
//! enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `path` - Path utility functions (normalize, is_path_under, resolve_relative_path)
//! - `env` - Home and working directories
//! - `fs` - File system operations (read, write, copy, directory)
//! - `process` - External command execution
//! - `user` - User interaction (confirmation, choice and free-text prompts)

mod env;
mod fs;
pub mod path;
mod process;
mod user;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use path::is_path_under;
pub use process::split_command;

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>>;

    /// Create a file that must not exist yet.
    /// Returns Ok(false) without touching anything if the path already exists.
    fn create_new(&self, path: &Path, contents: &[u8]) -> Result<bool>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;
    fn current_dir(&self) -> Result<PathBuf>;

    // External commands
    /// Run `program` with `args` inside `cwd` and wait for it to finish.
    fn run_command(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput>;

    // User interaction
    /// Prompt user for confirmation. Returns true if user confirms (y/yes), false otherwise.
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Let the user pick one of `options`. Returns the selected index.
    fn select(&self, prompt: &str, options: &[String], default: usize) -> Result<usize>;

    /// Ask for a line of free text. An empty answer is returned as an empty string.
    fn ask_text(&self, prompt: &str) -> Result<String>;
}

pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>> {
        self.open_impl(path)
    }

    fn create_new(&self, path: &Path, contents: &[u8]) -> Result<bool> {
        self.create_new_impl(path, contents)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn run_command(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        self.run_command_impl(program, args, cwd)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirm_impl(prompt)
    }

    fn select(&self, prompt: &str, options: &[String], default: usize) -> Result<usize> {
        self.select_impl(prompt, options, default)
    }

    fn ask_text(&self, prompt: &str) -> Result<String> {
        self.ask_text_impl(prompt)
    }
}
