//! Git operations around releases and automatic upgrades.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::debug;

use crate::changelog::Commit;
use crate::runtime::{CommandOutput, Runtime};

/// Separates the fields of one `git log` line.
const FIELD_SEPARATOR: char = '\u{1f}';
const LOG_FORMAT: &str = "--format=%H%x1f%s%x1f%an%x1f%aI";

pub struct Git<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    dir: PathBuf,
}

impl<'a, R: Runtime + ?Sized> Git<'a, R> {
    pub fn new(runtime: &'a R, dir: &Path) -> Self {
        Self {
            runtime,
            dir: dir.to_path_buf(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = self.runtime.run_command("git", &args, &self.dir)?;
        if !output.success {
            bail!(
                "git {} failed in {:?}: {}",
                args.join(" "),
                self.dir,
                output.stderr.trim()
            );
        }
        Ok(output)
    }

    /// Whether the working tree has staged, unstaged or untracked changes.
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let output = self.git(&["status", "--porcelain"])?;
        Ok(!output.stdout.trim().is_empty())
    }

    /// Stage `paths` and commit them with `message`.
    #[tracing::instrument(skip(self))]
    pub fn commit(&self, paths: &[&str], message: &str) -> Result<()> {
        let mut add = vec!["add", "--"];
        add.extend_from_slice(paths);
        self.git(&add)?;
        self.git(&["commit", "-m", message])?;
        debug!("Committed {:?} in {:?}", paths, self.dir);
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> Result<bool> {
        let output = self.git(&["tag", "--list", tag])?;
        Ok(output.stdout.lines().any(|line| line.trim() == tag))
    }

    pub fn create_tag(&self, tag: &str) -> Result<()> {
        self.git(&["tag", tag])?;
        debug!("Tagged {} in {:?}", tag, self.dir);
        Ok(())
    }

    /// Non-merge commits after `since`, newest first. `None` lists the whole history.
    pub fn commits_since(&self, since: Option<&str>) -> Result<Vec<Commit>> {
        let range = since.map(|tag| format!("{}..HEAD", tag));
        let mut args = vec!["log", "--no-merges", LOG_FORMAT];
        if let Some(range) = &range {
            args.push(range.as_str());
        }
        let output = self.git(&args)?;
        Ok(output.stdout.lines().filter_map(parse_commit).collect())
    }
}

fn parse_commit(line: &str) -> Option<Commit> {
    let mut fields = line.splitn(4, FIELD_SEPARATOR);
    let id = fields.next()?.trim();
    if id.is_empty() {
        return None;
    }
    Some(Commit {
        id: id.to_string(),
        message: fields.next()?.to_string(),
        author: fields.next()?.to_string(),
        date: fields.next()?.trim().to_string(),
    })
}
