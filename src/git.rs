use std::{
  path::PathBuf,
  process::{Command, Stdio},
};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{ext::CommandExt, stats::Revision};

/// Handle to the on-disk source tree. Only one revision can be checked out at
/// a time, so every checkout goes through a `&mut WorkingCopy`.
pub struct WorkingCopy {
  dir: PathBuf,
}

impl WorkingCopy {
  /// Opens the working copy at `dir`, refusing bare repositories and trees
  /// with uncommitted changes to tracked files.
  pub fn open(dir: PathBuf) -> Result<Self> {
    let working_copy = Self { dir };

    if working_copy.is_bare().context("is bare")? {
      anyhow::bail!("{:?} is a bare repository", working_copy.dir);
    }

    if working_copy.is_dirty().context("is dirty")? {
      anyhow::bail!("{:?} has uncommitted changes", working_copy.dir);
    }

    Ok(working_copy)
  }

  pub fn is_bare(&self) -> Result<bool> {
    let stdout = self
      .git()
      .args(["rev-parse", "--is-bare-repository"])
      .status_stdout()?;

    Ok(stdout.trim() == "true")
  }

  /// Untracked files, such as an in-tree build directory, do not count.
  pub fn is_dirty(&self) -> Result<bool> {
    let stdout = self
      .git()
      .args(["status", "--porcelain", "--untracked-files=no"])
      .status_stdout()?;

    Ok(!stdout.trim().is_empty())
  }

  pub fn checkout(&mut self, rev: &str) -> Result<()> {
    self.git().args(["checkout", "--quiet", rev, "--"]).status_stdout()?;

    Ok(())
  }

  pub fn fetch(&self) -> Result<()> {
    self.git().args(["fetch", "--quiet"]).status_stdout()?;

    Ok(())
  }

  /// Whether `rev` names a commit known to the local repository.
  pub fn contains(&self, rev: &str) -> Result<bool> {
    let status = self
      .git()
      .args(["rev-parse", "--verify", "--quiet"])
      .arg(format!("{rev}^{{commit}}"))
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .status()
      .context("status")?;

    Ok(status.success())
  }

  /// Revisions on the ancestry path from `start` (exclusive) to `end`
  /// (inclusive), newest first.
  pub fn ancestry_path(&self, start: &str, end: &str) -> Result<Vec<Revision>> {
    let stdout = self
      .git()
      .args(["rev-list", "--ancestry-path"])
      .arg(format!("{start}..{end}"))
      .status_stdout()?;

    Ok(
      stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }

  fn git(&self) -> Command {
    debug!(dir = ?self.dir, "git");

    let mut git = Command::new("git");
    git.current_dir(&self.dir);

    git
  }
}
