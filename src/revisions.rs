use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::{git::WorkingCopy, stats::Revision};

/// Where the revisions to benchmark come from.
#[derive(Debug)]
pub enum Source {
  /// Every revision on the ancestry path from `start` (exclusive) to the tip
  /// of `branch` (inclusive).
  Range { start: Revision, branch: String },
  /// A text file with one revision per line.
  File { path: PathBuf, fetch: bool },
}

/// Splits a revision list into its non-blank, trimmed lines, in file order.
pub fn parse_revision_list(text: &str) -> Vec<Revision> {
  text
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(str::to_string)
    .collect()
}

/// Resolves `source` into the revisions to benchmark, in benchmark order.
///
/// Range mode leaves `branch` checked out. File mode fetches first, unless
/// disabled, and rejects the whole list if any revision is unknown.
pub fn resolve(working_copy: &mut WorkingCopy, source: &Source) -> Result<Vec<Revision>> {
  match source {
    Source::Range { start, branch } => {
      if !working_copy.contains(start).context("rev-parse")? {
        anyhow::bail!("start revision {start:?} does not exist");
      }

      working_copy
        .checkout(branch)
        .with_context(|| format!("checkout {branch}"))?;

      let mut revs = working_copy.ancestry_path(start, "HEAD").context("rev-list")?;
      revs.reverse();

      Ok(revs)
    }
    Source::File { path, fetch } => {
      if *fetch {
        working_copy.fetch().context("fetch")?;
      }

      let text = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
      let revs = parse_revision_list(&text);

      let mut missing = Vec::new();
      for rev in &revs {
        if !working_copy.contains(rev).context("rev-parse")? {
          missing.push(rev.as_str());
        }
      }

      if !missing.is_empty() {
        anyhow::bail!("unknown revisions in {path:?}: {}", missing.join(", "));
      }

      Ok(revs)
    }
  }
}
