use std::{
  path::{Path, PathBuf},
  process::{Command, Stdio},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{debug, warn};

/// Number of trailing output lines shown when a build fails.
const FAILURE_TAIL_LINES: usize = 20;

/// Build tool that drives the configured build directory.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Generator {
  Ninja,
  Make,
}

impl Generator {
  fn program(self) -> &'static str {
    match self {
      Generator::Ninja => "ninja",
      Generator::Make => "make",
    }
  }
}

/// Builds a single target in an already configured build directory, leaving
/// incrementality to the build tool.
pub struct BuildDriver {
  build_dir: PathBuf,
  program: String,
  target: String,
}

impl BuildDriver {
  pub fn new(build_dir: &Path, generator: Generator, target: &str) -> Self {
    Self {
      build_dir: build_dir.to_path_buf(),
      program: generator.program().to_string(),
      target: target.to_string(),
    }
  }

  /// Runs `<tool> <target>` in the build directory.
  ///
  /// # Errors
  ///
  /// This will return an error if the tool cannot be started or exits with a
  /// non-zero status. In the latter case the tail of its output is written to
  /// stderr.
  pub fn build(&self) -> Result<()> {
    debug!(dir = ?self.build_dir, program = %self.program, target = %self.target, "building");

    let output = Command::new(&self.program)
      .arg(&self.target)
      .current_dir(&self.build_dir)
      .stdin(Stdio::null())
      .output()
      .with_context(|| format!("{} {}", self.program, self.target))?;

    if !output.status.success() {
      // ninja reports compiler errors on stdout, make on stderr.
      let stdout = String::from_utf8_lossy(&output.stdout);
      let stderr = String::from_utf8_lossy(&output.stderr);
      let lines = stdout.lines().chain(stderr.lines()).collect::<Vec<_>>();
      let tail = &lines[lines.len().saturating_sub(FAILURE_TAIL_LINES)..];

      warn!(program = %self.program, target = %self.target, status = %output.status, "build failed");
      eprintln!("{}", tail.join("\n"));

      anyhow::bail!("{} {} exited with non-zero status {}", self.program, self.target, output.status);
    }

    Ok(())
  }
}
