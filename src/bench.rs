use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
  build::BuildDriver,
  git::WorkingCopy,
  run::{BenchRunner, MeasureError},
  stats::{Outcome, Revision},
};

/// The external steps applied to every revision.
pub trait Harness {
  fn checkout(&mut self, rev: &str) -> Result<()>;
  fn build(&mut self) -> Result<()>;
  fn measure(&mut self) -> Result<f64, MeasureError>;
}

/// Checks out with git, builds with the configured build tool, and runs the
/// freshly built executable.
pub struct Native {
  working_copy: WorkingCopy,
  builder: BuildDriver,
  runner: BenchRunner,
}

impl Native {
  pub fn new(working_copy: WorkingCopy, builder: BuildDriver, runner: BenchRunner) -> Self {
    Self {
      working_copy,
      builder,
      runner,
    }
  }
}

impl Harness for Native {
  fn checkout(&mut self, rev: &str) -> Result<()> {
    self.working_copy.checkout(rev).with_context(|| format!("checkout {rev}"))
  }

  fn build(&mut self) -> Result<()> {
    self.builder.build().context("build")
  }

  fn measure(&mut self) -> Result<f64, MeasureError> {
    self.runner.measure()
  }
}

pub struct Bench<H> {
  harness: H,
  /// Benchmark runs per revision.
  runs: usize,
  /// Build target, for progress messages.
  target: String,
}

impl<H: Harness> Bench<H> {
  pub fn new(harness: H, runs: usize, target: String) -> Self {
    Self { harness, runs, target }
  }

  /// Benchmarks `revisions` in order. A revision that fails to check out or to
  /// build is recorded as such and the remaining revisions still run.
  pub fn bench(&mut self, revisions: &[Revision]) -> IndexMap<Revision, Outcome> {
    let mut results = IndexMap::new();

    for rev in revisions {
      let outcome = self.bench_revision(rev);
      results.insert(rev.clone(), outcome);
    }

    results
  }

  fn bench_revision(&mut self, rev: &str) -> Outcome {
    println!("checking out {rev}");
    if let Err(err) = self.harness.checkout(rev) {
      warn!(rev, "{err:#}");
      return Outcome::CheckoutFailed(format!("{err:#}"));
    }

    println!("building {} @{rev}", self.target);
    if let Err(err) = self.harness.build() {
      warn!(rev, "{err:#}");
      return Outcome::BuildFailed(format!("{err:#}"));
    }

    let mut runs = Vec::with_capacity(self.runs);
    for run in 1..=self.runs {
      let result = self.harness.measure();
      match &result {
        Ok(sample) => println!("{sample:?}"),
        Err(err) => warn!(rev, run, "{err}"),
      }

      runs.push(result);
    }

    let outcome = Outcome::from_runs(runs);
    debug!(rev, mean = ?outcome.mean(), "benchmarked");

    outcome
  }
}
