mod bench;
mod build;
mod ext;
mod format;
mod git;
mod revisions;
mod run;
mod stats;

use std::{
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tracing_subscriber::EnvFilter;

use self::{
  bench::{Bench, Native},
  build::{BuildDriver, Generator},
  git::WorkingCopy,
  revisions::Source,
  run::BenchRunner,
  stats::{Outcome, Revision},
};

/// Builds and benchmarks a sequence of revisions, reporting the average
/// throughput of each.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Benchmark every revision after `start` up to the tip of `branch`.
  Range {
    /// Revision to start after.
    #[arg(long)]
    start: String,
    /// Branch whose tip ends the range.
    #[arg(long)]
    branch: String,
    #[command(flatten)]
    args: Args,
  },
  /// Benchmark the revisions listed in a file, one per line.
  File {
    /// Revision list to benchmark, in order.
    #[arg(long)]
    revisions: PathBuf,
    /// Don't fetch from the remote before resolving revisions.
    #[arg(long)]
    skip_fetch: bool,
    #[command(flatten)]
    args: Args,
  },
}

#[derive(clap::Args, Debug)]
struct Args {
  /// Configured build directory.
  #[arg(long)]
  build_dir: PathBuf,
  /// Working copy to check revisions out in.
  #[arg(long)]
  source_dir: PathBuf,
  /// Benchmark runs per revision.
  #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
  runs: u32,
  /// Build target, also the package directory holding the executable.
  #[arg(long, default_value = "audio-engine")]
  target: String,
  /// Benchmark executable name. Defaults to the target.
  #[arg(long)]
  executable: Option<String>,
  /// Flag that puts the executable in benchmark mode.
  #[arg(long, default_value = "-e", allow_hyphen_values = true)]
  bench_flag: String,
  #[arg(long, value_enum, default_value_t = Generator::Ninja)]
  generator: Generator,
  /// Kill benchmark runs that take longer than this many seconds.
  #[arg(long)]
  run_timeout: Option<u64>,
}

fn main() -> Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();

  let results = run(Cli::parse().command)?;

  print!("{}", format::format(&results).context("format")?);

  Ok(())
}

fn run(command: Command) -> Result<IndexMap<Revision, Outcome>> {
  let (source, args) = match command {
    Command::Range { start, branch, args } => (Source::Range { start, branch }, args),
    Command::File {
      revisions,
      skip_fetch,
      args,
    } => (
      Source::File {
        path: existing(&revisions)?,
        fetch: !skip_fetch,
      },
      args,
    ),
  };

  let build_dir = existing(&args.build_dir)?;
  let source_dir = existing(&args.source_dir)?;

  let mut working_copy = WorkingCopy::open(source_dir).context("open working copy")?;
  let revisions = revisions::resolve(&mut working_copy, &source).context("resolve revisions")?;
  println!("found {} revisions to check", revisions.len());

  let builder = BuildDriver::new(&build_dir, args.generator, &args.target);
  let runner = BenchRunner::new(
    &build_dir,
    &args.target,
    args.executable.as_deref().unwrap_or(&args.target),
    args.bench_flag,
    args.run_timeout.map(Duration::from_secs),
  );

  let mut bench = Bench::new(
    Native::new(working_copy, builder, runner),
    args.runs as usize,
    args.target,
  );

  Ok(bench.bench(&revisions))
}

/// Absolute form of a path that must exist.
fn existing(path: &Path) -> Result<PathBuf> {
  if !path.exists() {
    anyhow::bail!("{path:?} does not exist!");
  }

  fs::canonicalize(path).with_context(|| format!("canonicalize {path:?}"))
}
