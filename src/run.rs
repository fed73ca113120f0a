use std::{
  path::{Path, PathBuf},
  process::{Command, ExitStatus},
  time::Duration,
};

use tracing::warn;

use crate::ext::CommandExt;

const PERF_MARKER: &str = "Audio engine performs at ";
const REALTIME_SUFFIX: &str = " x realtime";

/// Why a benchmark run produced no sample.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
  #[error("no line containing {:?} found", PERF_MARKER)]
  MarkerNotFound,
  #[error("throughput {0:?} is not a number")]
  InvalidNumber(String),
  #[error("exited with non-zero status {0}")]
  ExitStatus(ExitStatus),
  #[error("killed after {0:?}")]
  Timeout(Duration),
  #[error("failed to run {executable:?}: {source:#}")]
  Launch {
    executable: PathBuf,
    #[source]
    source: anyhow::Error,
  },
}

/// Returns the throughput reported on the first line of `stdout` that carries
/// the performance marker, unparsed.
pub fn parse_stdout(stdout: &str) -> Result<String, MeasureError> {
  let line = stdout
    .lines()
    .find(|line| line.contains(PERF_MARKER))
    .ok_or(MeasureError::MarkerNotFound)?;

  let (_, rest) = line.split_once(PERF_MARKER).ok_or(MeasureError::MarkerNotFound)?;
  let value = match rest.rfind(REALTIME_SUFFIX) {
    Some(end) => &rest[..end],
    None => rest,
  };

  Ok(value.trim().to_string())
}

/// Runs the built benchmark executable and reads its throughput.
pub struct BenchRunner {
  executable: PathBuf,
  flag: String,
  timeout: Option<Duration>,
}

impl BenchRunner {
  /// The executable lives at `<build_dir>/package/<target>/<executable>`.
  pub fn new(build_dir: &Path, target: &str, executable: &str, flag: String, timeout: Option<Duration>) -> Self {
    Self {
      executable: build_dir.join("package").join(target).join(executable),
      flag,
      timeout,
    }
  }

  /// Executes one benchmark run and returns its throughput.
  ///
  /// # Errors
  ///
  /// This will return an error if:
  /// - the executable cannot be started,
  /// - it outlives the configured timeout,
  /// - the exit status is non-zero (its stderr is forwarded to ours),
  /// - the performance line is missing or its value is not a number.
  pub fn measure(&self) -> Result<f64, MeasureError> {
    let stdout = self.run_once()?;
    let value = parse_stdout(&stdout)?;

    value.parse().map_err(|_| MeasureError::InvalidNumber(value))
  }

  fn run_once(&self) -> Result<String, MeasureError> {
    let dir = self.executable.parent().unwrap_or(Path::new("."));

    let output = Command::new(&self.executable)
      .arg(&self.flag)
      .current_dir(dir)
      .output_timeout(self.timeout)
      .map_err(|source| MeasureError::Launch {
        executable: self.executable.clone(),
        source,
      })?;

    let Some(output) = output else {
      // `output_timeout` only gives up when a timeout is set.
      return Err(MeasureError::Timeout(self.timeout.unwrap_or_default()));
    };

    if !output.status.success() {
      warn!(executable = ?self.executable, status = %output.status, "benchmark failed");
      eprintln!("{}", String::from_utf8_lossy(&output.stderr));

      return Err(MeasureError::ExitStatus(output.status));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

#[cfg(test)]
mod tests {
  use std::{fs, path::Path, time::Duration};

  use tempfile::TempDir;

  use super::{parse_stdout, BenchRunner, MeasureError};

  #[test]
  fn extracts_value_between_markers() {
    let stdout = "loading\nAudio engine performs at 12.5 x realtime\n";

    assert_eq!(parse_stdout(stdout).unwrap(), "12.5");
  }

  #[test]
  fn first_matching_line_wins() {
    let stdout = "Audio engine performs at 3 x realtime\nAudio engine performs at 4 x realtime\n";

    assert_eq!(parse_stdout(stdout).unwrap(), "3");
  }

  #[test]
  fn marker_may_be_prefixed() {
    let stdout = "[bench] Audio engine performs at 812.25 x realtime (48000 Hz)";

    assert_eq!(parse_stdout(stdout).unwrap(), "812.25");
  }

  #[test]
  fn missing_marker() {
    let stdout = "Audio engine initialised\nshutting down\n";

    assert!(matches!(parse_stdout(stdout), Err(MeasureError::MarkerNotFound)));
    assert!(matches!(parse_stdout(""), Err(MeasureError::MarkerNotFound)));
  }

  /// Lays out `<build>/package/audio-engine/audio-engine` as a link to `sh`,
  /// so the benchmark flag names a script for it to interpret.
  #[cfg(unix)]
  fn fake_build(script: &str) -> (TempDir, BenchRunner) {
    let build = TempDir::with_prefix("perf-bisect-build-").unwrap();
    let package = build.path().join("package/audio-engine");
    fs::create_dir_all(&package).unwrap();
    std::os::unix::fs::symlink(Path::new("/bin/sh"), package.join("audio-engine")).unwrap();
    fs::write(package.join("bench.sh"), script).unwrap();

    let runner = BenchRunner::new(build.path(), "audio-engine", "audio-engine", "bench.sh".to_string(), None);

    (build, runner)
  }

  #[cfg(unix)]
  #[test]
  fn measures_reported_throughput() {
    let (_build, runner) = fake_build("echo 'Audio engine performs at 42.75 x realtime'\n");

    assert_eq!(runner.measure().unwrap(), 42.75);
  }

  #[cfg(unix)]
  #[test]
  fn runs_in_executable_directory() {
    let (build, runner) = fake_build("echo \"Audio engine performs at $(cat speed) x realtime\"\n");
    fs::write(build.path().join("package/audio-engine/speed"), "7").unwrap();

    assert_eq!(runner.measure().unwrap(), 7.0);
  }

  #[cfg(unix)]
  #[test]
  fn non_numeric_value() {
    let (_build, runner) = fake_build("echo 'Audio engine performs at fast x realtime'\n");

    assert!(matches!(runner.measure(), Err(MeasureError::InvalidNumber(value)) if value == "fast"));
  }

  #[cfg(unix)]
  #[test]
  fn non_zero_exit_fails_the_run() {
    let (_build, runner) =
      fake_build("echo 'Audio engine performs at 1.0 x realtime'\necho 'device lost' >&2\nexit 3\n");

    assert!(matches!(runner.measure(), Err(MeasureError::ExitStatus(status)) if status.code() == Some(3)));
  }

  #[cfg(unix)]
  #[test]
  fn fast_run_within_timeout() {
    let (_build, mut runner) = fake_build("echo 'Audio engine performs at 9.5 x realtime'\n");
    runner.timeout = Some(Duration::from_secs(30));

    assert_eq!(runner.measure().unwrap(), 9.5);
  }

  #[cfg(unix)]
  #[test]
  fn slow_run_times_out() {
    let (_build, mut runner) = fake_build("sleep 5\n");
    runner.timeout = Some(Duration::from_millis(100));

    assert!(matches!(runner.measure(), Err(MeasureError::Timeout(_))));
  }

  #[test]
  fn missing_executable() {
    let build = TempDir::with_prefix("perf-bisect-build-").unwrap();
    let runner = BenchRunner::new(build.path(), "audio-engine", "audio-engine", "-e".to_string(), None);

    let err = runner.measure().unwrap_err();

    assert!(matches!(err, MeasureError::Launch { .. }), "{err}");
    assert!(std::error::Error::source(&err).is_some());
  }

  #[cfg(unix)]
  #[test]
  fn verbose_run_within_timeout() {
    // Well past a pipe buffer of output before the performance line.
    let (_build, mut runner) = fake_build(
      "i=0\n\
       while [ $i -lt 3000 ]; do\n\
       echo \"voice $i rendered, buffer underruns: 0, cpu load nominal......\"\n\
       echo \"voice $i\" >&2\n\
       i=$((i + 1))\n\
       done\n\
       echo 'Audio engine performs at 5 x realtime'\n",
    );
    runner.timeout = Some(Duration::from_secs(30));

    assert_eq!(runner.measure().unwrap(), 5.0);
  }
}
