use std::{
  io::{self, Read},
  process::{Child, Command, ExitStatus, Output, Stdio},
  thread::{self, JoinHandle},
  time::Duration,
};

use anyhow::{Context, Result};
use tracing::debug;
use wait_timeout::ChildExt as WaitExt;

#[extend::ext]
pub impl Child {
  /// Waits for the child, killing it once `timeout` has elapsed. On timeout,
  /// returns `Ok(None)`.
  fn wait_or_kill(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
    let Some(status) = self.wait_timeout(timeout).context("wait")? else {
      self.kill().context("kill")?;
      self.wait().context("reap")?;

      return Ok(None);
    };

    Ok(Some(status))
  }
}

#[extend::ext]
pub impl Command {
  /// Runs the command, capturing stdout, returning an error that carries the
  /// captured stderr on non-zero exit.
  fn status_stdout(&mut self) -> Result<String> {
    debug!(command = ?self, "running");

    let output = self.stdin(Stdio::null()).output().context("output")?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      anyhow::bail!("exited with non-zero status {}: {}", output.status, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  /// Runs the command with stdin closed and both output streams captured. With
  /// a `timeout`, a command that outlives it is killed and `Ok(None)` is
  /// returned.
  fn output_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Output>> {
    debug!(command = ?self, ?timeout, "running");

    self.stdin(Stdio::null());

    let Some(timeout) = timeout else {
      return self.output().context("output").map(Some);
    };

    let mut child = self
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .context("spawn")?;
    let stdout = drain(child.stdout.take().context("stdout")?);
    let stderr = drain(child.stderr.take().context("stderr")?);

    // Readers of a killed command are left detached: its own children may
    // still hold the pipes open.
    let Some(status) = child.wait_or_kill(timeout)? else {
      return Ok(None);
    };

    Ok(Some(Output {
      status,
      stdout: join(stdout).context("read stdout")?,
      stderr: join(stderr).context("read stderr")?,
    }))
  }
}

/// Reads `pipe` to the end on its own thread, so the writer never blocks on a
/// full pipe buffer.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
  thread::spawn(move || {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;

    Ok(buf)
  })
}

fn join(reader: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
  let buf = reader
    .join()
    .map_err(|_| anyhow::anyhow!("reader thread panicked"))??;

  Ok(buf)
}
