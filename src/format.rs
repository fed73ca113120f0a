use std::fmt::Write;

use anyhow::Result;
use indexmap::IndexMap;

use crate::stats::{Outcome, Revision};

/// Formats the result map on one line, in benchmark order, followed by one
/// line per sample set and per problem.
///
/// ```text
/// {A: 10.5, B: build failed}
/// A: 10.5 (10.0, 11.0)
/// B: ninja audio-engine exited with non-zero status 1
/// ```
pub fn format(results: &IndexMap<Revision, Outcome>) -> Result<String> {
  let mut out = String::new();

  let map = results
    .iter()
    .map(|(rev, outcome)| format!("{rev}: {outcome}"))
    .collect::<Vec<_>>()
    .join(", ");
  writeln!(out, "{{{map}}}")?;

  for (rev, outcome) in results {
    if let Outcome::Measured { mean, samples, .. } = outcome {
      let samples = samples.iter().map(|sample| format!("{sample:?}")).collect::<Vec<_>>().join(", ");
      writeln!(out, "{rev}: {mean:?} ({samples})")?;
    }

    for problem in outcome.problems() {
      writeln!(out, "{rev}: {problem}")?;
    }
  }

  Ok(out)
}
