use std::fmt;

use crate::run::MeasureError;

/// A point in version-control history, as named by the user or by `git`.
pub type Revision = String;

/// A benchmark run that produced no sample.
#[derive(Debug)]
pub struct RunFailure {
  /// 1-based run number within its revision.
  pub run: usize,
  pub error: MeasureError,
}

/// Result of benchmarking a single revision.
#[derive(Debug)]
pub enum Outcome {
  /// At least one run produced a sample. `mean` is taken over `samples` only.
  Measured {
    mean: f64,
    samples: Vec<f64>,
    failures: Vec<RunFailure>,
  },
  CheckoutFailed(String),
  BuildFailed(String),
  /// Every run failed.
  NoSamples(Vec<RunFailure>),
}

impl Outcome {
  /// Collects the results of consecutive runs.
  pub fn from_runs<I: IntoIterator<Item = Result<f64, MeasureError>>>(runs: I) -> Self {
    let mut samples = Vec::new();
    let mut failures = Vec::new();

    for (i, run) in runs.into_iter().enumerate() {
      match run {
        Ok(sample) => samples.push(sample),
        Err(error) => failures.push(RunFailure { run: i + 1, error }),
      }
    }

    match mean(&samples) {
      Some(mean) => Outcome::Measured {
        mean,
        samples,
        failures,
      },
      None => Outcome::NoSamples(failures),
    }
  }

  pub fn mean(&self) -> Option<f64> {
    match self {
      Outcome::Measured { mean, .. } => Some(*mean),
      _ => None,
    }
  }

  /// Human-readable reasons behind a missing or partial result.
  pub fn problems(&self) -> Vec<String> {
    match self {
      Outcome::Measured { failures, .. } | Outcome::NoSamples(failures) => {
        failures.iter().map(RunFailure::to_string).collect()
      }
      Outcome::CheckoutFailed(reason) | Outcome::BuildFailed(reason) => vec![reason.clone()],
    }
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      // Debug keeps the decimal point on whole numbers.
      Outcome::Measured { mean, .. } => write!(f, "{mean:?}"),
      Outcome::CheckoutFailed(_) => write!(f, "checkout failed"),
      Outcome::BuildFailed(_) => write!(f, "build failed"),
      Outcome::NoSamples(_) => write!(f, "no samples"),
    }
  }
}

impl fmt::Display for RunFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "run {}: {}", self.run, self.error)
  }
}

/// Arithmetic mean, or `None` for no samples.
pub fn mean(samples: &[f64]) -> Option<f64> {
  if samples.is_empty() {
    return None;
  }

  Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

#[cfg(test)]
mod tests {
  use super::{mean, Outcome};
  use crate::run::MeasureError;

  #[test]
  fn mean_of_samples() {
    assert_eq!(mean(&[10.0, 12.0, 11.0]), Some(11.0));
    assert_eq!(mean(&[4.5]), Some(4.5));
    assert_eq!(mean(&[]), None);
  }

  #[test]
  fn all_runs_succeed() {
    let outcome = Outcome::from_runs([Ok(10.0), Ok(11.0)]);

    let Outcome::Measured {
      mean,
      samples,
      failures,
    } = &outcome
    else {
      panic!("expected a measurement, got {outcome:?}");
    };
    assert_eq!(*mean, 10.5);
    assert_eq!(samples, &[10.0, 11.0]);
    assert!(failures.is_empty());
  }

  #[test]
  fn failed_runs_are_left_out_of_the_mean() {
    let outcome = Outcome::from_runs([Ok(10.0), Err(MeasureError::MarkerNotFound), Ok(12.0)]);

    assert_eq!(outcome.mean(), Some(11.0));
    assert_eq!(outcome.problems().len(), 1);
    assert!(outcome.problems()[0].starts_with("run 2: "), "{:?}", outcome.problems());
  }

  #[test]
  fn no_successful_run() {
    let outcome = Outcome::from_runs([
      Err(MeasureError::MarkerNotFound),
      Err(MeasureError::InvalidNumber("fast".to_string())),
    ]);

    assert!(matches!(&outcome, Outcome::NoSamples(failures) if failures.len() == 2));
    assert_eq!(outcome.mean(), None);
    assert_eq!(outcome.to_string(), "no samples");
  }

  #[test]
  fn whole_mean_keeps_its_decimal_point() {
    assert_eq!(Outcome::from_runs([Ok(10.0), Ok(12.0)]).to_string(), "11.0");
    assert_eq!(Outcome::from_runs([Ok(10.0), Ok(11.0)]).to_string(), "10.5");
  }
}
