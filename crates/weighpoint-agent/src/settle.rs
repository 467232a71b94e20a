//! Drives a [`SampleSource`] through the stability detector until the
//! reading settles, the wait times out, or the sensor gives up.

use std::time::Instant;

use tracing::{debug, warn};
use weighpoint_core::stability::{
  StabilityConfig, StabilityDetector, StabilityError, Verdict,
};

use crate::sample::SampleSource;

/// Consecutive read failures tolerated before the sensor is declared
/// unavailable. A successful read resets the count.
const READ_ERROR_BUDGET: u32 = 5;

/// Poll `source` until it produces a stable gross weight in grams.
///
/// The `max_wait` clock starts before the first read, so a sensor that
/// only ever produces unparseable lines still times out rather than
/// spinning forever.
pub async fn settle(
  source: &mut dyn SampleSource,
  config: &StabilityConfig,
) -> Result<f64, StabilityError> {
  let started = Instant::now();
  let mut detector = StabilityDetector::new(config.clone());
  let mut consecutive_errors = 0u32;

  loop {
    if started.elapsed() >= config.max_wait {
      return Err(StabilityError::Timeout(config.max_wait));
    }

    match source.next_sample() {
      Ok(Some(sample_g)) => {
        consecutive_errors = 0;
        if let Verdict::Stable(value) = detector.observe(sample_g, Instant::now())
        {
          debug!(grams = value, "reading settled");
          return Ok(value);
        }
      }
      // A line with no weight in it; keep polling.
      Ok(None) => consecutive_errors = 0,
      Err(err) => {
        consecutive_errors += 1;
        warn!(error = %err, consecutive_errors, "sample read failed");
        if consecutive_errors >= READ_ERROR_BUDGET {
          return Err(StabilityError::SensorUnavailable(consecutive_errors));
        }
      }
    }

    tokio::time::sleep(config.poll_interval).await;
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use anyhow::bail;

  use super::*;
  use crate::sample::SimulatedSource;

  fn fast_config() -> StabilityConfig {
    StabilityConfig {
      tolerance_g:       0.1,
      required_duration: Duration::from_millis(30),
      max_wait:          Duration::from_millis(500),
      poll_interval:     Duration::from_millis(1),
      zero_threshold_g:  0.0,
    }
  }

  struct FailingSource;

  impl SampleSource for FailingSource {
    fn next_sample(&mut self) -> anyhow::Result<Option<f64>> {
      bail!("io error")
    }
  }

  #[tokio::test]
  async fn settles_on_a_steady_reading() {
    let mut source =
      SimulatedSource::new(vec![47.2, 47.21, 47.19, 47.2]).unwrap();
    let value = settle(&mut source, &fast_config()).await.unwrap();
    assert!((value - 47.2).abs() < 0.05);
  }

  #[tokio::test]
  async fn noisy_reading_times_out() {
    // Alternating far outside tolerance: the window restarts forever.
    let mut source = SimulatedSource::new(vec![10.0, 20.0]).unwrap();
    let err = settle(&mut source, &fast_config()).await.unwrap_err();
    assert!(matches!(err, StabilityError::Timeout(_)));
  }

  #[tokio::test]
  async fn persistent_read_failures_abort_early() {
    let err = settle(&mut FailingSource, &fast_config()).await.unwrap_err();
    assert_eq!(err, StabilityError::SensorUnavailable(READ_ERROR_BUDGET));
  }
}
