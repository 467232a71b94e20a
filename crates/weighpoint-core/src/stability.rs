//! Signal stabilization: deciding when a stream of noisy scale readings
//! has settled on a value.
//!
//! The detector is a pure state machine. The caller supplies both the
//! samples and the clock, which keeps it independently testable with
//! synthetic timing and free of any queue, store, or IO dependency.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Tuning for a settle attempt.
#[derive(Debug, Clone)]
pub struct StabilityConfig {
  /// Maximum step between consecutive readings still counted as stable.
  pub tolerance_g:       f64,
  /// How long the reading must hold still before it is reported.
  pub required_duration: Duration,
  /// Overall deadline for one settle attempt.
  pub max_wait:          Duration,
  /// Delay between sensor polls.
  pub poll_interval:     Duration,
  /// Readings at or below this magnitude mean the pan is empty; they clear
  /// any accumulated window instead of being treated as a candidate value.
  pub zero_threshold_g:  f64,
}

impl Default for StabilityConfig {
  fn default() -> Self {
    Self {
      tolerance_g:       0.1,
      required_duration: Duration::from_secs(3),
      max_wait:          Duration::from_secs(60),
      poll_interval:     Duration::from_millis(100),
      zero_threshold_g:  0.0,
    }
  }
}

/// Why a settle attempt ended without a stable value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StabilityError {
  #[error("no stable reading within {0:?}")]
  Timeout(Duration),

  #[error("sensor unavailable after {0} consecutive read failures")]
  SensorUnavailable(u32),
}

/// Outcome of feeding one sample to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
  /// Still accumulating; keep sampling.
  Settling,
  /// The reading has held within tolerance for the required duration.
  Stable(f64),
}

#[derive(Debug, Clone, Copy)]
struct Window {
  started: Instant,
  /// Most recent in-band sample; the comparison point for the next one.
  value:   f64,
}

/// Streaming reducer that watches for the reading to hold still.
///
/// Each sample is compared against the previous accepted one: a step
/// larger than `tolerance_g` restarts the window at the new sample, so a
/// single outlier (a hand still on the container, a door slam) invalidates
/// everything accumulated so far rather than being averaged in.
#[derive(Debug)]
pub struct StabilityDetector {
  config: StabilityConfig,
  window: Option<Window>,
}

impl StabilityDetector {
  pub fn new(config: StabilityConfig) -> Self {
    Self { config, window: None }
  }

  pub fn config(&self) -> &StabilityConfig { &self.config }

  /// Feed one reading taken at `now`.
  pub fn observe(&mut self, sample_g: f64, now: Instant) -> Verdict {
    if sample_g.abs() <= self.config.zero_threshold_g {
      // Nothing on the pan yet.
      self.window = None;
      return Verdict::Settling;
    }

    match &mut self.window {
      Some(window)
        if (sample_g - window.value).abs() <= self.config.tolerance_g =>
      {
        window.value = sample_g;
        if now.duration_since(window.started) >= self.config.required_duration
        {
          return Verdict::Stable(sample_g);
        }
      }
      _ => {
        self.window = Some(Window { started: now, value: sample_g });
      }
    }

    Verdict::Settling
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
