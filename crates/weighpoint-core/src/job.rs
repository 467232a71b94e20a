//! Measurement jobs — one pending weigh request per subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a measurement job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
  Pending,
  Claimed,
  Done,
}

impl JobState {
  /// A job still waiting for a result, i.e. one that blocks further
  /// enqueues for its subject.
  pub fn is_outstanding(self) -> bool { !matches!(self, Self::Done) }
}

/// One measurement request.
///
/// At most one job per subject may be outstanding at a time; enqueuing a
/// subject with an outstanding job returns that job instead of creating a
/// second one. `pending → claimed` happens only through an atomic claim,
/// `claimed → done` only by the claim holder, and a claim that is never
/// completed reverts to `pending` on expiry rather than disappearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementJob {
  pub job_id:       Uuid,
  pub subject_id:   String,
  pub state:        JobState,
  pub claimant:     Option<String>,
  pub created_at:   DateTime<Utc>,
  pub claimed_at:   Option<DateTime<Utc>>,
  /// Gross reading reported by the agent, set on completion.
  pub result_g:     Option<f64>,
  pub completed_at: Option<DateTime<Utc>>,
}
