//! The completion path: agent report → job done → inventory update →
//! viewer notification.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;
use weighpoint_core::{
  Error,
  job::MeasurementJob,
  log::ChangeSource,
  store::{InventoryStore, MeasurementQueue},
  subject::SubjectView,
};

use crate::hub::{NotificationHub, SubjectUpdate};

/// How many times a failed inventory write is retried before the report is
/// surfaced as done-but-unrecorded.
const APPLY_ATTEMPTS: u32 = 3;

/// Outcome of a measurement report.
#[derive(Debug)]
pub struct ReportOutcome {
  pub job:     MeasurementJob,
  /// `Some` when the inventory update went through, `None` when the job
  /// completed but the store write kept failing. The completed job is
  /// never rolled back for a store failure — re-weighing needs a human at
  /// the scale, while retrying a write does not.
  pub subject: Option<SubjectView>,
}

impl ReportOutcome {
  pub fn recorded(&self) -> bool { self.subject.is_some() }
}

/// Sequences job completion, delta application, and update publication.
pub struct Coordinator<S> {
  store: Arc<S>,
  hub:   Arc<NotificationHub>,
}

impl<S> Coordinator<S>
where
  S: InventoryStore + MeasurementQueue,
{
  pub fn new(store: Arc<S>, hub: Arc<NotificationHub>) -> Self {
    Self { store, hub }
  }

  /// Apply a finished measurement end to end.
  ///
  /// The gross reading is converted to net against the subject's tare
  /// before it is applied; the stored job keeps the gross value.
  pub async fn report_measurement(
    &self,
    job_id: Uuid,
    claimant_id: &str,
    gross_g: f64,
  ) -> Result<ReportOutcome, Error> {
    let job = self.store.complete(job_id, claimant_id, gross_g).await?;

    let subject = self
      .store
      .get_subject(&job.subject_id)
      .await?
      .ok_or_else(|| Error::SubjectNotFound(job.subject_id.clone()))?;

    let net_g = (gross_g - subject.tare_g).max(0.0);
    let note = format!("gross {gross_g:.3} g reported by {claimant_id}");

    let mut applied = None;
    for attempt in 1..=APPLY_ATTEMPTS {
      match self
        .store
        .apply_delta(
          &job.subject_id,
          net_g,
          ChangeSource::Measurement,
          Some(note.clone()),
        )
        .await
      {
        Ok(result) => {
          applied = Some(result);
          break;
        }
        // Rejections are final; only storage failures are worth retrying.
        Err(err @ (Error::SubjectNotFound(_) | Error::InvalidQuantity(_))) => {
          return Err(err);
        }
        Err(err) => {
          warn!(%job_id, attempt, error = %err, "inventory update failed");
        }
      }
    }

    let Some((subject, entry)) = applied else {
      // The measurement itself succeeded; surface the unrecorded write
      // distinctly so the caller can retry it without re-weighing.
      warn!(
        %job_id,
        subject_id = %job.subject_id,
        "measurement completed but not recorded"
      );
      return Ok(ReportOutcome { job, subject: None });
    };

    let view = SubjectView::from(subject);
    let delivered = self
      .hub
      .publish(&job.subject_id, SubjectUpdate {
        subject:   view.clone(),
        timestamp: Utc::now(),
      })
      .await;
    debug!(
      %job_id,
      subject_id = %job.subject_id,
      delta_g = entry.delta_g,
      delivered,
      "measurement applied"
    );

    Ok(ReportOutcome { job, subject: Some(view) })
  }
}
