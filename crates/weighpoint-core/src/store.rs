//! The `InventoryStore` and `MeasurementQueue` traits.
//!
//! Both are implemented by storage backends (e.g.
//! `weighpoint-store-sqlite`). Higher layers depend on these abstractions,
//! not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::{
  Result,
  job::MeasurementJob,
  log::{ChangeSource, UsageLogEntry},
  subject::{NewSubject, Subject},
};

// ─── Inventory ───────────────────────────────────────────────────────────────

/// Durable subject records plus atomic delta application with an audit
/// trail.
///
/// The read of the previous quantity, the record write, and the log append
/// in [`apply_delta`](Self::apply_delta) form one transactional unit:
/// nothing may interleave between them for the same subject, and on failure
/// neither happens. Operations on distinct subjects are free to proceed
/// concurrently.
pub trait InventoryStore: Send + Sync {
  /// Create the record for `input.subject_id`, or replace its fields if it
  /// already exists (`created_at` is preserved on replace).
  fn upsert_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject>> + Send + '_;

  /// Retrieve a subject. Returns `None` if not found.
  fn get_subject<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>>> + Send + 'a;

  /// List all subjects, oldest first.
  fn list_subjects(&self)
  -> impl Future<Output = Result<Vec<Subject>>> + Send + '_;

  /// Atomically set the subject's quantity to `new_net_g` and append the
  /// matching usage-log entry.
  ///
  /// Fails with [`Error::SubjectNotFound`](crate::Error::SubjectNotFound)
  /// or, when `new_net_g` is negative,
  /// [`Error::InvalidQuantity`](crate::Error::InvalidQuantity); in both
  /// cases the prior state is left untouched.
  fn apply_delta<'a>(
    &'a self,
    subject_id: &'a str,
    new_net_g: f64,
    source: ChangeSource,
    note: Option<String>,
  ) -> impl Future<Output = Result<(Subject, UsageLogEntry)>> + Send + 'a;

  /// Atomically subtract `amount_g` from the subject's quantity.
  ///
  /// The manual counterpart of [`apply_delta`](Self::apply_delta): the
  /// subtraction happens inside the same transactional unit, so a
  /// concurrent measurement cannot slip between the read and the write.
  /// Fails with
  /// [`Error::InsufficientQuantity`](crate::Error::InsufficientQuantity)
  /// when `amount_g` exceeds the current quantity.
  fn consume<'a>(
    &'a self,
    subject_id: &'a str,
    amount_g: f64,
    source: ChangeSource,
    note: Option<String>,
  ) -> impl Future<Output = Result<(Subject, UsageLogEntry)>> + Send + 'a;

  /// Usage-log entries for a subject, newest first, at most `limit`.
  fn usage_log<'a>(
    &'a self,
    subject_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<UsageLogEntry>>> + Send + 'a;
}

// ─── Queue ───────────────────────────────────────────────────────────────────

/// Single-claim measurement job broker, keyed by subject.
pub trait MeasurementQueue: Send + Sync {
  /// Enqueue a measurement for `subject_id`.
  ///
  /// Idempotent while a job is outstanding: if a `pending` or `claimed`
  /// job already exists for the subject, that job is returned and no
  /// duplicate is created.
  fn enqueue<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<MeasurementJob>> + Send + 'a;

  /// Atomically claim the oldest pending job for `claimant_id`.
  ///
  /// Exactly one of any set of concurrent callers receives a given job;
  /// the rest see `None` and should poll again.
  fn claim_next<'a>(
    &'a self,
    claimant_id: &'a str,
  ) -> impl Future<Output = Result<Option<MeasurementJob>>> + Send + 'a;

  /// Finish a claimed job with the measured gross weight.
  ///
  /// Only the claim holder may complete. Completing an already-done job is
  /// a no-op success for the claimant that finished it and
  /// [`Error::AlreadyDone`](crate::Error::AlreadyDone) for anyone else.
  fn complete<'a>(
    &'a self,
    job_id: Uuid,
    claimant_id: &'a str,
    result_g: f64,
  ) -> impl Future<Output = Result<MeasurementJob>> + Send + 'a;

  /// Revert claimed jobs older than `timeout` to `pending`, clearing the
  /// claimant. Returns how many jobs were reverted.
  ///
  /// This is the recovery path for an agent that crashed or disconnected
  /// mid-claim; no job may stay `claimed` forever.
  fn reclaim_expired(
    &self,
    timeout: Duration,
  ) -> impl Future<Output = Result<usize>> + Send + '_;

  /// The most recent job for a subject, if any — lets a viewer poll for
  /// completion without holding a push channel open.
  fn job_status<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<MeasurementJob>>> + Send + 'a;
}
