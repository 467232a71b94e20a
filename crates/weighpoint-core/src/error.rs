//! Error types for `weighpoint-core`.
//!
//! The HTTP layer maps these onto status codes, so the whole taxonomy lives
//! here rather than behind per-backend associated types: not-found and
//! conflict variants must survive the trait boundary intact.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(String),

  #[error("unknown job: {0}")]
  UnknownJob(Uuid),

  /// The caller does not hold the claim on this job. Raised both for a job
  /// claimed by someone else and for a stale claimant whose claim expired
  /// and was handed to another agent.
  #[error("job {0} is held by a different claimant")]
  NotClaimHolder(Uuid),

  /// The job was already completed by a different claimant. Completion by
  /// the claimant that finished it is an idempotent success, not this.
  #[error("job {0} is already done")]
  AlreadyDone(Uuid),

  #[error("invalid quantity: {0} g")]
  InvalidQuantity(f64),

  #[error("insufficient quantity: {need} g requested, {have} g available")]
  InsufficientQuantity { need: f64, have: f64 },

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
