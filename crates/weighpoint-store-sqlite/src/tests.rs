//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use uuid::Uuid;
use weighpoint_core::{
  Error,
  job::JobState,
  log::ChangeSource,
  store::{InventoryStore, MeasurementQueue},
  subject::NewSubject,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn subject(id: &str, quantity_g: f64) -> NewSubject {
  NewSubject {
    subject_id:       id.to_owned(),
    name:             format!("test subject {id}"),
    current_net_g:    quantity_g,
    tare_g:           0.0,
    density_g_per_ml: None,
    unit:             "g".to_owned(),
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_subject() {
  let s = store().await;

  let created = s.upsert_subject(subject("tag-1", 500.0)).await.unwrap();
  assert_eq!(created.subject_id, "tag-1");
  assert_eq!(created.current_net_g, 500.0);

  let fetched = s.get_subject("tag-1").await.unwrap().unwrap();
  assert_eq!(fetched.subject_id, created.subject_id);
  assert_eq!(fetched.name, created.name);
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject("no-such-tag").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_replaces_fields_but_keeps_created_at() {
  let s = store().await;

  let first = s.upsert_subject(subject("tag-1", 500.0)).await.unwrap();

  let mut replacement = subject("tag-1", 250.0);
  replacement.name = "renamed".to_owned();
  replacement.tare_g = 12.5;
  let second = s.upsert_subject(replacement).await.unwrap();

  assert_eq!(second.name, "renamed");
  assert_eq!(second.current_net_g, 250.0);
  assert_eq!(second.tare_g, 12.5);
  assert_eq!(second.created_at, first.created_at);

  let all = s.list_subjects().await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn list_subjects_oldest_first() {
  let s = store().await;
  s.upsert_subject(subject("tag-a", 1.0)).await.unwrap();
  s.upsert_subject(subject("tag-b", 2.0)).await.unwrap();
  s.upsert_subject(subject("tag-c", 3.0)).await.unwrap();

  let all = s.list_subjects().await.unwrap();
  let ids: Vec<_> = all.iter().map(|s| s.subject_id.as_str()).collect();
  assert_eq!(ids, ["tag-a", "tag-b", "tag-c"]);
}

// ─── Delta application ───────────────────────────────────────────────────────

#[tokio::test]
async fn apply_delta_updates_quantity_and_appends_log() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 500.0)).await.unwrap();

  let (updated, entry) = s
    .apply_delta("tag-1", 485.5, ChangeSource::Measurement, None)
    .await
    .unwrap();

  assert_eq!(updated.current_net_g, 485.5);
  assert_eq!(entry.prev_g, 500.0);
  assert_eq!(entry.new_g, 485.5);
  assert!((entry.delta_g - (-14.5)).abs() < 1e-9);
  assert_eq!(entry.source, ChangeSource::Measurement);

  let log = s.usage_log("tag-1", 10).await.unwrap();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].entry_id, entry.entry_id);
}

#[tokio::test]
async fn apply_delta_computes_volume_delta_from_density() {
  let s = store().await;
  let mut input = subject("tag-1", 100.0);
  input.density_g_per_ml = Some(0.8);
  s.upsert_subject(input).await.unwrap();

  let (_, entry) = s
    .apply_delta("tag-1", 60.0, ChangeSource::Measurement, None)
    .await
    .unwrap();

  assert!((entry.delta_ml.unwrap() - (-50.0)).abs() < 1e-9);
}

#[tokio::test]
async fn apply_delta_rejects_negative_quantity() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 500.0)).await.unwrap();

  let err = s
    .apply_delta("tag-1", -1.0, ChangeSource::Measurement, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidQuantity(_)));

  // Nothing was applied: no quantity change, no log entry.
  let subject = s.get_subject("tag-1").await.unwrap().unwrap();
  assert_eq!(subject.current_net_g, 500.0);
  assert!(s.usage_log("tag-1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn apply_delta_unknown_subject() {
  let s = store().await;
  let err = s
    .apply_delta("ghost", 1.0, ChangeSource::Measurement, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
}

#[tokio::test]
async fn concurrent_apply_delta_is_serialised() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 500.0)).await.unwrap();

  let (a, b) = tokio::join!(
    s.apply_delta("tag-1", 485.5, ChangeSource::Measurement, None),
    s.apply_delta("tag-1", 490.0, ChangeSource::Measurement, None),
  );
  a.unwrap();
  b.unwrap();

  // Both applied in some serial order: the later entry's previous quantity
  // is the earlier entry's new quantity, and the record holds the last new
  // quantity. A lost update would break the chain.
  let log = s.usage_log("tag-1", 10).await.unwrap();
  assert_eq!(log.len(), 2);
  let (older, newer) = if log[1].prev_g == 500.0 {
    (&log[1], &log[0])
  } else {
    (&log[0], &log[1])
  };
  assert_eq!(older.prev_g, 500.0);
  assert_eq!(newer.prev_g, older.new_g);

  let subject = s.get_subject("tag-1").await.unwrap().unwrap();
  assert_eq!(subject.current_net_g, newer.new_g);
}

#[tokio::test]
async fn consume_subtracts_and_logs() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 100.0)).await.unwrap();

  let (updated, entry) = s
    .consume("tag-1", 30.0, ChangeSource::ManualUse, Some("pipetted".into()))
    .await
    .unwrap();

  assert_eq!(updated.current_net_g, 70.0);
  assert!((entry.delta_g - (-30.0)).abs() < 1e-9);
  assert_eq!(entry.source, ChangeSource::ManualUse);
  assert_eq!(entry.note.as_deref(), Some("pipetted"));
}

#[tokio::test]
async fn consume_more_than_available_is_rejected() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 10.0)).await.unwrap();

  let err = s
    .consume("tag-1", 10.5, ChangeSource::ManualDiscard, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InsufficientQuantity { .. }));

  let subject = s.get_subject("tag-1").await.unwrap().unwrap();
  assert_eq!(subject.current_net_g, 10.0);
}

#[tokio::test]
async fn usage_log_newest_first_with_limit() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 100.0)).await.unwrap();

  for quantity in [90.0, 80.0, 70.0] {
    s.apply_delta("tag-1", quantity, ChangeSource::Measurement, None)
      .await
      .unwrap();
  }

  let log = s.usage_log("tag-1", 2).await.unwrap();
  assert_eq!(log.len(), 2);
  assert_eq!(log[0].new_g, 70.0);
  assert_eq!(log[1].new_g, 80.0);
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enqueue_creates_pending_job() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();

  let job = s.enqueue("tag-1").await.unwrap();
  assert_eq!(job.state, JobState::Pending);
  assert_eq!(job.subject_id, "tag-1");
  assert!(job.claimant.is_none());
}

#[tokio::test]
async fn enqueue_unknown_subject_is_rejected() {
  let s = store().await;
  let err = s.enqueue("ghost").await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
}

#[tokio::test]
async fn enqueue_coalesces_onto_outstanding_job() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();

  let first = s.enqueue("tag-1").await.unwrap();
  let second = s.enqueue("tag-1").await.unwrap();
  assert_eq!(first.job_id, second.job_id);

  // Still coalesces while claimed.
  s.claim_next("agent-1").await.unwrap().unwrap();
  let third = s.enqueue("tag-1").await.unwrap();
  assert_eq!(first.job_id, third.job_id);
}

#[tokio::test]
async fn enqueue_after_done_creates_a_new_job() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();

  let first = s.enqueue("tag-1").await.unwrap();
  s.claim_next("agent-1").await.unwrap().unwrap();
  s.complete(first.job_id, "agent-1", 42.0).await.unwrap();

  let second = s.enqueue("tag-1").await.unwrap();
  assert_ne!(first.job_id, second.job_id);
  assert_eq!(second.state, JobState::Pending);
}

#[tokio::test]
async fn claim_next_is_fifo() {
  let s = store().await;
  s.upsert_subject(subject("tag-a", 0.0)).await.unwrap();
  s.upsert_subject(subject("tag-b", 0.0)).await.unwrap();

  let first = s.enqueue("tag-a").await.unwrap();
  let second = s.enqueue("tag-b").await.unwrap();

  let claimed = s.claim_next("agent-1").await.unwrap().unwrap();
  assert_eq!(claimed.job_id, first.job_id);
  assert_eq!(claimed.state, JobState::Claimed);
  assert_eq!(claimed.claimant.as_deref(), Some("agent-1"));

  let claimed = s.claim_next("agent-1").await.unwrap().unwrap();
  assert_eq!(claimed.job_id, second.job_id);
}

#[tokio::test]
async fn claim_next_empty_queue_returns_none() {
  let s = store().await;
  assert!(s.claim_next("agent-1").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  s.enqueue("tag-1").await.unwrap();

  let (a, b) = tokio::join!(s.claim_next("agent-a"), s.claim_next("agent-b"));
  let (a, b) = (a.unwrap(), b.unwrap());

  assert!(a.is_some() != b.is_some(), "exactly one claimant must win");
}

#[tokio::test]
async fn complete_records_result() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  let job = s.enqueue("tag-1").await.unwrap();
  s.claim_next("agent-1").await.unwrap().unwrap();

  let done = s.complete(job.job_id, "agent-1", 42.0).await.unwrap();
  assert_eq!(done.state, JobState::Done);
  assert_eq!(done.result_g, Some(42.0));
  assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn complete_by_non_holder_is_rejected() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  let job = s.enqueue("tag-1").await.unwrap();
  s.claim_next("agent-1").await.unwrap().unwrap();

  let err = s.complete(job.job_id, "agent-2", 42.0).await.unwrap_err();
  assert!(matches!(err, Error::NotClaimHolder(_)));
}

#[tokio::test]
async fn complete_unclaimed_job_is_rejected() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  let job = s.enqueue("tag-1").await.unwrap();

  let err = s.complete(job.job_id, "agent-1", 42.0).await.unwrap_err();
  assert!(matches!(err, Error::NotClaimHolder(_)));
}

#[tokio::test]
async fn complete_unknown_job() {
  let s = store().await;
  let err = s.complete(Uuid::new_v4(), "agent-1", 42.0).await.unwrap_err();
  assert!(matches!(err, Error::UnknownJob(_)));
}

#[tokio::test]
async fn repeat_complete_is_idempotent_for_the_finisher_only() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  let job = s.enqueue("tag-1").await.unwrap();
  s.claim_next("agent-1").await.unwrap().unwrap();
  s.complete(job.job_id, "agent-1", 42.0).await.unwrap();

  // Duplicate report from the same agent: success, result untouched.
  let again = s.complete(job.job_id, "agent-1", 99.0).await.unwrap();
  assert_eq!(again.result_g, Some(42.0));

  // A different agent reporting against a finished job is a conflict.
  let err = s.complete(job.job_id, "agent-2", 42.0).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyDone(_)));
}

// ─── Claim expiry ────────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_claim_reverts_to_pending() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  let job = s.enqueue("tag-1").await.unwrap();
  s.claim_next("agent-1").await.unwrap().unwrap();

  let reverted = s.reclaim_expired(Duration::ZERO).await.unwrap();
  assert_eq!(reverted, 1);

  let status = s.job_status("tag-1").await.unwrap().unwrap();
  assert_eq!(status.state, JobState::Pending);
  assert!(status.claimant.is_none());

  // Another agent picks it up; the original claimant is locked out.
  let reclaimed = s.claim_next("agent-2").await.unwrap().unwrap();
  assert_eq!(reclaimed.job_id, job.job_id);

  let err = s.complete(job.job_id, "agent-1", 42.0).await.unwrap_err();
  assert!(matches!(err, Error::NotClaimHolder(_)));

  s.complete(job.job_id, "agent-2", 42.0).await.unwrap();
}

#[tokio::test]
async fn fresh_claims_are_not_reclaimed() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();
  s.enqueue("tag-1").await.unwrap();
  s.claim_next("agent-1").await.unwrap().unwrap();

  let reverted = s.reclaim_expired(Duration::from_secs(3600)).await.unwrap();
  assert_eq!(reverted, 0);

  let status = s.job_status("tag-1").await.unwrap().unwrap();
  assert_eq!(status.state, JobState::Claimed);
}

#[tokio::test]
async fn job_status_tracks_lifecycle() {
  let s = store().await;
  s.upsert_subject(subject("tag-1", 0.0)).await.unwrap();

  assert!(s.job_status("tag-1").await.unwrap().is_none());

  let job = s.enqueue("tag-1").await.unwrap();
  assert_eq!(
    s.job_status("tag-1").await.unwrap().unwrap().state,
    JobState::Pending
  );

  s.claim_next("agent-1").await.unwrap().unwrap();
  assert_eq!(
    s.job_status("tag-1").await.unwrap().unwrap().state,
    JobState::Claimed
  );

  s.complete(job.job_id, "agent-1", 42.0).await.unwrap();
  let status = s.job_status("tag-1").await.unwrap().unwrap();
  assert_eq!(status.state, JobState::Done);
  assert_eq!(status.result_g, Some(42.0));
}
