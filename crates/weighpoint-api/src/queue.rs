//! Handlers for `/queue` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/queue` | Body: [`EnqueueBody`]; returns 202 + the (possibly pre-existing) job |
//! | `POST` | `/queue/next` | `?claimant` required; claims the oldest pending job |
//! | `POST` | `/queue/:job_id/report` | Body: [`ReportBody`]; completes the job and applies the result |
//! | `GET`  | `/queue/status/:subject_id` | Most recent job for a subject |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use weighpoint_core::{
  job::MeasurementJob,
  store::{InventoryStore, MeasurementQueue},
  subject::SubjectView,
};

use crate::{AppState, error::ApiError};

// ─── Enqueue ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
  pub subject_id: String,
}

/// `POST /queue` — body: `{"subject_id":"..."}`
pub async fn enqueue<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<EnqueueBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let job = state.store.enqueue(&body.subject_id).await?;
  Ok((StatusCode::ACCEPTED, Json(job)))
}

// ─── Claim ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClaimParams {
  pub claimant: String,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
  /// `None` when the queue has no pending jobs; poll again later.
  pub job: Option<MeasurementJob>,
}

/// `POST /queue/next?claimant=<agent-id>`
pub async fn claim_next<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ClaimParams>,
) -> Result<Json<ClaimResponse>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let job = state.store.claim_next(&params.claimant).await?;
  Ok(Json(ClaimResponse { job }))
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportBody {
  pub claimant_id: String,
  pub gross_g:     f64,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
  pub job:      MeasurementJob,
  /// The refreshed subject, absent when the inventory write failed.
  pub subject:  Option<SubjectView>,
  /// `false` means the job completed but the new quantity was not stored.
  pub recorded: bool,
}

/// `POST /queue/:job_id/report` — body: [`ReportBody`]
pub async fn report<S>(
  State(state): State<AppState<S>>,
  Path(job_id): Path<Uuid>,
  Json(body): Json<ReportBody>,
) -> Result<Json<ReportResponse>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let outcome = state
    .coordinator
    .report_measurement(job_id, &body.claimant_id, body.gross_g)
    .await?;
  let recorded = outcome.recorded();
  Ok(Json(ReportResponse {
    job: outcome.job,
    subject: outcome.subject,
    recorded,
  }))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub job: Option<MeasurementJob>,
}

/// `GET /queue/status/:subject_id`
pub async fn status<S>(
  State(state): State<AppState<S>>,
  Path(subject_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let job = state.store.job_status(&subject_id).await?;
  Ok(Json(StatusResponse { job }))
}
