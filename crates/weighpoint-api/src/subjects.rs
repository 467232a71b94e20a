//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | All subjects, oldest first |
//! | `POST` | `/subjects` | Body: [`NewSubject`]; upsert, returns 201 + view |
//! | `GET`  | `/subjects/:id` | Single subject view |
//! | `GET`  | `/subjects/:id/log` | Usage log, newest first; `?limit` (default 50) |
//! | `POST` | `/subjects/:id/use` | Body: [`AmountBody`]; subtract a used amount |
//! | `POST` | `/subjects/:id/discard` | Body: [`AmountBody`]; subtract a discarded amount |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use weighpoint_core::{
  log::{ChangeSource, UsageLogEntry},
  store::{InventoryStore, MeasurementQueue},
  subject::{NewSubject, SubjectView},
};

use crate::{
  AppState,
  error::ApiError,
  hub::SubjectUpdate,
};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<SubjectView>>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let subjects = state.store.list_subjects().await?;
  Ok(Json(subjects.into_iter().map(SubjectView::from).collect()))
}

// ─── Upsert ───────────────────────────────────────────────────────────────────

/// `POST /subjects` — body: [`NewSubject`]
pub async fn upsert<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let subject = state.store.upsert_subject(body).await?;
  Ok((StatusCode::CREATED, Json(SubjectView::from(subject))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<SubjectView>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let subject = state
    .store
    .get_subject(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(SubjectView::from(subject)))
}

// ─── Usage log ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LogParams {
  /// Maximum number of entries to return, newest first.
  #[serde(default = "default_limit")]
  pub limit: usize,
}

fn default_limit() -> usize { 50 }

/// `GET /subjects/:id/log[?limit=N]`
pub async fn usage_log<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  Query(params): Query<LogParams>,
) -> Result<Json<Vec<UsageLogEntry>>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let entries = state.store.usage_log(&id, params.limit).await?;
  Ok(Json(entries))
}

// ─── Manual consumption ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AmountBody {
  pub amount_g: f64,
  #[serde(default)]
  pub note:     Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
  pub subject: SubjectView,
  pub entry:   UsageLogEntry,
}

/// `POST /subjects/:id/use` — body: [`AmountBody`]
pub async fn use_amount<S>(
  state: State<AppState<S>>,
  id: Path<String>,
  body: Json<AmountBody>,
) -> Result<Json<ConsumeResponse>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  consume(state, id, body, ChangeSource::ManualUse).await
}

/// `POST /subjects/:id/discard` — body: [`AmountBody`]
pub async fn discard_amount<S>(
  state: State<AppState<S>>,
  id: Path<String>,
  body: Json<AmountBody>,
) -> Result<Json<ConsumeResponse>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  consume(state, id, body, ChangeSource::ManualDiscard).await
}

async fn consume<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  Json(body): Json<AmountBody>,
  source: ChangeSource,
) -> Result<Json<ConsumeResponse>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  let (subject, entry) = state
    .store
    .consume(&id, body.amount_g, source, body.note)
    .await?;
  let view = SubjectView::from(subject);
  state
    .hub
    .publish(&id, SubjectUpdate {
      subject:   view.clone(),
      timestamp: Utc::now(),
    })
    .await;
  Ok(Json(ConsumeResponse { subject: view, entry }))
}
