//! Live subject updates over Server-Sent Events.
//!
//! `GET /subjects/:id/updates` holds the connection open and emits an
//! `update` event with the refreshed [`SubjectView`] each time a
//! measurement or manual change lands for that subject. Delivery is
//! best-effort: a viewer that falls behind skips the missed events and
//! resumes at the newest, and the current state is always one
//! `GET /subjects/:id` away.
//!
//! [`SubjectView`]: weighpoint_core::subject::SubjectView

use axum::{
  extract::{Path, State},
  response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{
  Stream, StreamExt,
  wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use weighpoint_core::store::{InventoryStore, MeasurementQueue};

use crate::{AppState, error::ApiError};

/// `GET /subjects/:id/updates`
pub async fn stream<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError>
where
  S: InventoryStore + MeasurementQueue,
{
  // Reject streams for subjects that don't exist rather than holding open
  // a connection that can never fire.
  state
    .store
    .get_subject(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;

  let rx = state.hub.subscribe(&id).await;
  let stream = BroadcastStream::new(rx).filter_map(|item| match item {
    Ok(update) => Some(Event::default().event("update").json_data(&update)),
    // A lagged viewer just resumes at the newest update.
    Err(BroadcastStreamRecvError::Lagged(_)) => None,
  });

  Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
