//! JSON REST API for Weighpoint.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`weighpoint_core::store::InventoryStore`] and
//! [`weighpoint_core::store::MeasurementQueue`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", weighpoint_api::api_router(store.clone()))
//! ```

pub mod coordinator;
pub mod error;
pub mod hub;
pub mod queue;
pub mod subjects;
pub mod updates;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use weighpoint_core::store::{InventoryStore, MeasurementQueue};

pub use self::{
  coordinator::Coordinator,
  error::ApiError,
  hub::NotificationHub,
};

// ─── Config ───────────────────────────────────────────────────────────────────

/// Server configuration, loaded by the binary from file and environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         String,
  /// Seconds a claimed job may sit without a report before it reverts to
  /// pending.
  pub claim_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".into(),
      port:               8000,
      store_path:         "weighpoint.db".into(),
      claim_timeout_secs: 120,
    }
  }
}

impl ServerConfig {
  pub fn claim_timeout(&self) -> Duration {
    Duration::from_secs(self.claim_timeout_secs)
  }
}

// ─── State ────────────────────────────────────────────────────────────────────

/// Shared handler state: the store, the notification hub, and the
/// coordinator that ties them together.
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub hub:         Arc<NotificationHub>,
  pub coordinator: Arc<Coordinator<S>>,
}

// Manual impl: `#[derive(Clone)]` would demand `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      hub:         Arc::clone(&self.hub),
      coordinator: Arc::clone(&self.coordinator),
    }
  }
}

impl<S> AppState<S>
where
  S: InventoryStore + MeasurementQueue,
{
  pub fn new(store: Arc<S>) -> Self {
    let hub = Arc::new(NotificationHub::new());
    let coordinator =
      Arc::new(Coordinator::new(Arc::clone(&store), Arc::clone(&hub)));
    Self { store, hub, coordinator }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: InventoryStore + MeasurementQueue + Send + Sync + 'static,
{
  let state = AppState::new(store);
  Router::new()
    // Subjects
    .route(
      "/subjects",
      get(subjects::list::<S>).post(subjects::upsert::<S>),
    )
    .route("/subjects/{id}", get(subjects::get_one::<S>))
    .route("/subjects/{id}/log", get(subjects::usage_log::<S>))
    .route("/subjects/{id}/use", post(subjects::use_amount::<S>))
    .route("/subjects/{id}/discard", post(subjects::discard_amount::<S>))
    .route("/subjects/{id}/updates", get(updates::stream::<S>))
    // Queue
    .route("/queue", post(queue::enqueue::<S>))
    .route("/queue/next", post(queue::claim_next::<S>))
    .route("/queue/{job_id}/report", post(queue::report::<S>))
    .route("/queue/status/{subject_id}", get(queue::status::<S>))
    // Health
    .route("/health", get(health))
    .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
  axum::Json(serde_json::json!({
    "status": "ok",
    "timestamp": chrono::Utc::now(),
  }))
}
