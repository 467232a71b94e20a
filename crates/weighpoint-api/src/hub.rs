//! Per-subject fan-out of update events to connected viewers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use weighpoint_core::subject::SubjectView;

/// How many undelivered events one subscriber may buffer before its oldest
/// is dropped. Freshness beats completeness here: a viewer that misses an
/// intermediate event re-fetches current state anyway.
const SUBSCRIBER_BUFFER: usize = 16;

/// Payload pushed to viewers when a subject's quantity changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectUpdate {
  pub subject:   SubjectView,
  pub timestamp: DateTime<Utc>,
}

/// Best-effort update fan-out.
///
/// Subscriptions are in-memory only and vanish on restart; a viewer that
/// reconnects re-subscribes and re-fetches, so nothing here is a source of
/// truth. Publishing never blocks on a slow subscriber: each receiver has
/// its own bounded buffer and loses its oldest pending event on overflow.
#[derive(Debug, Default)]
pub struct NotificationHub {
  channels: Mutex<HashMap<String, broadcast::Sender<SubjectUpdate>>>,
}

impl NotificationHub {
  pub fn new() -> Self { Self::default() }

  /// Register a new viewer of `subject_id`.
  ///
  /// Dropping the receiver is the unsubscribe; the channel itself is
  /// pruned on the next publish once no receivers remain.
  pub async fn subscribe(
    &self,
    subject_id: &str,
  ) -> broadcast::Receiver<SubjectUpdate> {
    let mut channels = self.channels.lock().await;
    channels
      .entry(subject_id.to_owned())
      .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
      .subscribe()
  }

  /// Deliver `update` to every current viewer of `subject_id`; returns how
  /// many received it.
  pub async fn publish(&self, subject_id: &str, update: SubjectUpdate) -> usize {
    let mut channels = self.channels.lock().await;
    let Some(sender) = channels.get(subject_id) else {
      return 0;
    };
    match sender.send(update) {
      Ok(delivered) => delivered,
      Err(_) => {
        // The last viewer is gone.
        channels.remove(subject_id);
        0
      }
    }
  }

  /// Viewers currently registered for `subject_id`.
  pub async fn subscriber_count(&self, subject_id: &str) -> usize {
    self
      .channels
      .lock()
      .await
      .get(subject_id)
      .map_or(0, broadcast::Sender::receiver_count)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
