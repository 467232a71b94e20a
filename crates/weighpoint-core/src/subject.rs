//! Subject — the physical item being measured and inventoried.
//!
//! The `subject_id` is the UID of the tag attached to the container; it is
//! the join key across the store, the job queue, and the update stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked inventory item.
///
/// Quantity fields are always grams. `density_g_per_ml` only affects how
/// the quantity is displayed; it never enters the measurement math. The
/// quantity is mutated exclusively through delta application
/// ([`crate::store::InventoryStore::apply_delta`]), never by direct field
/// overwrite from the measurement path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:       String,
  pub name:             String,
  pub current_net_g:    f64,
  /// Container mass subtracted from every gross reading.
  pub tare_g:           f64,
  pub density_g_per_ml: Option<f64>,
  /// Preferred display unit, `"g"` or `"ml"`.
  pub unit:             String,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input for the upsert operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
  pub subject_id:       String,
  pub name:             String,
  #[serde(default)]
  pub current_net_g:    f64,
  #[serde(default)]
  pub tare_g:           f64,
  pub density_g_per_ml: Option<f64>,
  #[serde(default = "default_unit")]
  pub unit:             String,
}

fn default_unit() -> String { "g".to_string() }

/// Read model handed to API clients: the stored record plus the derived
/// millilitre quantity when a usable density is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectView {
  #[serde(flatten)]
  pub subject:    Subject,
  pub current_ml: Option<f64>,
}

impl From<Subject> for SubjectView {
  fn from(subject: Subject) -> Self {
    let current_ml = subject
      .density_g_per_ml
      .filter(|d| *d > 0.0)
      .map(|d| subject.current_net_g / d);
    Self { subject, current_ml }
  }
}
