//! Usage log — the append-only audit trail of quantity changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What caused a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeSource {
  /// A settled scale reading reported by an agent.
  Measurement,
  ManualUse,
  ManualDiscard,
}

/// One recorded quantity change. Entries are never updated or deleted;
/// exactly one is written per successful delta application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
  pub entry_id:    Uuid,
  pub subject_id:  String,
  pub prev_g:      f64,
  pub new_g:       f64,
  pub delta_g:     f64,
  /// Derived volume change, present when the subject has a density.
  pub delta_ml:    Option<f64>,
  pub source:      ChangeSource,
  pub note:        Option<String>,
  pub recorded_at: DateTime<Utc>,
}
