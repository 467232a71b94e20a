//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` offset) so that string comparison in SQL matches
//! chronological order. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;
use weighpoint_core::{
  Error, Result,
  job::{JobState, MeasurementJob},
  log::{ChangeSource, UsageLogEntry},
  subject::Subject,
};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| Error::Storage(Box::new(e)))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Storage(Box::new(e)))
}

// ─── JobState ────────────────────────────────────────────────────────────────

pub fn encode_state(state: JobState) -> &'static str {
  match state {
    JobState::Pending => "pending",
    JobState::Claimed => "claimed",
    JobState::Done => "done",
  }
}

pub fn decode_state(s: &str) -> Result<JobState> {
  match s {
    "pending" => Ok(JobState::Pending),
    "claimed" => Ok(JobState::Claimed),
    "done" => Ok(JobState::Done),
    other => Err(Error::Storage(format!("unknown job state: {other:?}").into())),
  }
}

// ─── ChangeSource ────────────────────────────────────────────────────────────

pub fn encode_source(source: ChangeSource) -> &'static str {
  match source {
    ChangeSource::Measurement => "measurement",
    ChangeSource::ManualUse => "manual-use",
    ChangeSource::ManualDiscard => "manual-discard",
  }
}

pub fn decode_source(s: &str) -> Result<ChangeSource> {
  match s {
    "measurement" => Ok(ChangeSource::Measurement),
    "manual-use" => Ok(ChangeSource::ManualUse),
    "manual-discard" => Ok(ChangeSource::ManualDiscard),
    other => Err(Error::Storage(
      format!("unknown change source: {other:?}").into(),
    )),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:       String,
  pub name:             String,
  pub current_net_g:    f64,
  pub tare_g:           f64,
  pub density_g_per_ml: Option<f64>,
  pub unit:             String,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:       self.subject_id,
      name:             self.name,
      current_net_g:    self.current_net_g,
      tare_g:           self.tare_g,
      density_g_per_ml: self.density_g_per_ml,
      unit:             self.unit,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `measurement_jobs` row.
pub struct RawJob {
  pub job_id:       String,
  pub subject_id:   String,
  pub state:        String,
  pub claimant:     Option<String>,
  pub created_at:   String,
  pub claimed_at:   Option<String>,
  pub result_g:     Option<f64>,
  pub completed_at: Option<String>,
}

impl RawJob {
  pub fn into_job(self) -> Result<MeasurementJob> {
    Ok(MeasurementJob {
      job_id:       decode_uuid(&self.job_id)?,
      subject_id:   self.subject_id,
      state:        decode_state(&self.state)?,
      claimant:     self.claimant,
      created_at:   decode_dt(&self.created_at)?,
      claimed_at:   self.claimed_at.as_deref().map(decode_dt).transpose()?,
      result_g:     self.result_g,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read directly from a `usage_log` row.
pub struct RawLogEntry {
  pub entry_id:    String,
  pub subject_id:  String,
  pub prev_g:      f64,
  pub new_g:       f64,
  pub delta_g:     f64,
  pub delta_ml:    Option<f64>,
  pub source:      String,
  pub note:        Option<String>,
  pub recorded_at: String,
}

impl RawLogEntry {
  pub fn into_entry(self) -> Result<UsageLogEntry> {
    Ok(UsageLogEntry {
      entry_id:    decode_uuid(&self.entry_id)?,
      subject_id:  self.subject_id,
      prev_g:      self.prev_g,
      new_g:       self.new_g,
      delta_g:     self.delta_g,
      delta_ml:    self.delta_ml,
      source:      decode_source(&self.source)?,
      note:        self.note,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
