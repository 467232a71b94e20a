//! [`SqliteStore`] — the SQLite implementation of [`InventoryStore`] and
//! [`MeasurementQueue`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use weighpoint_core::{
  Error, Result,
  job::{JobState, MeasurementJob},
  log::{ChangeSource, UsageLogEntry},
  store::{InventoryStore, MeasurementQueue},
  subject::{NewSubject, Subject},
};

use crate::{
  encode::{
    RawJob, RawLogEntry, RawSubject, encode_dt, encode_source, encode_state,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Error plumbing ──────────────────────────────────────────────────────────

/// Wrap a domain error so it can cross the `tokio_rusqlite` closure
/// boundary.
fn domain(err: Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

/// Recover domain errors smuggled through [`tokio_rusqlite::Error::Other`];
/// everything else is a storage failure.
fn translate(err: tokio_rusqlite::Error) -> Error {
  match err {
    tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
      Ok(domain) => *domain,
      Err(other) => Error::Storage(other),
    },
    other => Error::Storage(Box::new(other)),
  }
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

const SUBJECT_COLS: &str = "subject_id, name, current_net_g, tare_g, \
                            density_g_per_ml, unit, created_at, updated_at";

fn subject_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubject> {
  Ok(RawSubject {
    subject_id:       row.get(0)?,
    name:             row.get(1)?,
    current_net_g:    row.get(2)?,
    tare_g:           row.get(3)?,
    density_g_per_ml: row.get(4)?,
    unit:             row.get(5)?,
    created_at:       row.get(6)?,
    updated_at:       row.get(7)?,
  })
}

const JOB_COLS: &str = "job_id, subject_id, state, claimant, created_at, \
                        claimed_at, result_g, completed_at";

fn job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJob> {
  Ok(RawJob {
    job_id:       row.get(0)?,
    subject_id:   row.get(1)?,
    state:        row.get(2)?,
    claimant:     row.get(3)?,
    created_at:   row.get(4)?,
    claimed_at:   row.get(5)?,
    result_g:     row.get(6)?,
    completed_at: row.get(7)?,
  })
}

const LOG_COLS: &str = "entry_id, subject_id, prev_g, new_g, delta_g, \
                        delta_ml, source, note, recorded_at";

fn log_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLogEntry> {
  Ok(RawLogEntry {
    entry_id:    row.get(0)?,
    subject_id:  row.get(1)?,
    prev_g:      row.get(2)?,
    new_g:       row.get(3)?,
    delta_g:     row.get(4)?,
    delta_ml:    row.get(5)?,
    source:      row.get(6)?,
    note:        row.get(7)?,
    recorded_at: row.get(8)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Weighpoint store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// are serialised on the connection's dedicated thread, which is what
/// upholds the per-subject write serialisation and single-claim contracts.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(translate)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(translate)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(translate)
  }

  /// Shared delta-application path for [`apply_delta`] and [`consume`].
  ///
  /// `new_quantity` picks the target quantity from the previous one inside
  /// the transaction, so callers never act on a stale read.
  ///
  /// [`apply_delta`]: InventoryStore::apply_delta
  /// [`consume`]: InventoryStore::consume
  async fn apply_quantity_change(
    &self,
    subject_id: &str,
    new_quantity: impl FnOnce(f64) -> Result<f64> + Send + 'static,
    source: ChangeSource,
    note: Option<String>,
  ) -> Result<(Subject, UsageLogEntry)> {
    let subject_id = subject_id.to_owned();
    let entry_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());
    let source_str = encode_source(source).to_owned();

    let (raw_subject, raw_entry): (RawSubject, RawLogEntry) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let subject = tx
          .query_row(
            &format!("SELECT {SUBJECT_COLS} FROM subjects WHERE subject_id = ?1"),
            rusqlite::params![subject_id],
            subject_row,
          )
          .optional()?
          .ok_or_else(|| {
            domain(Error::SubjectNotFound(subject_id.clone()))
          })?;

        let prev_g = subject.current_net_g;
        let new_g = new_quantity(prev_g).map_err(domain)?;
        let delta_g = new_g - prev_g;
        let delta_ml = subject
          .density_g_per_ml
          .filter(|d| *d > 0.0)
          .map(|d| delta_g / d);

        tx.execute(
          "UPDATE subjects SET current_net_g = ?1, updated_at = ?2
           WHERE subject_id = ?3",
          rusqlite::params![new_g, now, subject_id],
        )?;

        tx.execute(
          "INSERT INTO usage_log (
             entry_id, subject_id, prev_g, new_g, delta_g, delta_ml,
             source, note, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            entry_id, subject_id, prev_g, new_g, delta_g, delta_ml,
            source_str, note, now,
          ],
        )?;

        tx.commit()?;

        let raw_entry = RawLogEntry {
          entry_id,
          subject_id: subject_id.clone(),
          prev_g,
          new_g,
          delta_g,
          delta_ml,
          source: source_str,
          note,
          recorded_at: now.clone(),
        };
        let raw_subject = RawSubject {
          current_net_g: new_g,
          updated_at: now,
          ..subject
        };
        Ok((raw_subject, raw_entry))
      })
      .await
      .map_err(translate)?;

    Ok((raw_subject.into_subject()?, raw_entry.into_entry()?))
  }
}

// ─── InventoryStore impl ─────────────────────────────────────────────────────

impl InventoryStore for SqliteStore {
  async fn upsert_subject(&self, input: NewSubject) -> Result<Subject> {
    let now = encode_dt(Utc::now());

    let raw: RawSubject = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (
             subject_id, name, current_net_g, tare_g, density_g_per_ml,
             unit, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
           ON CONFLICT(subject_id) DO UPDATE SET
             name             = excluded.name,
             current_net_g    = excluded.current_net_g,
             tare_g           = excluded.tare_g,
             density_g_per_ml = excluded.density_g_per_ml,
             unit             = excluded.unit,
             updated_at       = excluded.updated_at",
          rusqlite::params![
            input.subject_id,
            input.name,
            input.current_net_g,
            input.tare_g,
            input.density_g_per_ml,
            input.unit,
            now,
          ],
        )?;

        Ok(conn.query_row(
          &format!("SELECT {SUBJECT_COLS} FROM subjects WHERE subject_id = ?1"),
          rusqlite::params![input.subject_id],
          subject_row,
        )?)
      })
      .await
      .map_err(translate)?;

    raw.into_subject()
  }

  async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
    let subject_id = subject_id.to_owned();

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBJECT_COLS} FROM subjects WHERE subject_id = ?1"
              ),
              rusqlite::params![subject_id],
              subject_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(translate)?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLS} FROM subjects ORDER BY created_at ASC"
        ))?;
        let rows = stmt
          .query_map([], subject_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(translate)?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn apply_delta(
    &self,
    subject_id: &str,
    new_net_g: f64,
    source: ChangeSource,
    note: Option<String>,
  ) -> Result<(Subject, UsageLogEntry)> {
    self
      .apply_quantity_change(
        subject_id,
        move |_prev| {
          if new_net_g < 0.0 {
            return Err(Error::InvalidQuantity(new_net_g));
          }
          Ok(new_net_g)
        },
        source,
        note,
      )
      .await
  }

  async fn consume(
    &self,
    subject_id: &str,
    amount_g: f64,
    source: ChangeSource,
    note: Option<String>,
  ) -> Result<(Subject, UsageLogEntry)> {
    self
      .apply_quantity_change(
        subject_id,
        move |prev| {
          if amount_g < 0.0 {
            return Err(Error::InvalidQuantity(amount_g));
          }
          if amount_g > prev {
            return Err(Error::InsufficientQuantity {
              need: amount_g,
              have: prev,
            });
          }
          Ok(prev - amount_g)
        },
        source,
        note,
      )
      .await
  }

  async fn usage_log(
    &self,
    subject_id: &str,
    limit: usize,
  ) -> Result<Vec<UsageLogEntry>> {
    let subject_id = subject_id.to_owned();
    let limit = limit as i64;

    let raws: Vec<RawLogEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LOG_COLS} FROM usage_log
           WHERE subject_id = ?1
           ORDER BY recorded_at DESC, entry_id DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id, limit], log_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(translate)?;

    raws.into_iter().map(RawLogEntry::into_entry).collect()
  }
}

// ─── MeasurementQueue impl ───────────────────────────────────────────────────

impl MeasurementQueue for SqliteStore {
  async fn enqueue(&self, subject_id: &str) -> Result<MeasurementJob> {
    let subject_id = subject_id.to_owned();
    let job_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let raw: RawJob = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let known: bool = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![subject_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !known {
          return Err(domain(Error::SubjectNotFound(subject_id)));
        }

        // Coalesce onto an outstanding job rather than creating a second
        // measurement cycle for the same subject.
        let outstanding = tx
          .query_row(
            &format!(
              "SELECT {JOB_COLS} FROM measurement_jobs
               WHERE subject_id = ?1 AND state != 'done'"
            ),
            rusqlite::params![subject_id],
            job_row,
          )
          .optional()?;
        if let Some(job) = outstanding {
          tx.commit()?;
          return Ok(job);
        }

        tx.execute(
          "INSERT INTO measurement_jobs (job_id, subject_id, state, created_at)
           VALUES (?1, ?2, 'pending', ?3)",
          rusqlite::params![job_id, subject_id, now],
        )?;
        tx.commit()?;

        Ok(RawJob {
          job_id,
          subject_id,
          state: encode_state(JobState::Pending).to_owned(),
          claimant: None,
          created_at: now,
          claimed_at: None,
          result_g: None,
          completed_at: None,
        })
      })
      .await
      .map_err(translate)?;

    raw.into_job()
  }

  async fn claim_next(
    &self,
    claimant_id: &str,
  ) -> Result<Option<MeasurementJob>> {
    let claimant = claimant_id.to_owned();
    let now = encode_dt(Utc::now());

    let raw: Option<RawJob> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Oldest pending job first; the transaction makes select-then-update
        // atomic, so exactly one concurrent caller wins a given job.
        let candidate = tx
          .query_row(
            &format!(
              "SELECT {JOB_COLS} FROM measurement_jobs
               WHERE state = 'pending'
               ORDER BY created_at ASC, job_id ASC
               LIMIT 1"
            ),
            [],
            job_row,
          )
          .optional()?;

        let Some(mut job) = candidate else {
          return Ok(None);
        };

        tx.execute(
          "UPDATE measurement_jobs
           SET state = 'claimed', claimant = ?1, claimed_at = ?2
           WHERE job_id = ?3",
          rusqlite::params![claimant, now, job.job_id],
        )?;
        tx.commit()?;

        job.state = encode_state(JobState::Claimed).to_owned();
        job.claimant = Some(claimant);
        job.claimed_at = Some(now);
        Ok(Some(job))
      })
      .await
      .map_err(translate)?;

    raw.map(RawJob::into_job).transpose()
  }

  async fn complete(
    &self,
    job_id: Uuid,
    claimant_id: &str,
    result_g: f64,
  ) -> Result<MeasurementJob> {
    let id_str = encode_uuid(job_id);
    let claimant = claimant_id.to_owned();
    let now = encode_dt(Utc::now());

    let raw: RawJob = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut job = tx
          .query_row(
            &format!(
              "SELECT {JOB_COLS} FROM measurement_jobs WHERE job_id = ?1"
            ),
            rusqlite::params![id_str],
            job_row,
          )
          .optional()?
          .ok_or_else(|| domain(Error::UnknownJob(job_id)))?;

        match job.state.as_str() {
          // Repeat completion by the claimant that finished the job is an
          // idempotent success; anyone else gets a conflict.
          "done" => {
            if job.claimant.as_deref() == Some(claimant.as_str()) {
              tx.commit()?;
              return Ok(job);
            }
            return Err(domain(Error::AlreadyDone(job_id)));
          }
          // A pending job has no claim holder — this claimant's claim
          // either expired or never existed.
          "pending" => return Err(domain(Error::NotClaimHolder(job_id))),
          _ => {}
        }

        if job.claimant.as_deref() != Some(claimant.as_str()) {
          return Err(domain(Error::NotClaimHolder(job_id)));
        }

        tx.execute(
          "UPDATE measurement_jobs
           SET state = 'done', result_g = ?1, completed_at = ?2
           WHERE job_id = ?3",
          rusqlite::params![result_g, now, id_str],
        )?;
        tx.commit()?;

        job.state = encode_state(JobState::Done).to_owned();
        job.result_g = Some(result_g);
        job.completed_at = Some(now);
        Ok(job)
      })
      .await
      .map_err(translate)?;

    raw.into_job()
  }

  async fn reclaim_expired(&self, timeout: Duration) -> Result<usize> {
    let cutoff = Utc::now()
      - chrono::Duration::from_std(timeout)
        .map_err(|e| Error::Storage(Box::new(e)))?;
    let cutoff = encode_dt(cutoff);

    let reverted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE measurement_jobs
           SET state = 'pending', claimant = NULL, claimed_at = NULL
           WHERE state = 'claimed' AND claimed_at <= ?1",
          rusqlite::params![cutoff],
        )?)
      })
      .await
      .map_err(translate)?;

    Ok(reverted)
  }

  async fn job_status(
    &self,
    subject_id: &str,
  ) -> Result<Option<MeasurementJob>> {
    let subject_id = subject_id.to_owned();

    let raw: Option<RawJob> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {JOB_COLS} FROM measurement_jobs
                 WHERE subject_id = ?1
                 ORDER BY created_at DESC, job_id DESC
                 LIMIT 1"
              ),
              rusqlite::params![subject_id],
              job_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(translate)?;

    raw.map(RawJob::into_job).transpose()
  }
}
