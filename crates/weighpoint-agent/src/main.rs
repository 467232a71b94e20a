//! weighpoint scale agent binary.
//!
//! Polls the server for measurement jobs, waits for the scale reading to
//! settle, and reports the gross weight back. Runs against a real device
//! file (`--device /dev/ttyUSB0`) or a built-in simulated scale
//! (`--simulate`).

mod client;
mod sample;
mod settle;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context as _, bail};
use clap::Parser;
use serde::Deserialize;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use weighpoint_core::stability::StabilityConfig;

use crate::{
  client::{ApiClient, ApiConfig},
  sample::{DeviceLineSource, SampleSource, SimulatedSource},
};

#[derive(Parser)]
#[command(author, version, about = "Weighpoint scale agent")]
struct Args {
  /// Path to an optional TOML configuration file.
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base URL of the weighpoint server.
  #[arg(long, env = "WEIGHPOINT_URL", default_value = "http://127.0.0.1:8000")]
  url: String,

  /// Claimant identity reported with every job.
  #[arg(long, env = "WEIGHPOINT_AGENT_ID", default_value = "scale-agent")]
  agent_id: String,

  /// Scale device file to read newline-delimited output from.
  #[arg(long, conflicts_with = "simulate")]
  device: Option<PathBuf>,

  /// Use a built-in simulated scale instead of a device.
  #[arg(long)]
  simulate: bool,

  /// Seconds to sleep between claim attempts when the queue is empty.
  #[arg(long, default_value_t = 2)]
  idle_poll_secs: u64,
}

/// Optional file-based overrides for the stability tuning.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
  tolerance_g:           Option<f64>,
  required_stable_secs:  Option<f64>,
  max_wait_secs:         Option<f64>,
  poll_interval_ms:      Option<u64>,
  zero_threshold_g:      Option<f64>,
  /// Readings the simulated scale cycles through.
  sim_values:            Option<Vec<f64>>,
}

impl ConfigFile {
  fn load(path: Option<&PathBuf>) -> anyhow::Result<Self> {
    let Some(path) = path else {
      return Ok(Self::default());
    };
    let text = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read config {path:?}"))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {path:?}"))
  }

  fn stability(&self) -> StabilityConfig {
    let mut cfg = StabilityConfig::default();
    if let Some(v) = self.tolerance_g {
      cfg.tolerance_g = v;
    }
    if let Some(v) = self.required_stable_secs {
      cfg.required_duration = Duration::from_secs_f64(v);
    }
    if let Some(v) = self.max_wait_secs {
      cfg.max_wait = Duration::from_secs_f64(v);
    }
    if let Some(v) = self.poll_interval_ms {
      cfg.poll_interval = Duration::from_millis(v);
    }
    if let Some(v) = self.zero_threshold_g {
      cfg.zero_threshold_g = v;
    }
    cfg
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let file_cfg = ConfigFile::load(args.config.as_ref())?;
  let stability = file_cfg.stability();

  let mut source: Box<dyn SampleSource> = match (&args.device, args.simulate) {
    (Some(path), _) => Box::new(DeviceLineSource::open(path)?),
    (None, true) => Box::new(SimulatedSource::new(
      file_cfg
        .sim_values
        .clone()
        .unwrap_or_else(|| vec![12.0, 12.001, 12.0, 12.0, 12.0]),
    )?),
    (None, false) => bail!("pass either --device <path> or --simulate"),
  };

  let client = ApiClient::new(ApiConfig {
    base_url: args.url.clone(),
    agent_id: args.agent_id.clone(),
  })?;
  let idle = Duration::from_secs(args.idle_poll_secs.max(1));

  info!(agent_id = %args.agent_id, url = %args.url, "agent started");
  loop {
    let job = match client.claim_next().await {
      Ok(Some(job)) => job,
      Ok(None) => {
        tokio::time::sleep(idle).await;
        continue;
      }
      Err(err) => {
        warn!(error = %err, "claim request failed");
        tokio::time::sleep(idle).await;
        continue;
      }
    };

    info!(job_id = %job.job_id, subject_id = %job.subject_id, "claimed job");
    let gross_g = match settle::settle(source.as_mut(), &stability).await {
      Ok(value) => value,
      Err(err) => {
        // Leave the claim to expire; the server reverts it to pending.
        error!(job_id = %job.job_id, error = %err, "settle failed");
        continue;
      }
    };

    match client.report(job.job_id, gross_g).await {
      Ok(reply) if reply.recorded => {
        info!(job_id = %job.job_id, gross_g, "reported measurement");
      }
      Ok(_) => {
        warn!(job_id = %job.job_id, gross_g, "measurement done but not recorded");
      }
      Err(err) => {
        error!(job_id = %job.job_id, error = %err, "report failed");
      }
    }
  }
}
