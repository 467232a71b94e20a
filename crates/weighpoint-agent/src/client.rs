//! Async HTTP client wrapping the weighpoint JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use weighpoint_core::{job::MeasurementJob, subject::SubjectView};

/// Connection settings for the weighpoint API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Identifies this agent as the claim holder on every job it takes.
  pub agent_id: String,
}

#[derive(Debug, Deserialize)]
struct ClaimReply {
  job: Option<MeasurementJob>,
}

/// Server's answer to a measurement report.
#[derive(Debug, Deserialize)]
pub struct ReportReply {
  pub job:      MeasurementJob,
  pub subject:  Option<SubjectView>,
  pub recorded: bool,
}

/// Async HTTP client for the weighpoint JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn agent_id(&self) -> &str { &self.config.agent_id }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  /// `POST /api/queue/next?claimant=<agent-id>`
  pub async fn claim_next(&self) -> Result<Option<MeasurementJob>> {
    let resp = self
      .client
      .post(self.url("/queue/next"))
      .query(&[("claimant", self.config.agent_id.as_str())])
      .send()
      .await
      .context("POST /queue/next failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /queue/next → {}", resp.status()));
    }
    let reply: ClaimReply = resp.json().await.context("deserialising claim")?;
    Ok(reply.job)
  }

  /// `POST /api/queue/:job_id/report`
  pub async fn report(&self, job_id: Uuid, gross_g: f64) -> Result<ReportReply> {
    let resp = self
      .client
      .post(self.url(&format!("/queue/{job_id}/report")))
      .json(&json!({
        "claimant_id": self.config.agent_id,
        "gross_g": gross_g,
      }))
      .send()
      .await
      .context("POST report failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /queue/{job_id}/report → {}", resp.status()));
    }
    resp.json().await.context("deserialising report reply")
  }
}
