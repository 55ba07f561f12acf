//! Async HTTP client wrapping the rivmon JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Response};
use rivmon_core::{
  query::{QueryRequest, QueryResult},
  reading::{IngestReceipt, NewReading},
  station::{Station, StationKind},
};
use serde::{Deserialize, de::DeserializeOwned};

/// Async HTTP client for the rivmon JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self {
      client,
      base_url: base_url.into(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  /// Decode a success body, or surface the server's `{"error": ..}` message.
  async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
      };
      return Err(anyhow!("{what} → {status}: {message}"));
    }
    resp.json().await.with_context(|| format!("deserialising {what}"))
  }

  // ── Stations ──────────────────────────────────────────────────────────────

  /// `GET /stations[?type=<kind>]`
  pub async fn list_stations(&self, kind: Option<StationKind>) -> Result<Vec<Station>> {
    let mut req = self.client.get(self.url("/stations"));
    if let Some(kind) = kind {
      req = req.query(&[("type", kind.to_string())]);
    }
    let resp = req.send().await.context("GET /stations failed")?;
    Self::decode(resp, "GET /stations").await
  }

  /// `GET /stations/{id}`
  pub async fn get_station(&self, id: &str) -> Result<Station> {
    let resp = self
      .client
      .get(self.url(&format!("/stations/{id}")))
      .send()
      .await
      .with_context(|| format!("GET /stations/{id} failed"))?;
    Self::decode(resp, "GET /stations/{id}").await
  }

  // ── Ingest ────────────────────────────────────────────────────────────────

  /// `POST /ingest`
  pub async fn ingest(&self, reading: &NewReading) -> Result<IngestReceipt> {
    let resp = self
      .client
      .post(self.url("/ingest"))
      .json(reading)
      .send()
      .await
      .context("POST /ingest failed")?;
    Self::decode(resp, "POST /ingest").await
  }

  // ── Query ─────────────────────────────────────────────────────────────────

  /// `GET /query?stationId=&metric=&granularity=&start=&end=`
  pub async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
    tracing::debug!(?request, "querying");
    let resp = self
      .client
      .get(self.url("/query"))
      .query(request)
      .send()
      .await
      .context("GET /query failed")?;
    Self::decode(resp, "GET /query").await
  }
}
