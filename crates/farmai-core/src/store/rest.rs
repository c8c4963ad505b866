// Hosted farm store reached over a PostgREST-style HTTP API.
//
// Rows are addressed with `column=eq.value` filters, ordered with
// `order=col.desc`, and writes ask for the affected rows back with
// `Prefer: return=representation`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use super::{FarmStore, StoreError, StoreResult};
use crate::config::Config;
use crate::farm::{Farm, FarmUpdate, NewFarm};
use crate::session::{ConsultingSession, NewSession, SessionStatus};

const FARMS: &str = "farms";
const SESSIONS: &str = "consulting_sessions";

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build from `credentials.rest_url` / `credentials.rest_api_key`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = config
            .credentials
            .rest_url
            .as_deref()
            .context("credentials.rest_url is required for the rest backend")?;
        let key = config
            .credentials
            .rest_api_key
            .as_deref()
            .context("credentials.rest_api_key is required for the rest backend")?;
        Self::new(url, key, Duration::from_secs(config.llm.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{table}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send and decode a JSON array of rows. Non-2xx responses become
    /// `StoreError::Http` carrying the response body.
    async fn rows<T: DeserializeOwned>(&self, builder: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = builder.send().await.context("request to farm store failed")?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("farm store returned {status}: {message}");
            return Err(StoreError::Http {
                status: status.as_u16(),
                message,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let rows = response
            .json::<Vec<T>>()
            .await
            .context("failed to decode farm store response")?;
        Ok(rows)
    }

    fn first<T>(rows: Vec<T>, not_found: impl FnOnce() -> StoreError) -> StoreResult<T> {
        rows.into_iter().next().ok_or_else(not_found)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl FarmStore for RestStore {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn list_farms(&self) -> StoreResult<Vec<Farm>> {
        self.rows(
            self.request(Method::GET, FARMS)
                .query(&[("select", "*"), ("order", "created_at.desc")]),
        )
        .await
    }

    async fn get_farm(&self, farm_id: &str) -> StoreResult<Option<Farm>> {
        let rows: Vec<Farm> = self
            .rows(
                self.request(Method::GET, FARMS)
                    .query(&[("select", "*".to_string()), ("farm_id", eq(farm_id))]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_farm(&self, input: NewFarm) -> StoreResult<Farm> {
        input.validate()?;
        let farm = input.into_farm(Utc::now());
        let rows = self
            .rows(
                self.request(Method::POST, FARMS)
                    .header("Prefer", "return=representation")
                    .json(&farm),
            )
            .await?;
        Self::first(rows, || StoreError::Other(anyhow::anyhow!("insert returned no row")))
    }

    async fn update_farm(&self, update: FarmUpdate) -> StoreResult<Farm> {
        update.validate()?;
        if update.is_empty() {
            return self
                .get_farm(&update.farm_id)
                .await?
                .ok_or_else(|| StoreError::farm_not_found(&update.farm_id));
        }

        let mut body = serde_json::to_value(&update).context("failed to encode farm update")?;
        if let Some(map) = body.as_object_mut() {
            map.insert("updated_at".into(), json!(now_text()));
        }
        let rows = self
            .rows(
                self.request(Method::PATCH, FARMS)
                    .query(&[("farm_id", eq(&update.farm_id))])
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        Self::first(rows, || StoreError::farm_not_found(&update.farm_id))
    }

    async fn delete_farm(&self, farm_id: &str) -> StoreResult<()> {
        let _: Vec<serde_json::Value> = self
            .rows(
                self.request(Method::DELETE, SESSIONS)
                    .query(&[("farm_id", eq(farm_id))]),
            )
            .await?;
        let rows: Vec<serde_json::Value> = self
            .rows(
                self.request(Method::DELETE, FARMS)
                    .query(&[("farm_id", eq(farm_id))])
                    .header("Prefer", "return=representation"),
            )
            .await?;
        Self::first(rows, || StoreError::farm_not_found(farm_id)).map(|_| ())
    }

    async fn list_sessions(&self, farm_id: &str) -> StoreResult<Vec<ConsultingSession>> {
        self.rows(self.request(Method::GET, SESSIONS).query(&[
            ("select", "*".to_string()),
            ("farm_id", eq(farm_id)),
            ("order", "visit_date.desc,created_at.desc".to_string()),
        ]))
        .await
    }

    async fn create_session(&self, input: NewSession) -> StoreResult<ConsultingSession> {
        input.validate()?;
        let session = input.into_session(Utc::now());
        let rows = self
            .rows(
                self.request(Method::POST, SESSIONS)
                    .header("Prefer", "return=representation")
                    .json(&session),
            )
            .await?;
        Self::first(rows, || StoreError::Other(anyhow::anyhow!("insert returned no row")))
    }

    async fn update_session_status(
        &self,
        consulting_id: &str,
        status: SessionStatus,
    ) -> StoreResult<ConsultingSession> {
        let rows = self
            .rows(
                self.request(Method::PATCH, SESSIONS)
                    .query(&[("consulting_id", eq(consulting_id))])
                    .header("Prefer", "return=representation")
                    .json(&json!({ "status": status, "updated_at": now_text() })),
            )
            .await?;
        Self::first(rows, || StoreError::session_not_found(consulting_id))
    }

    async fn delete_session(&self, consulting_id: &str) -> StoreResult<()> {
        let rows: Vec<serde_json::Value> = self
            .rows(
                self.request(Method::DELETE, SESSIONS)
                    .query(&[("consulting_id", eq(consulting_id))])
                    .header("Prefer", "return=representation"),
            )
            .await?;
        Self::first(rows, || StoreError::session_not_found(consulting_id)).map(|_| ())
    }
}
