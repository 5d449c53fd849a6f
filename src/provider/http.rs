//! HTTP-backed engine (`facenet_provider`).
//!
//! Talks to a facenet service that exposes one endpoint per operation. Images
//! are sent as a multipart form with a single `data` part; responses are
//! JSON objects carrying `id` and/or `score`.
//!
//! | Operation    | Request                        | Response fields |
//! |--------------|--------------------------------|-----------------|
//! | register     | `POST {base_url}/register`     | `id`            |
//! | quality      | `POST {base_url}/quality`      | `score`         |
//! | liveness     | `POST {base_url}/liveness`     | `score`         |
//! | best match   | `POST {base_url}/best_batch`   | `id`, `score`   |
//! | remove face  | `DELETE {base_url}/face?face_id=` | (none)       |
//!
//! Matching against one specific face is not offered by the service.

use std::time::Duration;

use async_trait::async_trait;
use faceapi_tasks::{
    FaceAntiSpoofResult, FaceBestMatchResult, FaceMatchResult, FaceQualityResult,
    FaceRegisterResult, FailedResult, Outcome,
};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Provider, ProviderConfig, ProviderInfo, ProviderSettings};

const SEND_FAILED: &str = "can not send request to engine";
const BAD_RESPONSE: &str = "bad response from engine";
const NOT_IMPLEMENTED: &str = "method is not implemented";

/// Configuration of the HTTP engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    #[serde(flatten)]
    pub base: ProviderConfig,

    /// Service root, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ProviderSettings for HttpProviderConfig {
    fn base(&self) -> &ProviderConfig {
        &self.base
    }
}

/// Face-recognition engine reached over HTTP.
#[derive(Debug)]
pub struct HttpProvider {
    info: ProviderInfo,
    base_url: String,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Builds the provider and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a message if `base_url` is empty or the client cannot be
    /// built.
    pub fn new(config: HttpProviderConfig) -> Result<Self, String> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| format!("cannot build HTTP client: {e}"))?;
        Ok(Self {
            info: ProviderInfo::new(config.base),
            base_url,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// POSTs `data` as the `data` multipart field and returns the JSON
    /// object in the response.
    async fn post_image(&self, path: &str, data: &[u8]) -> Outcome<Map<String, Value>> {
        let url = self.url(path);
        let form = Form::new().part("data", Part::bytes(data.to_vec()).file_name("image"));

        let response = match self.client.post(&url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.send_failed(&url, &e)),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(self.bad_response(&url, &format!("status {status}")));
        }
        match response.json::<Value>().await {
            Ok(Value::Object(body)) => Ok(body),
            Ok(other) => Err(self.bad_response(&url, &format!("unexpected body {other}"))),
            Err(e) => Err(self.bad_response(&url, &e.to_string())),
        }
    }

    fn send_failed(&self, url: &str, err: &reqwest::Error) -> FailedResult {
        self.info
            .span()
            .in_scope(|| tracing::error!(%url, error = %err, "engine request failed"));
        FailedResult::new(SEND_FAILED)
    }

    fn bad_response(&self, url: &str, detail: &str) -> FailedResult {
        self.info
            .span()
            .in_scope(|| tracing::error!(%url, detail, "bad engine response"));
        FailedResult::new(BAD_RESPONSE)
    }

    fn id_field(&self, url: &str, body: &Map<String, Value>) -> Outcome<String> {
        match body.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(self.bad_response(url, "missing or empty id")),
        }
    }

    fn score_field(&self, url: &str, body: &Map<String, Value>) -> Outcome<f64> {
        let score = match body.get("score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        score
            .filter(|score: &f64| score.is_finite())
            .ok_or_else(|| self.bad_response(url, "missing or invalid score"))
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn register(&self, data: &[u8]) -> Outcome<FaceRegisterResult> {
        let body = self.post_image("register", data).await?;
        let id = self.id_field(&self.url("register"), &body)?;
        Ok(FaceRegisterResult::new(id))
    }

    async fn quality(&self, data: &[u8]) -> Outcome<FaceQualityResult> {
        let body = self.post_image("quality", data).await?;
        let score = self.score_field(&self.url("quality"), &body)?;
        Ok(FaceQualityResult::new(score))
    }

    async fn liveness(&self, data: &[u8]) -> Outcome<FaceAntiSpoofResult> {
        let body = self.post_image("liveness", data).await?;
        let score = self.score_field(&self.url("liveness"), &body)?;
        Ok(FaceAntiSpoofResult::new(score))
    }

    async fn best_match(&self, data: &[u8]) -> Outcome<FaceBestMatchResult> {
        let body = self.post_image("best_batch", data).await?;
        let url = self.url("best_batch");
        let score = self.score_field(&url, &body)?;
        let id = self.id_field(&url, &body)?;
        Ok(FaceBestMatchResult::new(id, score))
    }

    async fn match_with_face(&self, _data: &[u8], _internal_id: &str) -> Outcome<FaceMatchResult> {
        self.info
            .span()
            .in_scope(|| tracing::error!("match with face is not implemented by this engine"));
        Err(FailedResult::new(NOT_IMPLEMENTED))
    }

    async fn remove_face(&self, internal_id: &str) -> Outcome<()> {
        let url = self.url("face");
        let response = match self
            .client
            .delete(&url)
            .query(&[("face_id", internal_id)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.send_failed(&url, &e)),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(self.bad_response(&url, &format!("status {status}")));
        }
        Ok(())
    }
}
