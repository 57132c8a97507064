//! Client of the subscription backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Longest response excerpt kept in an error.
const BODY_EXCERPT: usize = 800;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected backend response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanInfo {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub interval: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionStatus {
    pub active: bool,
    pub plan_id: Option<i64>,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationRequest {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
    pub provider: String,
    pub provider_ref: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivationResult {
    pub ok: bool,
    #[serde(default)]
    pub already_processed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRequest {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
    pub tg_username: String,
}

#[derive(Debug, Deserialize)]
struct ApprovalResponse {
    approve_url: String,
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn plans(&self, bot_id: i64) -> Result<Vec<PlanInfo>, BackendError>;

    async fn status(&self, bot_id: i64, tg_user_id: &str)
    -> Result<SubscriptionStatus, BackendError>;

    /// Returns the PayPal approval URL for the plan.
    async fn paypal_approval(&self, req: &ApprovalRequest) -> Result<String, BackendError>;

    async fn activate(&self, req: &ActivationRequest) -> Result<ActivationResult, BackendError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Every call made through this client gives up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn plans(&self, bot_id: i64) -> Result<Vec<PlanInfo>, BackendError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/bots/{}/plans", bot_id)))
            .send()
            .await?;
        read_json(resp).await
    }

    async fn status(
        &self,
        bot_id: i64,
        tg_user_id: &str,
    ) -> Result<SubscriptionStatus, BackendError> {
        let resp = self
            .client
            .get(self.url("/api/status"))
            .query(&[("bot_id", bot_id.to_string().as_str()), ("tg_user_id", tg_user_id)])
            .send()
            .await?;
        read_json(resp).await
    }

    async fn paypal_approval(&self, req: &ApprovalRequest) -> Result<String, BackendError> {
        let resp = self
            .client
            .post(self.url("/api/paypal/create-subscription"))
            .json(req)
            .send()
            .await?;
        let body: ApprovalResponse = read_json(resp).await?;
        Ok(body.approve_url)
    }

    async fn activate(&self, req: &ActivationRequest) -> Result<ActivationResult, BackendError> {
        let resp = self
            .client
            .post(self.url("/api/activate"))
            .json(req)
            .send()
            .await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BackendError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body: excerpt(&body),
        });
    }
    parse_body(&body)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body)
        .map_err(|err| BackendError::Malformed(format!("{}: {}", err, excerpt(body))))
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}
