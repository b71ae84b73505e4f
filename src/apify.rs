//! Client for the Apify actor platform.
//!
//! Actors are opaque long-running jobs: start a run with some input, wait for
//! it to reach a terminal status, then read the records from its default
//! dataset.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("APIFY_TOKEN is not configured")]
    MissingToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Apify API returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ActorError {
    pub fn kind(&self) -> &'static str {
        match self {
            ActorError::MissingToken => "MissingToken",
            ActorError::Http(_) => "HttpError",
            ActorError::Status { .. } => "ApiError",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRun {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt", default)]
    pub started_at: Option<String>,
    #[serde(rename = "finishedAt", default)]
    pub finished_at: Option<String>,
}

impl ActorRun {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "SUCCEEDED" | "FAILED" | "TIMED-OUT" | "ABORTED"
        )
    }

    pub fn succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Runs actors and reads their results
#[async_trait]
pub trait ActorRunner: Send + Sync {
    /// Start `actor_id` with `input` and wait until the run is finished.
    async fn call(&self, actor_id: &str, input: Value) -> Result<ActorRun, ActorError>;

    /// Fetch every record of a dataset.
    async fn list_items(&self, dataset_id: &str) -> Result<Vec<Value>, ActorError>;
}

pub struct ApifyClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    wait_secs: u64,
}

impl ApifyClient {
    pub fn new(config: &Config) -> Result<Self, ActorError> {
        // Each wait request is held open server-side for up to `wait_secs`
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.actor_wait_secs + 30))
            .user_agent(format!("facebook-scraper-mcp/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.apify_base_url.trim_end_matches('/').to_string(),
            token: config.apify_token.clone(),
            wait_secs: config.actor_wait_secs.max(1),
        })
    }

    fn token(&self) -> Result<&str, ActorError> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ActorError::MissingToken)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ActorError> {
        let response = request.bearer_auth(self.token()?).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ActorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn wait_for_run(&self, run_id: &str) -> Result<ActorRun, ActorError> {
        let url = format!("{}/v2/actor-runs/{}", self.base_url, run_id);
        let request = self
            .http
            .get(url)
            .query(&[("waitForFinish", self.wait_secs.to_string())]);

        let envelope: Envelope<ActorRun> = self.send(request).await?;
        Ok(envelope.data)
    }
}

/// The REST API addresses `owner/name` actors as `owner~name`.
fn actor_path(actor_id: &str) -> String {
    actor_id.replace('/', "~")
}

#[async_trait]
impl ActorRunner for ApifyClient {
    async fn call(&self, actor_id: &str, input: Value) -> Result<ActorRun, ActorError> {
        let url = format!("{}/v2/acts/{}/runs", self.base_url, actor_path(actor_id));
        let envelope: Envelope<ActorRun> = self.send(self.http.post(url).json(&input)).await?;
        let mut run = envelope.data;
        info!("Started actor {} run {} ({})", actor_id, run.id, run.status);

        while !run.is_terminal() {
            debug!("Waiting for run {} (status: {})", run.id, run.status);
            run = self.wait_for_run(&run.id).await?;
        }

        info!("Actor run {} finished with status: {}", run.id, run.status);
        Ok(run)
    }

    async fn list_items(&self, dataset_id: &str) -> Result<Vec<Value>, ActorError> {
        let url = format!("{}/v2/datasets/{}/items", self.base_url, dataset_id);
        let request = self
            .http
            .get(url)
            .query(&[("format", "json"), ("clean", "true")]);

        self.send(request).await
    }
}
