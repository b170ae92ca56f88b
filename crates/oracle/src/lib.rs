//! Hosted model clients: the chat-completion oracle and the embeddings service.
//!
//! Asks a hosted language model for the prominent element of a mark. The
//! engine is synchronous, so answers are fetched ahead of time with
//! `ChatOracle::prefetch` and handed over as a `PrefetchedOracle` table.
//! Embeddings follow the same pattern through `EmbeddingClient::prefetch`.

pub mod embeddings;

pub use embeddings::EmbeddingClient;

use clearmark_features::prominent::clean_answer;
use clearmark_features::{OracleError, ProminentElementOracle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const PROMINENT_SYSTEM_PROMPT: &str = "You are a trademark attorney. \
     When given a compound trademark name, \
     identify the single most distinctive (legally prominent) element. \
     Answer with that word or phrase only.";

/// Errors from the oracle HTTP client.
#[derive(Debug, Error)]
pub enum OracleClientError {
    #[error("Oracle not configured: {0} is not set")]
    NotConfigured(&'static str),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Oracle returned an empty answer")]
    EmptyAnswer,
}

/// A chat-completion service.
pub trait ChatBackend {
    /// Send one request and return the text of the first choice.
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<String, OracleClientError>> + Send;

    /// Check if the service answers.
    fn health_check(&self) -> impl Future<Output = Result<(), OracleClientError>> + Send;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Oracle client configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Base URL of the Azure OpenAI resource
    pub endpoint: String,
    pub api_key: String,
    /// Chat model deployment name
    pub deployment: String,
    /// Embedding model deployment name
    pub embedding_deployment: String,
    pub api_version: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Requests in flight during prefetch
    pub max_concurrency: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            deployment: "gpt-4.1".to_string(),
            embedding_deployment: "text-embedding-3-small".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            timeout_secs: 30,
            max_concurrency: 8,
        }
    }
}

impl OracleConfig {
    /// Read `AZURE_ENDPOINT` and `AZURE_API_KEY`; `AZURE_DEPLOYMENT`,
    /// `AZURE_EMBEDDING_DEPLOYMENT` and `AZURE_API_VERSION` override the
    /// defaults when set.
    pub fn from_env() -> Result<Self, OracleClientError> {
        let var = |name: &'static str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self {
            endpoint: var("AZURE_ENDPOINT").ok_or(OracleClientError::NotConfigured("AZURE_ENDPOINT"))?,
            api_key: var("AZURE_API_KEY").ok_or(OracleClientError::NotConfigured("AZURE_API_KEY"))?,
            ..Self::default()
        };
        if let Some(deployment) = var("AZURE_DEPLOYMENT") {
            config.deployment = deployment;
        }
        if let Some(deployment) = var("AZURE_EMBEDDING_DEPLOYMENT") {
            config.embedding_deployment = deployment;
        }
        if let Some(api_version) = var("AZURE_API_VERSION") {
            config.api_version = api_version;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// The prominent-element question for `mark`.
    pub fn prominent_element(mark: &str) -> Self {
        Self {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: PROMINENT_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Trademark: \"{}\"\nWhich part is the prominent/distinctive element?",
                        mark
                    ),
                },
            ],
            temperature: 0.0,
            max_tokens: 20,
        }
    }

    fn ping() -> Self {
        Self {
            messages: vec![ChatMessage {
                role: "user",
                content: "ping".to_string(),
            }],
            temperature: 0.0,
            max_tokens: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text of the first choice, trimmed.
fn first_choice(response: ChatResponse) -> Result<String, OracleClientError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| OracleClientError::ParseError("Missing choices[0].message.content".to_string()))?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(OracleClientError::EmptyAnswer);
    }
    Ok(trimmed.to_string())
}

/// Azure OpenAI chat-completion oracle.
#[derive(Clone)]
pub struct ChatOracle {
    config: OracleConfig,
    client: reqwest::Client,
}

impl ChatOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleClientError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment
        )
    }

    /// The cleaned prominent element of `mark`: first line, trimmed,
    /// unquoted, lowercase.
    pub async fn prominent_element(&self, mark: &str) -> Result<String, OracleClientError> {
        let answer = self.complete(&ChatRequest::prominent_element(mark)).await?;
        let cleaned = clean_answer(&answer);
        if cleaned.is_empty() {
            return Err(OracleClientError::EmptyAnswer);
        }
        debug!(mark, element = %cleaned, "Oracle prominent element");
        Ok(cleaned)
    }

    /// Ask for every distinct mark concurrently. Failed or empty answers
    /// are left out of the table.
    pub async fn prefetch<I, S>(&self, marks: I) -> PrefetchedOracle
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let marks: BTreeSet<String> = marks
            .into_iter()
            .map(|m| m.as_ref().trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        let requested = marks.len();

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for mark in marks {
            let oracle = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let answer = oracle.prominent_element(&mark).await;
                (mark, answer)
            });
        }

        let mut answers = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((mark, Ok(element))) => {
                    answers.insert(mark, element);
                }
                Ok((mark, Err(e))) => warn!(mark = %mark, error = %e, "Oracle prefetch failed"),
                Err(e) => warn!(error = %e, "Oracle prefetch task aborted"),
            }
        }

        info!(requested, answered = answers.len(), "Oracle prefetch complete");
        PrefetchedOracle { answers }
    }
}

impl ChatBackend for ChatOracle {
    async fn complete(&self, request: &ChatRequest) -> Result<String, OracleClientError> {
        let response = self
            .client
            .post(self.completions_url())
            .query(&[("api-version", self.config.api_version.as_str())])
            .header("api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| OracleClientError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleClientError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleClientError::ParseError(e.to_string()))?;

        first_choice(parsed)
    }

    async fn health_check(&self) -> Result<(), OracleClientError> {
        match self.complete(&ChatRequest::ping()).await {
            Ok(_) | Err(OracleClientError::EmptyAnswer) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "azure-openai"
    }
}

/// Oracle answers fetched ahead of time, keyed by trimmed mark.
#[derive(Debug, Clone, Default)]
pub struct PrefetchedOracle {
    answers: HashMap<String, String>,
}

impl PrefetchedOracle {
    pub fn from_answers<I, K, V>(answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .filter(|(_, v)| !v.trim().is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl ProminentElementOracle for PrefetchedOracle {
    fn prominent_element(&self, mark: &str) -> Result<String, OracleError> {
        self.answers
            .get(mark.trim())
            .cloned()
            .ok_or_else(|| OracleError::NoAnswer(mark.to_string()))
    }
}
