//! Azure OpenAI embeddings client.
//!
//! The semantic evaluators call a synchronous `Embedder`, so vectors for
//! every text a run will compare are fetched up front and handed to the
//! engine as a `PrecomputedEmbedder`.

use crate::{OracleClientError, OracleConfig};
use clearmark_features::{Embedding, PrecomputedEmbedder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Texts per embeddings request.
const BATCH_SIZE: usize = 64;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Vectors in request order. The service may answer out of order, so
/// entries are sorted by `index`; a short answer is an error.
fn ordered_vectors(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Embedding>, OracleClientError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(OracleClientError::ParseError(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Azure OpenAI embeddings deployment.
#[derive(Clone)]
pub struct EmbeddingClient {
    config: OracleConfig,
    client: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(config: OracleConfig) -> Result<Self, OracleClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleClientError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Model identifier for logging.
    pub fn model_name(&self) -> &str {
        &self.config.embedding_deployment
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings",
            self.config.endpoint.trim_end_matches('/'),
            self.config.embedding_deployment
        )
    }

    /// Embed one batch of texts; vectors come back in input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, OracleClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.embeddings_url())
            .query(&[("api-version", self.config.api_version.as_str())])
            .header("api-key", &self.config.api_key)
            .json(&EmbeddingRequest { input: texts })
            .send()
            .await
            .map_err(|e| OracleClientError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleClientError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| OracleClientError::ParseError(e.to_string()))?;

        ordered_vectors(parsed, texts.len())
    }

    /// Embed every distinct text. Batches that fail are logged and left
    /// out; the engine treats their texts as having no semantic signal.
    pub async fn prefetch<I, S>(&self, texts: I) -> PrecomputedEmbedder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let texts: Vec<String> = texts
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !t.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let requested = texts.len();

        let mut vectors = HashMap::with_capacity(requested);
        for batch in texts.chunks(BATCH_SIZE) {
            match self.embed_batch(batch).await {
                Ok(embeddings) => {
                    debug!(batch = batch.len(), "Embedding batch complete");
                    vectors.extend(batch.iter().cloned().zip(embeddings));
                }
                Err(e) => warn!(error = %e, batch = batch.len(), "Embedding batch failed"),
            }
        }

        info!(
            requested,
            embedded = vectors.len(),
            model = %self.model_name(),
            "Embedding prefetch complete"
        );
        PrecomputedEmbedder::new(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearmark_features::{Embedder, EmbeddingError};
    use pretty_assertions::assert_eq;

    fn client() -> EmbeddingClient {
        EmbeddingClient::new(OracleConfig {
            endpoint: "https://example.openai.azure.com/".to_string(),
            api_key: "test-key".to_string(),
            ..OracleConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_embeddings_url() {
        assert_eq!(
            client().embeddings_url(),
            "https://example.openai.azure.com/openai/deployments/text-embedding-3-small/embeddings"
        );
    }

    #[test]
    fn test_request_body() {
        let texts = vec!["apparel".to_string(), "clothing".to_string()];
        let body = serde_json::to_value(EmbeddingRequest { input: &texts }).unwrap();
        assert_eq!(body, serde_json::json!({"input": ["apparel", "clothing"]}));
    }

    #[test]
    fn test_vectors_sorted_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"embedding": [0.0, 1.0], "index": 1},
                {"embedding": [1.0, 0.0], "index": 0}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            ordered_vectors(response, 2).unwrap(),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        );
    }

    #[test]
    fn test_short_response_is_error() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0], "index": 0}]}"#).unwrap();
        assert!(matches!(
            ordered_vectors(response, 2),
            Err(OracleClientError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_prefetch_against_unreachable_service() {
        let client = EmbeddingClient::new(OracleConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            timeout_secs: 2,
            ..OracleConfig::default()
        })
        .unwrap();

        let table = client.prefetch(["apparel", "clothing", " "]).await;
        assert!(table.is_empty());
        assert!(matches!(
            table.embed("apparel"),
            Err(EmbeddingError::MissingVector(_))
        ));
    }
}
