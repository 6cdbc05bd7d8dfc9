//! Embedding service client and vector utilities.
//!
//! Calls the OpenAI embeddings API with batching, retry, and backoff, and
//! provides [`cosine_similarity`] for the retrieval engine.
//!
//! # Order restoration
//!
//! The embeddings endpoint returns one `{embedding, index}` item per input.
//! Response order is **not** trusted: [`parse_embedding_response`] re-sorts
//! items by the service-provided `index` before the vectors are zipped back
//! to their source texts. See the unit tests for the reversed-order case.
//!
//! # Retry strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Environment variable holding the API credential for both the embedding
/// and generation services.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Returns the configured API credential, if any.
pub fn api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Embed a batch of texts, preserving input order in the result.
///
/// # Errors
///
/// Fails when no credential is configured, the API returns a non-retryable
/// error, or all retries are exhausted.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let Some(key) = api_key() else {
        bail!("{} not set", API_KEY_ENV);
    };

    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = build_embedding_request(config, texts);

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_embedding_response(&json, texts.len());
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "embedding API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed after retries")))
}

/// Build the embeddings request body. `dimensions` pins the configured
/// dimensionality so the service returns vectors the index can compare.
pub fn build_embedding_request(config: &EmbeddingConfig, texts: &[String]) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "input": texts,
        "dimensions": config.dims,
    })
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
}

/// Parse the embeddings API response, restoring request order via the
/// per-item `index` field.
///
/// Fails when an item is malformed, an `index` is out of range or
/// duplicated, or the item count does not match `expected`.
pub fn parse_embedding_response(
    json: &serde_json::Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing data array"))?;

    if data.len() != expected {
        bail!(
            "invalid embedding response: expected {} items, got {}",
            expected,
            data.len()
        );
    }

    let mut ordered: Vec<Option<Vec<f32>>> = vec![None; expected];

    for item in data {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing index"))?
            as usize;

        if index >= expected {
            bail!("invalid embedding response: index {} out of range", index);
        }
        if ordered[index].is_some() {
            bail!("invalid embedding response: duplicate index {}", index);
        }

        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        ordered[index] = Some(vec);
    }

    // Every slot is filled: counts matched and indices were unique in-range.
    Ok(ordered.into_iter().flatten().collect())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Total over all inputs: returns `0.0` for empty vectors, vectors of
/// different lengths, or a zero-norm side — mismatched index entries score
/// zero instead of poisoning a ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
