//! Semantic retrieval over the persisted dialogue index.
//!
//! Retrieval is an optional enhancement: when the index is missing or empty,
//! or no credential is configured, the engine returns an empty result set
//! instead of failing. Similarity is cosine over the stored context
//! embeddings, with mismatched dimensionalities scoring zero.

use anyhow::Result;

use crate::artifacts;
use crate::config::Config;
use crate::embedding;
use crate::models::VectorIndexEntry;

/// Rank `entries` against a query vector and return the rendered text of the
/// `k` most similar, descending. Ties keep original index order — the sort
/// is stable and only reorders on strict similarity difference.
pub fn top_k(entries: &[VectorIndexEntry], query_vec: &[f32], k: usize) -> Vec<String> {
    let mut scored: Vec<(usize, f32)> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (i, embedding::cosine_similarity(query_vec, &entry.embedding)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(i, _)| entries[i].rendered_text.clone())
        .collect()
}

/// Retrieve the top-`k` rendered pairs for a live query.
///
/// `entries` is the caller's loaded snapshot ([`crate::pipeline::ServingContext`]
/// holds it for the process lifetime). Returns an empty vector without an
/// index, without entries, or without a credential; embeds the query with a
/// single service call otherwise.
pub async fn retrieve(
    config: &Config,
    entries: Option<&[VectorIndexEntry]>,
    query: &str,
    k: usize,
) -> Result<Vec<String>> {
    let Some(entries) = entries.filter(|e| !e.is_empty()) else {
        return Ok(Vec::new());
    };
    if embedding::api_key().is_none() {
        return Ok(Vec::new());
    }

    let query_vec = embedding::embed_query(&config.embedding, query).await?;
    Ok(top_k(entries, &query_vec, k))
}

/// `mimic retrieve` — embed a query and print the ranked matches.
///
/// Loads the index fresh from disk; the long-lived snapshot cache belongs to
/// the serving context, not to one-shot CLI calls.
pub async fn run_retrieve(config: &Config, query: &str, k_override: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let k = k_override
        .unwrap_or(config.retrieval.top_k)
        .min(crate::config::TOP_K_CAP);

    let index = artifacts::load_index(config)?;
    let results = retrieve(config, index.as_deref(), query, k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, rendered) in results.iter().enumerate() {
        println!("{}.", i + 1);
        for line in rendered.lines() {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}
