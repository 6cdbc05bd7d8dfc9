//! Dialogue chunk indexer.
//!
//! Scans the normalized transcript for (context → response) pairs answered
//! by the persona, embeds every qualifying context through the embedding
//! service in batches, and persists the resulting vector index as one JSON
//! artifact. The build is idempotent and replaces any prior index wholesale;
//! there is no incremental update path.

use anyhow::{bail, Result};

use crate::artifacts;
use crate::config::Config;
use crate::embedding;
use crate::models::VectorIndexEntry;
use crate::pairs::{scan_pairs, INDEX_PAIR_MAX_LEN};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};

/// `mimic index build` — embed all dialogue pairs and persist the index.
///
/// Fatal without an API credential or the turns artifact: an index silently
/// built from nothing would poison retrieval downstream.
pub async fn run_index_build(
    config: &Config,
    batch_size_override: Option<usize>,
    reporter: &dyn IndexProgressReporter,
) -> Result<()> {
    if embedding::api_key().is_none() {
        bail!(
            "{} not set — the index build embeds every pair and needs a credential",
            embedding::API_KEY_ENV
        );
    }

    let turns = artifacts::load_turns_required(config)?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    reporter.report(IndexProgressEvent::Scanning);
    let person = &config.persona.person;
    let pairs: Vec<_> = scan_pairs(&turns, person, INDEX_PAIR_MAX_LEN)
        .into_iter()
        .map(|candidate| candidate.into_dialogue_pair(person))
        .collect();

    if pairs.is_empty() {
        bail!(
            "no dialogue pairs found for '{}' — nothing to index",
            person
        );
    }

    let total = pairs.len() as u64;
    let mut entries: Vec<VectorIndexEntry> = Vec::with_capacity(pairs.len());

    for batch in pairs.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.context_text.clone()).collect();
        let vectors = embedding::embed_texts(&config.embedding, &texts).await?;

        for (pair, vec) in batch.iter().zip(vectors.into_iter()) {
            entries.push(VectorIndexEntry {
                embedding: vec,
                rendered_text: pair.rendered_text.clone(),
            });
        }

        reporter.report(IndexProgressEvent::Embedding {
            n: entries.len() as u64,
            total,
        });
    }

    artifacts::save_json(&config.artifacts.index_path(), &entries)?;

    println!("index build");
    println!("  person: {}", person);
    println!("  pairs embedded: {}", entries.len());
    println!("  dims: {}", entries.first().map_or(0, |e| e.embedding.len()));
    println!("ok");
    Ok(())
}

/// `mimic index stats` — print a summary of the persisted index.
pub fn run_index_stats(config: &Config) -> Result<()> {
    let path = config.artifacts.index_path();
    match artifacts::load_index(config)? {
        None => println!("no index at {}", path.display()),
        Some(entries) => {
            println!("index: {}", path.display());
            println!("  entries: {}", entries.len());
            println!(
                "  dims: {}",
                entries.first().map_or(0, |e| e.embedding.len())
            );
            let mismatched = entries
                .iter()
                .skip(1)
                .filter(|e| {
                    entries
                        .first()
                        .is_some_and(|first| e.embedding.len() != first.embedding.len())
                })
                .count();
            if mismatched > 0 {
                println!("  WARNING: {} entries with mismatched dims", mismatched);
            }
        }
    }
    Ok(())
}
