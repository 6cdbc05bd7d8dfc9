//! Transcript normalization.
//!
//! Merges one or more extracted sources into a single ordered turn sequence:
//! per-source dedup, empty-text drop, and a best-effort chronological sort
//! that only applies when every turn carries a timestamp. Comparison is
//! lexical on the date string — exports with ISO-like timestamps sort
//! correctly, anything else keeps concatenation order.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::models::Turn;

/// Dedup prefix length: two turns by the same author sharing this many
/// leading characters count as re-exports of the same message.
const DEDUP_PREFIX_CHARS: usize = 80;

/// Merge extracted sources, in caller-specified order, into one turn sequence.
///
/// Dedup is scoped per source file, not global: the same exchange appearing
/// in two different exports is kept from both. Fails when zero turns survive
/// so callers abort instead of persisting empty downstream artifacts.
pub fn merge_sources(sources: Vec<Vec<Turn>>) -> Result<Vec<Turn>> {
    let mut merged: Vec<Turn> = Vec::new();

    for source in sources {
        let mut seen: HashSet<[u8; 32]> = HashSet::new();
        for turn in source {
            let text = normalize_whitespace(&turn.text);
            if text.is_empty() {
                continue;
            }
            if !seen.insert(dedup_key(&turn.author, &text)) {
                continue;
            }
            merged.push(Turn {
                author: turn.author,
                text,
                date: turn.date.filter(|d| !d.trim().is_empty()),
            });
        }
    }

    if merged.is_empty() {
        bail!("no turns recoverable from any source");
    }

    // Reorder only when every entry is dated; a single missing date keeps
    // the concatenation order untouched.
    if merged.iter().all(|t| t.date.is_some()) {
        merged.sort_by(|a, b| a.date.cmp(&b.date));
    }

    Ok(merged)
}

fn dedup_key(author: &str, text: &str) -> [u8; 32] {
    let prefix: String = text.chars().take(DEDUP_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(author.as_bytes());
    hasher.update([0u8]);
    hasher.update(prefix.as_bytes());
    hasher.finalize().into()
}

/// Collapse internal whitespace runs to single spaces and trim the ends,
/// preserving line breaks as spaces.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
