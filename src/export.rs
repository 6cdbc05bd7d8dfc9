//! Export a fine-tuning corpus from the normalized transcript.
//!
//! Produces JSON-lines in the chat fine-tuning format: one
//! `{"messages": [system, user, assistant]}` object per qualifying dialogue
//! pair, with the persona's system prompt as the system message. The output
//! feeds a hosted fine-tuning job whose resulting model id goes into
//! `[generation].fine_tuned_model`.

use anyhow::{bail, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::artifacts;
use crate::config::Config;
use crate::models::ChatMessage;
use crate::pairs::{scan_pairs, PERSONA_PAIR_MAX_LEN};

/// Fewer examples than this will not train anything useful; refuse to write
/// a degenerate corpus.
const MIN_EXAMPLES: usize = 10;

#[derive(Serialize)]
struct FinetuneExample {
    messages: Vec<ChatMessage>,
}

/// Export the fine-tuning corpus as JSONL.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes to
/// stdout for piping.
pub fn run_export_finetune(config: &Config, output: Option<&Path>) -> Result<()> {
    let turns = artifacts::load_turns_required(config)?;
    let persona = artifacts::load_persona_required(config)?;

    let person = &config.persona.person;
    let candidates = scan_pairs(&turns, person, PERSONA_PAIR_MAX_LEN);

    if candidates.len() < MIN_EXAMPLES {
        bail!(
            "only {} qualifying pairs for '{}' (minimum {}) — not writing a fine-tuning corpus",
            candidates.len(),
            person,
            MIN_EXAMPLES
        );
    }

    let mut lines = String::new();
    let count = candidates.len();
    for candidate in candidates {
        let example = FinetuneExample {
            messages: vec![
                ChatMessage::system(&persona.system_prompt),
                ChatMessage::user(&candidate.context),
                ChatMessage::assistant(&candidate.response),
            ],
        };
        lines.push_str(&serde_json::to_string(&example)?);
        lines.push('\n');
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &lines)?;
            println!("export finetune");
            println!("  examples: {}", count);
            println!("  wrote: {}", path.display());
            println!("ok");
        }
        None => {
            std::io::stdout().write_all(lines.as_bytes())?;
        }
    }

    Ok(())
}
