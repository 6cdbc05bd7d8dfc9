//! Persona synthesis.
//!
//! Consumes the normalized turn sequence and a target author, and emits the
//! persona record: style signals, a bounded set of representative few-shot
//! pairs, style exemplar sentences, and the assembled system prompt.
//!
//! Selection is deterministic. When candidates exceed a bound, a uniform
//! stratified sample spreads the kept items evenly across the whole timeline
//! instead of biasing toward the most recent messages.

use anyhow::Result;
use std::collections::{BTreeSet, HashSet};

use crate::artifacts;
use crate::config::Config;
use crate::models::{FewShotPair, PersonaMeta, PersonaRecord, Turn};
use crate::pairs::{scan_pairs, PERSONA_PAIR_MAX_LEN};

/// Mean message length below which the persona is flagged as a short-replier.
const SHORT_REPLY_MEAN_CHARS: usize = 80;
/// At most this many style exemplars are rendered into the system prompt,
/// regardless of how many the record stores.
const PROMPT_EXEMPLAR_LIMIT: usize = 40;

/// Style tendencies derived from all target-authored text.
#[derive(Debug, Clone, Copy)]
pub struct StyleSignals {
    pub uses_emoji: bool,
    pub short_replies: bool,
    pub mean_len: usize,
}

/// Deterministic uniform stratified sample of `max` indices over `0..n`.
///
/// Uses `step = (n-1)/(max-1)` and selects `round(k*step)` for each slot,
/// clamped and deduplicated, so the picks spread evenly across the timeline.
/// Returns all indices when `n <= max`.
pub fn stratified_indices(n: usize, max: usize) -> Vec<usize> {
    if n == 0 || max == 0 {
        return Vec::new();
    }
    if n <= max {
        return (0..n).collect();
    }
    if max == 1 {
        return vec![0];
    }

    let step = (n - 1) as f64 / (max - 1) as f64;
    let mut picked: BTreeSet<usize> = BTreeSet::new();
    for k in 0..max {
        let idx = (k as f64 * step).round() as usize;
        picked.insert(idx.min(n - 1));
    }
    picked.into_iter().collect()
}

/// Compute style signals from all turns authored by the target.
pub fn style_signals<'a, I: Iterator<Item = &'a str>>(texts: I) -> StyleSignals {
    let mut total_chars = 0usize;
    let mut count = 0usize;
    let mut uses_emoji = false;

    for text in texts {
        total_chars += text.chars().count();
        count += 1;
        if !uses_emoji && text.chars().any(is_emoji) {
            uses_emoji = true;
        }
    }

    let mean_len = if count == 0 { 0 } else { total_chars / count };
    StyleSignals {
        uses_emoji,
        short_replies: count > 0 && mean_len < SHORT_REPLY_MEAN_CHARS,
        mean_len,
    }
}

fn is_emoji(c: char) -> bool {
    matches!(u32::from(c),
        0x1F300..=0x1F5FF   // symbols & pictographs
        | 0x1F600..=0x1F64F // emoticons
        | 0x1F680..=0x1F6FF // transport & map
        | 0x1F900..=0x1FAFF // supplemental pictographs
        | 0x2600..=0x27BF   // misc symbols, dingbats
    )
}

/// Strip a leading `"HH:MM Name "` export artifact from a message.
///
/// Some exports prefix quoted or forwarded messages with the send time and
/// author. Also used by reply post-processing, where generated text
/// occasionally imitates the artifact.
pub fn strip_time_author_prefix(text: &str, author: &str) -> String {
    let trimmed = text.trim_start();
    let Some(rest) = strip_clock(trimmed) else {
        return text.to_string();
    };
    let rest = rest.trim_start();

    // Author label after the clock is optional in the wild.
    let rest = rest.strip_prefix(author).unwrap_or(rest);
    let rest = rest.trim_start_matches([':', '-']).trim_start();
    rest.to_string()
}

/// Strip a leading `H:MM` / `HH:MM[:SS]` clock, returning the remainder.
fn strip_clock(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if !(1..=2).contains(&i) || bytes.get(i) != Some(&b':') {
        return None;
    }
    let minutes_start = i + 1;
    let mut j = minutes_start;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }
    if j - minutes_start != 2 {
        return None;
    }
    // Optional seconds. A failed slice (too short, or a multibyte char
    // right after the colon) means there are none.
    if bytes.get(j) == Some(&b':') {
        if let Some(secs) = s.get(j + 1..j + 3) {
            if secs.bytes().all(|b| b.is_ascii_digit()) {
                return Some(&s[j + 3..]);
            }
        }
    }
    Some(&s[j..])
}

/// True for strings that are nothing but a timestamp (digits and separators).
fn is_pure_timestamp(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | '-' | '/' | ',' | ' '))
}

/// Select few-shot pairs: all candidates when they fit the bound, otherwise
/// a stratified sample across the timeline.
pub fn select_few_shot_pairs(turns: &[Turn], target: &str, max_pairs: usize) -> Vec<FewShotPair> {
    let mut candidates = scan_pairs(turns, target, PERSONA_PAIR_MAX_LEN);
    let indices = stratified_indices(candidates.len(), max_pairs);

    indices
        .into_iter()
        .map(|idx| {
            let candidate = &mut candidates[idx];
            FewShotPair {
                user: std::mem::take(&mut candidate.context),
                assistant: std::mem::take(&mut candidate.response),
            }
        })
        .collect()
}

/// Select style exemplar sentences from target-authored turns.
pub fn select_style_samples(
    turns: &[Turn],
    target: &str,
    min_len: usize,
    max_len: usize,
    max_samples: usize,
) -> Vec<String> {
    let candidates: Vec<String> = turns
        .iter()
        .filter(|t| t.author == target)
        .map(|t| strip_time_author_prefix(&t.text, target).trim().to_string())
        .filter(|text| {
            let len = text.chars().count();
            len >= min_len && len <= max_len && !is_pure_timestamp(text)
        })
        .collect();

    let indices = stratified_indices(candidates.len(), max_samples);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut samples = Vec::with_capacity(indices.len());
    for idx in indices {
        let text = candidates[idx].as_str();
        if seen.insert(text) {
            samples.push(text.to_string());
        }
    }
    samples
}

/// Assemble the persona system prompt from the template, derived style notes,
/// optional bio/traits, and a bounded exemplar list.
pub fn build_system_prompt(
    name: &str,
    signals: StyleSignals,
    bio: Option<&str>,
    traits: Option<&str>,
    style_samples: &[String],
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "You are {name}. Stay in character as {name} at all times and never \
         mention being an AI, an assistant, or a language model.\n\
         Reply the way {name} writes in a casual chat: same tone, same \
         vocabulary, same message length.\n\
         Output only the reply text itself — no quotes, no speaker labels, \
         no timestamps."
    ));

    let mut notes: Vec<&str> = Vec::new();
    if signals.uses_emoji {
        notes.push("You use emoji naturally; keep doing so where it fits.");
    }
    if signals.short_replies {
        notes.push("Your replies are short — usually one sentence or less. Do not pad them.");
    }
    if !notes.is_empty() {
        sections.push(format!("Style notes:\n{}", notes.join("\n")));
    }

    if let Some(bio) = bio.filter(|b| !b.trim().is_empty()) {
        sections.push(format!("About {name}:\n{}", bio.trim()));
    }
    if let Some(traits) = traits.filter(|t| !t.trim().is_empty()) {
        sections.push(format!("Personality traits:\n{}", traits.trim()));
    }

    if !style_samples.is_empty() {
        let bullets: Vec<String> = style_samples
            .iter()
            .take(PROMPT_EXEMPLAR_LIMIT)
            .map(|s| format!("- {}", s))
            .collect();
        sections.push(format!(
            "Examples of how {name} actually writes:\n{}",
            bullets.join("\n")
        ));
    }

    sections.join("\n\n")
}

/// Synthesize the full persona record from a turn sequence.
pub fn synthesize(turns: &[Turn], config: &Config, person: &str) -> PersonaRecord {
    let persona_cfg = &config.persona;

    let signals = style_signals(
        turns
            .iter()
            .filter(|t| t.author == person)
            .map(|t| t.text.as_str()),
    );

    let few_shot_pairs = select_few_shot_pairs(turns, person, persona_cfg.max_pairs);
    let style_samples = select_style_samples(
        turns,
        person,
        persona_cfg.min_sample_len,
        persona_cfg.max_sample_len,
        persona_cfg.max_style_samples,
    );

    let system_prompt = build_system_prompt(
        person,
        signals,
        persona_cfg.bio.as_deref(),
        persona_cfg.traits.as_deref(),
        &style_samples,
    );

    let person_message_count = turns.iter().filter(|t| t.author == person).count();

    PersonaRecord {
        person_name: person.to_string(),
        system_prompt,
        few_shot_pairs,
        style_samples,
        meta: PersonaMeta {
            message_count: turns.len(),
            person_message_count,
        },
    }
}

/// `mimic persona build` — synthesize and persist the persona record.
///
/// Fatal when the turns artifact is absent; synthesis never runs against a
/// partial transcript.
pub fn run_persona_build(
    config: &Config,
    person_override: Option<String>,
    traits_override: Option<String>,
    bio_override: Option<String>,
) -> Result<()> {
    let turns = artifacts::load_turns_required(config)?;

    let mut config = config.clone();
    if let Some(traits) = traits_override {
        config.persona.traits = Some(traits);
    }
    if let Some(bio) = bio_override {
        config.persona.bio = Some(bio);
    }
    let person = person_override.unwrap_or_else(|| config.persona.person.clone());

    let record = synthesize(&turns, &config, &person);

    if record.meta.person_message_count == 0 {
        anyhow::bail!(
            "no turns authored by '{}' — check persona.person against the transcript",
            person
        );
    }

    artifacts::save_json(&config.artifacts.persona_path(), &record)?;

    println!("persona build");
    println!("  person: {}", record.person_name);
    println!("  transcript turns: {}", record.meta.message_count);
    println!("  person turns: {}", record.meta.person_message_count);
    println!("  few-shot pairs: {}", record.few_shot_pairs.len());
    println!("  style samples: {}", record.style_samples.len());
    println!("ok");
    Ok(())
}

/// `mimic persona show` — print a summary of the persisted record.
pub fn run_persona_show(config: &Config) -> Result<()> {
    let record = artifacts::load_persona_required(config)?;

    println!("persona: {}", record.person_name);
    println!(
        "  built from {} turns ({} by {})",
        record.meta.message_count, record.meta.person_message_count, record.person_name
    );
    println!("  few-shot pairs: {}", record.few_shot_pairs.len());
    println!("  style samples: {}", record.style_samples.len());
    println!();
    println!("{}", record.system_prompt);
    Ok(())
}
