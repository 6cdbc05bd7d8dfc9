//! Ingestion orchestration.
//!
//! Coordinates the offline intake flow: read raw export files, run each
//! through the extraction strategies, merge and normalize into one turn
//! sequence, and persist the turns artifact that every later build step
//! reads.

use anyhow::{Context, Result};
use std::path::Path;

use crate::artifacts;
use crate::config::Config;
use crate::extract::extract_turns;
use crate::normalize::merge_sources;

/// `mimic ingest` — extract and normalize one or more raw exports.
///
/// Files are processed in the order given, which fixes the merged order when
/// turns carry no dates. A file that yields zero turns gets a warning but
/// does not abort the run; zero turns across all files does.
pub fn run_ingest(config: &Config, files: &[impl AsRef<Path>]) -> Result<()> {
    let mut sources = Vec::with_capacity(files.len());

    for file in files {
        let path = file.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let (turns, strategy) = extract_turns(&raw);
        if turns.is_empty() {
            eprintln!("warning: no turns extracted from {}", path.display());
        } else {
            println!(
                "  {}: {} turns ({})",
                path.display(),
                turns.len(),
                strategy
            );
        }
        sources.push(turns);
    }

    let merged = merge_sources(sources)?;

    let person = &config.persona.person;
    let person_turns = merged.iter().filter(|t| t.author == *person).count();
    let authors: std::collections::BTreeSet<&str> =
        merged.iter().map(|t| t.author.as_str()).collect();

    artifacts::save_json(&config.artifacts.turns_path(), &merged)?;

    println!("ingest");
    println!("  files: {}", files.len());
    println!("  turns: {}", merged.len());
    println!("  authors: {}", authors.len());
    println!("  by '{}': {}", person, person_turns);
    if person_turns == 0 {
        eprintln!(
            "warning: no turns authored by '{}' — check [persona].person",
            person
        );
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> Config {
        toml::from_str(&format!(
            r#"
[artifacts]
dir = "{}"

[persona]
person = "Alex"
"#,
            dir.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_ingest_writes_turns_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let export = dir.path().join("chat.json");
        std::fs::write(
            &export,
            r#"[{"author": "Sam", "text": "hi"}, {"author": "Alex", "text": "hey"}]"#,
        )
        .unwrap();

        run_ingest(&config, &[&export]).unwrap();

        let turns = artifacts::load_turns_required(&config).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].author, "Alex");
    }

    #[test]
    fn test_ingest_fails_with_zero_recoverable_turns() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let export = dir.path().join("empty.txt");
        std::fs::write(&export, "").unwrap();

        assert!(run_ingest(&config, &[&export]).is_err());
        assert!(!config.artifacts.turns_path().exists());
    }

    #[test]
    fn test_ingest_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let missing = dir.path().join("nope.txt");
        assert!(run_ingest(&config, &[&missing]).is_err());
    }
}
