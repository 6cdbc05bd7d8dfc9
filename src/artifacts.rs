//! Persisted artifact I/O.
//!
//! Every pipeline artifact is one JSON document on disk under the configured
//! artifacts directory: the normalized turn sequence, the persona record,
//! and the vector index. Offline build commands write them wholesale;
//! the online serving path loads them once and treats them as immutable
//! snapshots. There is no incremental update — a rebuild replaces the file.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::models::{PersonaRecord, Turn, VectorIndexEntry};

/// Write a JSON artifact, creating parent directories as needed.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load a JSON artifact. `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Load the normalized turns artifact, failing with a build-step hint when
/// it is missing. Offline commands call this and exit non-zero without it.
pub fn load_turns_required(config: &Config) -> Result<Vec<Turn>> {
    let path = config.artifacts.turns_path();
    load_json::<Vec<Turn>>(&path)?.with_context(|| {
        format!(
            "turns artifact not found at {} — run `mimic ingest` first",
            path.display()
        )
    })
}

/// Load the persona record, failing when it is missing.
pub fn load_persona_required(config: &Config) -> Result<PersonaRecord> {
    let path = config.artifacts.persona_path();
    load_json::<PersonaRecord>(&path)?.with_context(|| {
        format!(
            "persona artifact not found at {} — run `mimic persona build` first",
            path.display()
        )
    })
}

/// Load the vector index. `None` when no index has been built — retrieval
/// is optional and callers degrade to an empty result set.
pub fn load_index(config: &Config) -> Result<Option<Vec<VectorIndexEntry>>> {
    load_json(&config.artifacts.index_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("turns.json");

        let turns = vec![Turn::new("A", "hello")];
        save_json(&path, &turns).unwrap();

        let loaded: Option<Vec<Turn>> = load_json(&path).unwrap();
        assert_eq!(loaded.unwrap(), turns);
    }

    #[test]
    fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let loaded: Option<Vec<Turn>> = load_json(&tmp.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let loaded: Result<Option<Vec<Turn>>> = load_json(&path);
        assert!(loaded.is_err());
    }
}
