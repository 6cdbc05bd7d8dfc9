//! Transcript extraction strategies.
//!
//! Converts one raw export document into turns. Extraction is deliberately
//! pluggable: each [`TranscriptExtractor`] is a best-effort strategy for one
//! export flavor, and [`extract_turns`] tries them in order until one yields
//! turns. The only contract with the rest of the pipeline is the [`Turn`]
//! shape — format heuristics never leak past this module.
//!
//! Built-in strategies:
//! - **[`JsonExport`]** — a JSON array (or JSON-lines) of
//!   `{author, text, date?}` objects, with common field aliases.
//! - **[`ChatLog`]** — plain-text messenger exports, both the
//!   `[date] author: text` and `date - author: text` line shapes, with
//!   continuation lines folded into the previous turn.

use serde::Deserialize;

use crate::models::Turn;

/// A best-effort extraction strategy for one export flavor.
pub trait TranscriptExtractor: Send + Sync {
    /// Short strategy name used in diagnostics.
    fn name(&self) -> &str;

    /// Extract turns from one raw export document.
    ///
    /// Returns an empty vector when the document does not match this
    /// strategy's format; never errors. Turns with empty text are allowed
    /// here — the normalizer drops them.
    fn extract(&self, raw: &str) -> Vec<Turn>;
}

/// Run the built-in strategies in order and return the first non-empty result,
/// together with the name of the strategy that produced it.
pub fn extract_turns(raw: &str) -> (Vec<Turn>, String) {
    let strategies: [&dyn TranscriptExtractor; 2] = [&JsonExport, &ChatLog];
    for strategy in strategies {
        let turns = strategy.extract(raw);
        if !turns.is_empty() {
            return (turns, strategy.name().to_string());
        }
    }
    (Vec::new(), "none".to_string())
}

// ============ JSON export ============

/// Loosely-typed turn as it appears in JSON exports.
#[derive(Deserialize)]
struct RawTurn {
    #[serde(alias = "name", alias = "sender", alias = "from")]
    author: Option<String>,
    #[serde(alias = "message", alias = "content", alias = "body")]
    text: Option<String>,
    #[serde(alias = "timestamp", alias = "time")]
    date: Option<String>,
}

impl RawTurn {
    fn into_turn(self) -> Option<Turn> {
        Some(Turn {
            author: self.author?,
            text: self.text?,
            date: self.date.filter(|d| !d.is_empty()),
        })
    }
}

/// Extractor for JSON array and JSON-lines exports.
pub struct JsonExport;

impl TranscriptExtractor for JsonExport {
    fn name(&self) -> &str {
        "json"
    }

    fn extract(&self, raw: &str) -> Vec<Turn> {
        // Whole-document array first.
        if let Ok(raw_turns) = serde_json::from_str::<Vec<RawTurn>>(raw) {
            return raw_turns.into_iter().filter_map(RawTurn::into_turn).collect();
        }

        // Fall back to one JSON object per line.
        let mut turns = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawTurn>(line) {
                Ok(raw_turn) => {
                    if let Some(turn) = raw_turn.into_turn() {
                        turns.push(turn);
                    }
                }
                Err(_) => return Vec::new(), // not a JSON-lines document
            }
        }
        turns
    }
}

// ============ Plain-text chat log ============

/// Extractor for plain-text messenger exports.
pub struct ChatLog;

impl TranscriptExtractor for ChatLog {
    fn name(&self) -> &str {
        "chatlog"
    }

    fn extract(&self, raw: &str) -> Vec<Turn> {
        let mut turns: Vec<Turn> = Vec::new();

        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(turn) = parse_bracketed_line(line).or_else(|| parse_dashed_line(line)) {
                turns.push(turn);
            } else if let Some(last) = turns.last_mut() {
                // Continuation of a multi-line message.
                last.text.push('\n');
                last.text.push_str(line.trim_end());
            }
        }

        turns
    }
}

/// `[date] author: text`
fn parse_bracketed_line(line: &str) -> Option<Turn> {
    let rest = line.strip_prefix('[')?;
    let close = rest.find(']')?;
    let date = rest[..close].trim();
    let after = rest[close + 1..].trim_start();
    let (author, text) = split_author(after)?;
    Some(Turn {
        author: author.to_string(),
        text: text.to_string(),
        date: (!date.is_empty()).then(|| date.to_string()),
    })
}

/// `date - author: text`, where the left side must look like a timestamp.
fn parse_dashed_line(line: &str) -> Option<Turn> {
    let dash = line.find(" - ")?;
    let date = line[..dash].trim();
    if !looks_like_date(date) {
        return None;
    }
    let (author, text) = split_author(line[dash + 3..].trim_start())?;
    Some(Turn {
        author: author.to_string(),
        text: text.to_string(),
        date: Some(date.to_string()),
    })
}

/// Split `author: text`. Rejects author candidates that are suspiciously long
/// (a colon inside message prose, not a speaker label).
fn split_author(s: &str) -> Option<(&str, &str)> {
    let colon = s.find(": ")?;
    let author = s[..colon].trim();
    if author.is_empty() || author.len() > 64 {
        return None;
    }
    Some((author, s[colon + 2..].trim_end()))
}

fn looks_like_date(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '/' | '.' | '-' | ':' | ',' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array_export() {
        let raw = r#"[
            {"author": "Alex", "text": "hi there", "date": "2023-01-05 14:22"},
            {"sender": "Sam", "message": "hello"}
        ]"#;
        let (turns, strategy) = extract_turns(raw);
        assert_eq!(strategy, "json");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].author, "Alex");
        assert_eq!(turns[0].date.as_deref(), Some("2023-01-05 14:22"));
        assert_eq!(turns[1].author, "Sam");
        assert_eq!(turns[1].text, "hello");
        assert!(turns[1].date.is_none());
    }

    #[test]
    fn test_json_lines_export() {
        let raw = "{\"author\": \"Alex\", \"text\": \"one\"}\n{\"author\": \"Sam\", \"text\": \"two\"}\n";
        let (turns, strategy) = extract_turns(raw);
        assert_eq!(strategy, "json");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "two");
    }

    #[test]
    fn test_bracketed_chat_log() {
        let raw = "[2023-01-05, 14:22:11] Alex: first message\n[2023-01-05, 14:23:02] Sam: reply";
        let (turns, strategy) = extract_turns(raw);
        assert_eq!(strategy, "chatlog");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].author, "Alex");
        assert_eq!(turns[0].text, "first message");
        assert_eq!(turns[1].date.as_deref(), Some("2023-01-05, 14:23:02"));
    }

    #[test]
    fn test_dashed_chat_log_with_continuation() {
        let raw = "05/01/2023, 14:22 - Alex: line one\nline two continues\n05/01/2023, 14:25 - Sam: ok";
        let (turns, _) = extract_turns(raw);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "line one\nline two continues");
        assert_eq!(turns[1].author, "Sam");
    }

    #[test]
    fn test_prose_dash_not_mistaken_for_header() {
        let raw = "[2023-01-05, 14:22] Alex: we met at the cafe - the one downtown: it was nice";
        let (turns, _) = extract_turns(raw);
        assert_eq!(turns.len(), 1);
        assert!(turns[0].text.contains("cafe - the one downtown"));
    }

    #[test]
    fn test_unrecognized_document_yields_nothing() {
        let (turns, strategy) = extract_turns("just some prose\nwith no structure at all");
        assert!(turns.is_empty());
        assert_eq!(strategy, "none");
    }
}
