//! Dialogue pair scanning.
//!
//! Shared adjacency rule for the persona synthesizer, the indexer, and the
//! fine-tuning exporter: a candidate is any `(prev, curr)` where `curr` is
//! authored by the target persona and both sides are non-empty and within
//! the caller's length bound.

use crate::models::{DialoguePair, Turn};

/// Length bound used for persona few-shot and fine-tuning pairs.
pub const PERSONA_PAIR_MAX_LEN: usize = 400;
/// Looser bound used when building the vector index.
pub const INDEX_PAIR_MAX_LEN: usize = 600;

/// One qualifying (context → response) exchange, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCandidate {
    pub context_author: String,
    pub context: String,
    pub response: String,
}

impl PairCandidate {
    /// Render into the persisted [`DialoguePair`] shape for the index.
    pub fn into_dialogue_pair(self, target: &str) -> DialoguePair {
        let rendered_text = render_pair(&self.context_author, &self.context, target, &self.response);
        DialoguePair {
            context_text: self.context,
            rendered_text,
        }
    }
}

/// Scan adjacent turns for exchanges answered by `target`. Both sides must
/// be non-empty after trim and no longer than `max_len` characters.
pub fn scan_pairs(turns: &[Turn], target: &str, max_len: usize) -> Vec<PairCandidate> {
    let mut pairs = Vec::new();

    for window in turns.windows(2) {
        let (prev, curr) = (&window[0], &window[1]);
        if curr.author != target {
            continue;
        }
        let context = prev.text.trim();
        let response = curr.text.trim();
        if context.is_empty() || response.is_empty() {
            continue;
        }
        if context.chars().count() > max_len || response.chars().count() > max_len {
            continue;
        }
        pairs.push(PairCandidate {
            context_author: prev.author.clone(),
            context: context.to_string(),
            response: response.to_string(),
        });
    }

    pairs
}

/// Human-readable rendering of one exchange, used verbatim as retrieved
/// context in assembled prompts.
pub fn render_pair(context_author: &str, context: &str, target: &str, response: &str) -> String {
    format!("{}: {}\n{}: {}", context_author, context, target, response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(author: &str, text: &str) -> Turn {
        Turn::new(author, text)
    }

    #[test]
    fn test_adjacent_pairs_found() {
        let turns = vec![
            turn("A", "hi"),
            turn("Target", "hey there"),
            turn("A", "how r u"),
            turn("Target", "good u"),
        ];
        let pairs = scan_pairs(&turns, "Target", PERSONA_PAIR_MAX_LEN);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].context, "hi");
        assert_eq!(pairs[0].response, "hey there");
        assert_eq!(pairs[1].context, "how r u");
    }

    #[test]
    fn test_rendered_pair_shape() {
        let turns = vec![turn("A", "hi"), turn("Target", "hey there")];
        let pair = scan_pairs(&turns, "Target", 400)
            .remove(0)
            .into_dialogue_pair("Target");
        assert_eq!(pair.context_text, "hi");
        assert_eq!(pair.rendered_text, "A: hi\nTarget: hey there");
    }

    #[test]
    fn test_self_replies_count() {
        // Two consecutive target turns: the second responds to the first.
        let turns = vec![turn("Target", "first thought"), turn("Target", "second thought")];
        let pairs = scan_pairs(&turns, "Target", PERSONA_PAIR_MAX_LEN);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].context, "first thought");
    }

    #[test]
    fn test_length_bound_applies_to_both_sides() {
        let long = "y".repeat(500);
        let turns = vec![
            turn("A", &long),
            turn("Target", "short"),
            turn("A", "short"),
            turn("Target", &long),
        ];
        assert!(scan_pairs(&turns, "Target", 400).is_empty());
        assert_eq!(scan_pairs(&turns, "Target", 600).len(), 2);
    }

    #[test]
    fn test_non_target_responses_skipped() {
        let turns = vec![turn("A", "hi"), turn("B", "hello")];
        assert!(scan_pairs(&turns, "Target", 400).is_empty());
    }
}
