//! Context assembly and reply post-processing.
//!
//! Deterministically builds the ordered message list handed to the
//! generation service from the persona record, retrieved context, the
//! bounded conversation history, and the new message. Inclusion rules are
//! mode-dependent: a configured fine-tuned model is assumed to have
//! internalized the persona's style, so few-shot examples and retrieved
//! context are suppressed and only the format instructions remain.
//!
//! Post-processing of the generated reply also lives here and is applied
//! uniformly regardless of mode.

use crate::models::{ChatMessage, PersonaRecord};
use crate::persona::strip_time_author_prefix;

/// Few-shot pairs included when no retrieved context is present.
const FEW_SHOT_BUDGET: usize = 12;
/// Smaller few-shot budget when retrieved context already fills the prompt.
const FEW_SHOT_BUDGET_WITH_RAG: usize = 6;
/// Most recent history turns included, regardless of the store's cap.
const HISTORY_WINDOW: usize = 12;

/// Reply returned when post-processing leaves nothing.
pub const EMPTY_REPLY_FALLBACK: &str = "…";

/// Export placeholder phrases scrubbed from generated replies.
const PLACEHOLDER_PHRASES: &[&str] = &[
    "message not included",
    "<media omitted>",
    "media omitted",
    "image omitted",
    "audio omitted",
];

/// Operating mode, a pure function of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Style comes from few-shot examples and retrieved context.
    Base,
    /// A fine-tuned model carries the style; examples are suppressed.
    FineTuned,
}

impl Mode {
    pub fn from_fine_tuned(fine_tuned_model: Option<&str>) -> Self {
        if fine_tuned_model.is_some() {
            Mode::FineTuned
        } else {
            Mode::Base
        }
    }
}

/// Build the ordered message list for one incoming message.
///
/// Layout: one system entry; then (base mode only) bounded few-shot turns;
/// then the most recent `min(|history|, 12)` turns chronologically; then the
/// new user message last.
pub fn build_messages(
    persona: &PersonaRecord,
    history: &[ChatMessage],
    retrieved: &[String],
    user_text: &str,
    mode: Mode,
) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    messages.push(ChatMessage::system(system_content(persona, retrieved, mode)));

    if mode == Mode::Base {
        let budget = if retrieved.is_empty() {
            FEW_SHOT_BUDGET
        } else {
            FEW_SHOT_BUDGET_WITH_RAG
        };
        for pair in persona.few_shot_pairs.iter().take(budget) {
            messages.push(ChatMessage::user(&pair.user));
            messages.push(ChatMessage::assistant(&pair.assistant));
        }
    }

    let window_start = history.len().saturating_sub(HISTORY_WINDOW);
    messages.extend(history[window_start..].iter().cloned());

    messages.push(ChatMessage::user(user_text));
    messages
}

fn system_content(persona: &PersonaRecord, retrieved: &[String], mode: Mode) -> String {
    let mut content = persona.system_prompt.clone();

    match mode {
        Mode::FineTuned => {
            content.push_str(
                "\n\nAnswer with a single chat message, nothing else. \
                 Your style is already tuned; do not imitate example formats.",
            );
        }
        Mode::Base => {
            content.push_str(
                "\n\nAnswer with a single chat message, nothing else. \
                 Match the style shown in the examples.",
            );
            if !retrieved.is_empty() {
                content.push_str(
                    "\n\nRelevant past exchanges (for tone and facts, do not quote verbatim):\n",
                );
                for rendered in retrieved {
                    content.push_str("---\n");
                    content.push_str(rendered);
                    content.push('\n');
                }
            }
        }
    }

    content
}

/// Render the incoming transport message, folding an optional quoted message
/// into the text so the model sees what is being replied to.
pub fn render_incoming(text: &str, quoted_text: Option<&str>) -> String {
    match quoted_text.map(str::trim).filter(|q| !q.is_empty()) {
        Some(quoted) => format!("[replying to: \"{}\"] {}", quoted, text),
        None => text.to_string(),
    }
}

/// Post-process a generated reply.
///
/// Strips leading `"HH:MM author"` artifacts the model sometimes imitates
/// from the transcript, scrubs export placeholder phrases, collapses
/// whitespace runs, and guarantees a non-empty result.
pub fn clean_reply(raw: &str, author: &str) -> String {
    // The artifact can stack ("14:22 Alex 14:23 Alex hi"); strip until fixed.
    let mut text = raw.trim().to_string();
    loop {
        let stripped = strip_time_author_prefix(&text, author);
        if stripped == text {
            break;
        }
        text = stripped.trim_start().to_string();
    }

    let text = scrub_placeholders(&text);
    let text = collapse_whitespace(&text);

    if text.is_empty() {
        EMPTY_REPLY_FALLBACK.to_string()
    } else {
        text
    }
}

/// Replace known export placeholder phrases with a line break,
/// case-insensitively.
fn scrub_placeholders(text: &str) -> String {
    let mut result = text.to_string();
    for phrase in PLACEHOLDER_PHRASES {
        while let Some(pos) = find_ascii_ci(&result, phrase) {
            result.replace_range(pos..pos + phrase.len(), "\n");
        }
    }
    result
}

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`.
///
/// Matches directly against the original bytes so the offset is always a
/// char boundary of `haystack`; indices from a `to_lowercase()` copy are not
/// transferable (lowercasing can change byte lengths). The phrases searched
/// for are ASCII, so a matched range contains only ASCII bytes and both ends
/// land on boundaries.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || n.len() > h.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Collapse runs of spaces/tabs to one space, trim each line, and drop
/// blank lines.
fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FewShotPair, PersonaMeta, Role};

    fn persona_with_pairs(n: usize) -> PersonaRecord {
        PersonaRecord {
            person_name: "Alex".to_string(),
            system_prompt: "You are Alex.".to_string(),
            few_shot_pairs: (0..n)
                .map(|i| FewShotPair {
                    user: format!("q{}", i),
                    assistant: format!("a{}", i),
                })
                .collect(),
            style_samples: vec!["sample".to_string()],
            meta: PersonaMeta::default(),
        }
    }

    #[test]
    fn test_fine_tuned_mode_suppresses_examples_and_retrieval() {
        let persona = persona_with_pairs(20);
        let retrieved = vec!["A: hi\nAlex: hey".to_string()];
        let messages = build_messages(&persona, &[], &retrieved, "hello", Mode::FineTuned);

        // System + the new user message, nothing else.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(!messages[0].content.contains("Relevant past exchanges"));
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn test_base_mode_full_few_shot_budget_without_rag() {
        let persona = persona_with_pairs(20);
        let messages = build_messages(&persona, &[], &[], "hello", Mode::Base);

        // 12 pairs = 24 example turns, plus system and final user message.
        assert_eq!(messages.len(), 1 + 24 + 1);
        assert_eq!(messages[1].content, "q0");
        assert_eq!(messages[2].content, "a0");
    }

    #[test]
    fn test_base_mode_smaller_budget_with_rag() {
        let persona = persona_with_pairs(20);
        let retrieved = vec!["A: old\nAlex: reply".to_string()];
        let messages = build_messages(&persona, &[], &retrieved, "hello", Mode::Base);

        assert_eq!(messages.len(), 1 + 12 + 1); // 6 pairs only
        assert!(messages[0].content.contains("Relevant past exchanges"));
        assert!(messages[0].content.contains("A: old"));
    }

    #[test]
    fn test_history_window_bounded_and_chronological() {
        let persona = persona_with_pairs(0);
        let history: Vec<ChatMessage> = (0..30)
            .map(|i| ChatMessage::user(format!("h{}", i)))
            .collect();
        let messages = build_messages(&persona, &history, &[], "new", Mode::Base);

        let history_part: Vec<&str> = messages[1..messages.len() - 1]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(history_part.len(), 12);
        assert_eq!(history_part.first(), Some(&"h18"));
        assert_eq!(history_part.last(), Some(&"h29"));
    }

    #[test]
    fn test_new_message_is_last() {
        let persona = persona_with_pairs(3);
        let history = vec![ChatMessage::assistant("earlier")];
        let messages = build_messages(&persona, &history, &[], "the new one", Mode::Base);
        assert_eq!(messages.last().unwrap().content, "the new one");
        assert_eq!(messages.last().unwrap().role, Role::User);
    }

    #[test]
    fn test_render_incoming_with_quote() {
        assert_eq!(
            render_incoming("sounds good", Some("dinner at 8?")),
            "[replying to: \"dinner at 8?\"] sounds good"
        );
        assert_eq!(render_incoming("plain", None), "plain");
        assert_eq!(render_incoming("plain", Some("  ")), "plain");
    }

    #[test]
    fn test_clean_reply_strips_time_author_artifact() {
        assert_eq!(clean_reply("14:22 Alex hey, what's up", "Alex"), "hey, what's up");
        // Stacked artifacts strip fully.
        assert_eq!(clean_reply("14:22 Alex 14:23 Alex hi", "Alex"), "hi");
    }

    #[test]
    fn test_clean_reply_scrubs_placeholders() {
        let cleaned = clean_reply("sure <Media omitted> see you then", "Alex");
        assert_eq!(cleaned, "sure\nsee you then");
    }

    #[test]
    fn test_clean_reply_scrubs_after_multibyte_text() {
        // Characters whose lowercase form has a different byte length must
        // not derail the phrase offsets.
        assert_eq!(clean_reply("ẞmessage not included", "Alex"), "ẞ");
        assert_eq!(
            clean_reply("sure 😀 Media Omitted done", "Alex"),
            "sure 😀\ndone"
        );
    }

    #[test]
    fn test_clean_reply_collapses_whitespace() {
        assert_eq!(clean_reply("a    lot\t of   space", "Alex"), "a lot of space");
        assert_eq!(clean_reply("one\n\n\n\ntwo", "Alex"), "one\ntwo");
    }

    #[test]
    fn test_clean_reply_empty_falls_back() {
        assert_eq!(clean_reply("", "Alex"), EMPTY_REPLY_FALLBACK);
        assert_eq!(clean_reply("   \n  ", "Alex"), EMPTY_REPLY_FALLBACK);
        assert_eq!(clean_reply("Media omitted", "Alex"), EMPTY_REPLY_FALLBACK);
    }
}
