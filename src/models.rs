//! Core data models used throughout the pipeline.
//!
//! These types represent the turns, persona records, dialogue pairs, and
//! chat messages that flow through the offline build steps and the online
//! serving path. Persisted artifacts serialize as plain JSON documents.

use serde::{Deserialize, Serialize};

/// One utterance by one author, with an optional export timestamp.
///
/// Produced by the normalizer; immutable once written to the turns artifact.
/// `text` is non-empty after whitespace normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub author: String,
    pub text: String,
    /// Timestamp as it appeared in the export. Compared lexically when
    /// present on every turn; never parsed into a real date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Turn {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            date: None,
        }
    }
}

/// A (prompt, response) example demonstrating the persona's style.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FewShotPair {
    pub user: String,
    pub assistant: String,
}

/// Counters recorded at synthesis time, shown by `mimic persona show`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaMeta {
    pub message_count: usize,
    pub person_message_count: usize,
}

/// The synthesized style profile for one transcript participant.
///
/// Written once by `mimic persona build` and consumed read-only by the
/// context assembler. Regenerated only by re-running synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRecord {
    pub person_name: String,
    pub system_prompt: String,
    pub few_shot_pairs: Vec<FewShotPair>,
    pub style_samples: Vec<String>,
    #[serde(default)]
    pub meta: PersonaMeta,
}

/// A (context → response) pair derived from adjacent transcript turns.
///
/// `context_text` is the triggering turn's text and is the side that gets
/// embedded; `rendered_text` is the human-readable rendering injected
/// verbatim as retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialoguePair {
    pub context_text: String,
    pub rendered_text: String,
}

/// One persisted entry of the vector index.
///
/// All entries of one index share the dimensionality fixed by the embedding
/// service; entries of mismatched length score zero similarity and are never
/// compared element-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexEntry {
    pub embedding: Vec<f32>,
    pub rendered_text: String,
}

/// Message role on the generation service wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the ordered message list handed to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
