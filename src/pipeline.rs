//! Online reply pipeline.
//!
//! Wires retrieval, context assembly, generation, and history into one
//! `handle_message` path shared by the HTTP server and the one-shot CLI
//! command. Artifacts are loaded once at startup and held as immutable
//! snapshots for the process lifetime; rebuilding the persona or index means
//! restarting the server.

use std::sync::Arc;

use anyhow::Result;

use crate::artifacts;
use crate::assemble::{self, Mode};
use crate::config::Config;
use crate::generation::{OpenAiGenerator, ReplyGenerator};
use crate::history::HistoryStore;
use crate::models::{PersonaRecord, VectorIndexEntry};
use crate::retrieval;

/// Reply sent to the end user when the pipeline itself fails. Operators get
/// the real error on stderr.
pub const FAILURE_REPLY: &str = "sorry, something glitched on my end — say that again?";

/// Everything a running replier needs, loaded once.
pub struct ServingContext {
    pub config: Config,
    pub persona: PersonaRecord,
    /// `None` when no index artifact exists; retrieval then degrades to
    /// empty context instead of failing requests.
    pub index: Option<Vec<VectorIndexEntry>>,
    pub history: HistoryStore,
    pub mode: Mode,
    generator: Box<dyn ReplyGenerator>,
}

impl ServingContext {
    /// Load artifacts and build the live generator. Fatal without a persona;
    /// a missing or unreadable index only logs a warning.
    pub fn load(config: Config) -> Result<Arc<Self>> {
        let persona = artifacts::load_persona_required(&config)?;

        let index = match artifacts::load_index(&config) {
            Ok(index) => index,
            Err(err) => {
                eprintln!("warning: index artifact unreadable, serving without retrieval: {:#}", err);
                None
            }
        };

        let mode = Mode::from_fine_tuned(config.generation.fine_tuned_model.as_deref());
        let generator = Box::new(OpenAiGenerator::new(&config.generation)?);
        let history = HistoryStore::new(config.history.max_turns);

        Ok(Arc::new(Self {
            config,
            persona,
            index,
            history,
            mode,
            generator,
        }))
    }

    /// Same context with a caller-supplied generator. Test seam.
    #[cfg(test)]
    pub fn with_generator(
        config: Config,
        persona: PersonaRecord,
        index: Option<Vec<VectorIndexEntry>>,
        generator: Box<dyn ReplyGenerator>,
    ) -> Arc<Self> {
        let mode = Mode::from_fine_tuned(config.generation.fine_tuned_model.as_deref());
        let history = HistoryStore::new(config.history.max_turns);
        Arc::new(Self {
            config,
            persona,
            index,
            history,
            mode,
            generator,
        })
    }

    /// Produce one reply for an incoming message.
    ///
    /// Retrieval failures downgrade to empty context with a warning;
    /// generation failures yield [`FAILURE_REPLY`] and are logged. Either
    /// way the caller gets a reply string, and successful exchanges are
    /// recorded in the history store.
    pub async fn handle_message(
        &self,
        conversation_key: &str,
        text: &str,
        quoted_text: Option<&str>,
    ) -> String {
        let incoming = assemble::render_incoming(text, quoted_text);

        let retrieved = if self.mode == Mode::Base {
            match retrieval::retrieve(
                &self.config,
                self.index.as_deref(),
                &incoming,
                self.config.retrieval.top_k,
            )
            .await
            {
                Ok(results) => results,
                Err(err) => {
                    eprintln!("warning: retrieval failed, continuing without context: {:#}", err);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let history = self.history.snapshot(conversation_key).await;
        let messages =
            assemble::build_messages(&self.persona, &history, &retrieved, &incoming, self.mode);

        let raw = match self.generator.generate(&messages).await {
            Ok(raw) => raw,
            Err(err) => {
                eprintln!("error: generation failed for key '{}': {:#}", conversation_key, err);
                return FAILURE_REPLY.to_string();
            }
        };

        let reply = assemble::clean_reply(&raw, &self.persona.person_name);
        self.history
            .push_exchange(conversation_key, &incoming, &reply)
            .await;
        reply
    }
}

/// `mimic reply` — one-shot reply from the command line.
pub async fn run_reply(
    config: Config,
    text: &str,
    key: Option<&str>,
    quoted: Option<&str>,
) -> Result<()> {
    let ctx = ServingContext::load(config)?;
    let reply = ctx
        .handle_message(key.unwrap_or("cli"), text, quoted)
        .await;
    println!("{}", reply);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, PersonaMeta, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn test_config(toml_extra: &str) -> Config {
        toml::from_str(&format!(
            r#"
[artifacts]
dir = "./data"

[persona]
person = "Alex"
{}
"#,
            toml_extra
        ))
        .unwrap()
    }

    fn test_persona() -> PersonaRecord {
        PersonaRecord {
            person_name: "Alex".to_string(),
            system_prompt: "You are Alex.".to_string(),
            few_shot_pairs: Vec::new(),
            style_samples: Vec::new(),
            meta: PersonaMeta::default(),
        }
    }

    /// Returns a canned reply and records what it was asked.
    struct CannedGenerator {
        reply: Result<String, String>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl CannedGenerator {
        fn ok(reply: &str) -> Box<Self> {
            Box::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Box<Self> {
            Box::new(Self {
                reply: Err("service down".to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReplyGenerator for CannedGenerator {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.reply.clone().map_err(anyhow::Error::msg)
        }
    }

    #[tokio::test]
    async fn test_reply_is_cleaned_and_recorded() {
        let ctx = ServingContext::with_generator(
            test_config(""),
            test_persona(),
            None,
            CannedGenerator::ok("14:22 Alex   hey    there"),
        );

        let reply = ctx.handle_message("chat1", "hi", None).await;
        assert_eq!(reply, "hey there");

        let history = ctx.history.snapshot("chat1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "hey there");
    }

    #[tokio::test]
    async fn test_generation_failure_yields_fallback_and_no_history() {
        let ctx = ServingContext::with_generator(
            test_config(""),
            test_persona(),
            None,
            CannedGenerator::failing(),
        );

        let reply = ctx.handle_message("chat1", "hi", None).await;
        assert_eq!(reply, FAILURE_REPLY);
        assert!(ctx.history.snapshot("chat1").await.is_empty());
    }

    #[tokio::test]
    async fn test_quoted_text_folds_into_prompt() {
        let generator = CannedGenerator::ok("sure");
        let ctx = ServingContext::with_generator(
            test_config(""),
            test_persona(),
            None,
            generator,
        );

        let _ = ctx.handle_message("c", "yes", Some("dinner at 8?")).await;
        let history = ctx.history.snapshot("c").await;
        assert_eq!(history[0].content, "[replying to: \"dinner at 8?\"] yes");
    }

    #[tokio::test]
    async fn test_fine_tuned_mode_skips_retrieval() {
        // An index with garbage embeddings would fail retrieval if touched;
        // fine-tuned mode never touches it.
        let config = test_config("[generation]\nfine_tuned_model = \"ft:x\"");
        let ctx = ServingContext::with_generator(
            config,
            test_persona(),
            Some(vec![]),
            CannedGenerator::ok("yo"),
        );
        assert_eq!(ctx.mode, Mode::FineTuned);

        let reply = ctx.handle_message("c", "hi", None).await;
        assert_eq!(reply, "yo");
    }
}
