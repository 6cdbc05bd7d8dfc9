//! # Mimic
//!
//! A persona-and-retrieval pipeline: learn one participant's speaking style
//! from an exported chat transcript and answer new messages in that style
//! through a hosted generation model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌───────────────┐
//! │ Chat exports │──▶│ ingest + normalize │──▶│  turns.json    │
//! └──────────────┘   └────────────────────┘   └──────┬────────┘
//!                                                    │
//!                          ┌─────────────────────────┤
//!                          ▼                         ▼
//!                   ┌────────────┐            ┌────────────┐
//!                   │  persona   │            │   index    │
//!                   │ build      │            │ build      │
//!                   └─────┬──────┘            └─────┬──────┘
//!                         ▼                        ▼
//!                   persona.json              index.json
//!                         │                        │
//!                         └───────────┬────────────┘
//!                                     ▼
//!                        retrieve + assemble + generate
//!                              (serve / reply)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mimic ingest exports/chat1.txt exports/chat2.json
//! mimic persona build
//! mimic index build              # needs OPENAI_API_KEY
//! mimic reply "are we still on for tonight?"
//! mimic serve                    # HTTP reply server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Raw export → turns extraction strategies |
//! | [`normalize`] | Merge, dedup, and order turn sources |
//! | [`persona`] | Persona synthesis (style, few-shot pairs, exemplars) |
//! | [`index`] | Dialogue pair embedding index |
//! | [`retrieval`] | Cosine top-k retrieval over the index |
//! | [`assemble`] | Deterministic prompt assembly and reply cleanup |
//! | [`generation`] | Chat completions client |
//! | [`pipeline`] | Online reply path |
//! | [`serve`] | HTTP reply server |
//! | [`export`] | Fine-tuning corpus export |

pub mod artifacts;
pub mod assemble;
pub mod config;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod generation;
pub mod history;
pub mod index;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod pairs;
pub mod persona;
pub mod pipeline;
pub mod progress;
pub mod retrieval;
pub mod serve;
