//! # Mimic CLI (`mimic`)
//!
//! The `mimic` binary drives the whole pipeline: transcript ingestion,
//! persona synthesis, index building, retrieval checks, one-shot replies,
//! corpus export, and the HTTP reply server.
//!
//! ## Usage
//!
//! ```bash
//! mimic --config ./config/mimic.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mimic ingest <files...>` | Extract and normalize chat exports into the turns artifact |
//! | `mimic persona build` | Synthesize the persona record from the turns |
//! | `mimic persona show` | Print a summary of the persisted persona |
//! | `mimic index build` | Embed dialogue pairs and persist the vector index |
//! | `mimic index stats` | Print a summary of the persisted index |
//! | `mimic retrieve "<query>"` | Rank indexed pairs against a query |
//! | `mimic reply "<text>"` | Produce one reply from the command line |
//! | `mimic export finetune` | Write the fine-tuning corpus as JSONL |
//! | `mimic serve` | Start the HTTP reply server |

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use mimic::config;
use mimic::progress::ProgressMode;
use mimic::{export, index, ingest, persona, pipeline, retrieval, serve};

/// Mimic CLI — learn a speaking persona from chat exports and reply in it.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mimic.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mimic",
    about = "Mimic — persona synthesis and retrieval-augmented replies from chat exports",
    version,
    long_about = "Mimic ingests exported chat transcripts, learns a speaking persona for one \
    participant (style signals, few-shot examples, style exemplars), indexes historical dialogue \
    pairs for semantic retrieval, and assembles retrieval-augmented prompts so a hosted \
    generation model answers new messages in that participant's style."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/mimic.toml`. Persona, embedding, generation,
    /// retrieval, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/mimic.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Extract and normalize chat exports into the turns artifact.
    ///
    /// Each file is run through the extraction strategies (JSON export,
    /// plain chat log) in turn; the resulting turn sequences are merged,
    /// deduplicated, and persisted as `turns.json`. File order fixes the
    /// merged order when turns carry no dates.
    Ingest {
        /// Paths to raw chat export files, in merge order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Build or inspect the persona record.
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },

    /// Build or inspect the dialogue pair index.
    ///
    /// Requires `OPENAI_API_KEY` for the build; every qualifying
    /// (context, response) pair's context side is embedded.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Rank indexed dialogue pairs against a query.
    ///
    /// Embeds the query and prints the top matches by cosine similarity.
    /// Useful for checking what the reply pipeline would retrieve.
    Retrieve {
        /// The query text.
        query: String,

        /// Number of results to return (capped at 20).
        #[arg(long, short)]
        k: Option<usize>,
    },

    /// Produce one reply from the command line.
    ///
    /// Runs the full online pipeline: retrieval, prompt assembly,
    /// generation, and reply cleanup. Requires the persona artifact and
    /// `OPENAI_API_KEY`.
    Reply {
        /// The incoming message text.
        text: String,

        /// Conversation key scoping the rolling history. One-shot calls
        /// share no state, so this mostly matters for scripted sessions.
        #[arg(long)]
        key: Option<String>,

        /// Message being replied to, when there is one.
        #[arg(long)]
        quoted: Option<String>,
    },

    /// Export derived artifacts.
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },

    /// Start the HTTP reply server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `POST /reply` and `GET /health`.
    Serve,
}

/// Persona subcommands.
#[derive(Subcommand)]
enum PersonaAction {
    /// Synthesize the persona record from the turns artifact.
    ///
    /// Computes style signals, selects few-shot example pairs and style
    /// exemplars by stratified sampling, assembles the system prompt, and
    /// persists everything as `persona.json`.
    Build {
        /// Override `[persona].person` for this build.
        #[arg(long)]
        person: Option<String>,

        /// Free-text personality traits folded into the system prompt.
        #[arg(long)]
        traits: Option<String>,

        /// Free-text biography folded into the system prompt.
        #[arg(long)]
        bio: Option<String>,
    },

    /// Print a summary of the persisted persona record.
    Show,
}

/// Index subcommands.
#[derive(Subcommand)]
enum IndexAction {
    /// Embed all dialogue pairs and persist the vector index.
    ///
    /// Replaces any existing index wholesale; there is no incremental
    /// update.
    Build {
        /// Override the batch size from config (number of texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Progress reporting on stderr.
        #[arg(long, value_enum, default_value_t = ProgressArg::Auto)]
        progress: ProgressArg,
    },

    /// Print a summary of the persisted index.
    Stats,
}

/// Export subcommands.
#[derive(Subcommand)]
enum ExportAction {
    /// Write the fine-tuning corpus as JSONL.
    ///
    /// One `{"messages": [system, user, assistant]}` line per qualifying
    /// dialogue pair. Refuses to write fewer than 10 examples.
    Finetune {
        /// Output file path. Writes to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Progress reporting choices for long-running builds.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    /// Human progress when stderr is a TTY, otherwise off.
    Auto,
    /// Human-readable progress lines on stderr.
    Human,
    /// One JSON object per progress event on stderr.
    Json,
    /// No progress output.
    Off,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { files } => {
            ingest::run_ingest(&cfg, &files)?;
        }
        Commands::Persona { action } => match action {
            PersonaAction::Build { person, traits, bio } => {
                persona::run_persona_build(&cfg, person, traits, bio)?;
            }
            PersonaAction::Show => {
                persona::run_persona_show(&cfg)?;
            }
        },
        Commands::Index { action } => match action {
            IndexAction::Build {
                batch_size,
                progress,
            } => {
                let reporter = progress.mode().reporter();
                index::run_index_build(&cfg, batch_size, reporter.as_ref()).await?;
            }
            IndexAction::Stats => {
                index::run_index_stats(&cfg)?;
            }
        },
        Commands::Retrieve { query, k } => {
            retrieval::run_retrieve(&cfg, &query, k).await?;
        }
        Commands::Reply { text, key, quoted } => {
            pipeline::run_reply(cfg, &text, key.as_deref(), quoted.as_deref()).await?;
        }
        Commands::Export { action } => match action {
            ExportAction::Finetune { output } => {
                export::run_export_finetune(&cfg, output.as_deref())?;
            }
        },
        Commands::Serve => {
            serve::run_server(&cfg).await?;
        }
    }

    Ok(())
}
