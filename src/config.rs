use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Hard cap on few-shot pairs kept in a persona record.
pub const MAX_PAIRS_CAP: usize = 60;
/// Hard cap on style exemplar sentences kept in a persona record.
pub const MAX_STYLE_SAMPLES_CAP: usize = 80;
/// Hard cap on retrieved pairs per query.
pub const TOP_K_CAP: usize = 20;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub artifacts: ArtifactsConfig,
    pub persona: PersonaConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    /// Directory holding the persisted JSON artifacts.
    pub dir: PathBuf,
}

impl ArtifactsConfig {
    pub fn turns_path(&self) -> PathBuf {
        self.dir.join("turns.json")
    }

    pub fn persona_path(&self) -> PathBuf {
        self.dir.join("persona.json")
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersonaConfig {
    /// Transcript author the persona is synthesized for.
    pub person: String,
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,
    #[serde(default = "default_max_style_samples")]
    pub max_style_samples: usize,
    #[serde(default = "default_min_sample_len")]
    pub min_sample_len: usize,
    #[serde(default = "default_max_sample_len")]
    pub max_sample_len: usize,
    /// Free-text personality traits appended to the system prompt.
    #[serde(default)]
    pub traits: Option<String>,
    /// Free-text biography appended to the system prompt.
    #[serde(default)]
    pub bio: Option<String>,
}

fn default_max_pairs() -> usize {
    40
}
fn default_max_style_samples() -> usize {
    50
}
fn default_min_sample_len() -> usize {
    10
}
fn default_max_sample_len() -> usize {
    180
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    100
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Identifier of a fine-tuned model. When set, the assembler runs in
    /// fine-tuned mode: few-shot examples and retrieved context are
    /// suppressed and this model serves the request.
    #[serde(default)]
    pub fine_tuned_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            fine_tuned_model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    /// Model identifier actually sent to the generation service.
    pub fn effective_model(&self) -> &str {
        self.fine_tuned_model.as_deref().unwrap_or(&self.model)
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    300
}
fn default_temperature() -> f64 {
    0.8
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Rolling window cap per conversation key. Oldest turns evicted first.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.persona.person.trim().is_empty() {
        anyhow::bail!("persona.person must not be empty");
    }

    if config.persona.max_pairs == 0 || config.persona.max_pairs > MAX_PAIRS_CAP {
        anyhow::bail!("persona.max_pairs must be in 1..={}", MAX_PAIRS_CAP);
    }

    if config.persona.max_style_samples == 0
        || config.persona.max_style_samples > MAX_STYLE_SAMPLES_CAP
    {
        anyhow::bail!(
            "persona.max_style_samples must be in 1..={}",
            MAX_STYLE_SAMPLES_CAP
        );
    }

    if config.persona.min_sample_len > config.persona.max_sample_len {
        anyhow::bail!("persona.min_sample_len must be <= persona.max_sample_len");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.retrieval.top_k == 0 || config.retrieval.top_k > TOP_K_CAP {
        anyhow::bail!("retrieval.top_k must be in 1..={}", TOP_K_CAP);
    }

    if config.history.max_turns == 0 {
        anyhow::bail!("history.max_turns must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[artifacts]
dir = "./data"

[persona]
person = "Alex"
"#
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.persona.max_pairs, 40);
        assert_eq!(config.persona.max_style_samples, 50);
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.retrieval.top_k, 12);
        assert_eq!(config.history.max_turns, 20);
        assert!(config.generation.fine_tuned_model.is_none());
    }

    #[test]
    fn test_max_pairs_cap_enforced() {
        let toml_str = r#"
[artifacts]
dir = "./data"

[persona]
person = "Alex"
max_pairs = 61
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_top_k_cap_enforced() {
        let toml_str = r#"
[artifacts]
dir = "./data"

[persona]
person = "Alex"

[retrieval]
top_k = 21
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_effective_model_prefers_fine_tuned() {
        let generation = GenerationConfig {
            fine_tuned_model: Some("ft:gpt-4o-mini:abc".to_string()),
            ..GenerationConfig::default()
        };
        assert_eq!(generation.effective_model(), "ft:gpt-4o-mini:abc");

        let base = GenerationConfig::default();
        assert_eq!(base.effective_model(), "gpt-4o-mini");
    }
}
