//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$REPLYDRAFT_CONFIG` (environment variable)
//! 2. `~/.config/replydraft/config.toml` (Linux/macOS)
//!    `%APPDATA%\replydraft\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poll::DelayPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mail store location and identity.
    pub mail: MailConfig,
    /// Historical corpus and its vector index.
    pub corpus: CorpusConfig,
    /// Embedding provider.
    pub embedding: EmbeddingConfig,
    /// Context selection.
    pub retrieval: RetrievalConfig,
    /// Generation backend.
    pub generation: GenerationConfig,
    /// Poll loop timing.
    pub poll: PollConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for the index and logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mail store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Maildir root (default: `~/Maildir`).
    pub root: Option<PathBuf>,
    /// Folder scanned for unread mail, relative to the root.
    pub inbox_folder: String,
    /// Folder receiving drafts.
    pub drafts_folder: String,
    /// Address the drafts are sent as.
    pub send_as: String,
    /// Inbound bodies are cut to this many characters.
    pub max_body_chars: usize,
}

/// Corpus file locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// JSON corpus of sent mail (default: `<data_dir>/replydraft/sent_emails.json`).
    pub path: Option<PathBuf>,
    /// Vector index file (default: `<cache_dir>/emails.index`).
    pub index_path: Option<PathBuf>,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "hashing" (local) or "ollama".
    pub provider: String,
    /// Model name for remote providers.
    pub model: String,
    /// Base URL for remote providers.
    pub base_url: String,
    /// Vector dimension. When unset, the provider's default is used: 384 for
    /// "hashing", 768 for "ollama" (`nomic-embed-text`). Set it explicitly
    /// for any other remote model.
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// The configured dimension, or the provider's default.
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(match self.provider.as_str() {
            "ollama" => crate::embedding::ollama::DEFAULT_DIMENSION,
            _ => crate::embedding::hashing::DEFAULT_DIMENSION,
        })
    }
}

/// Context selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// "vector" (nearest neighbours) or "recent" (newest items).
    pub strategy: String,
    /// Number of historical items in the context.
    pub k: usize,
    /// Characters of each historical body shown.
    pub excerpt_chars: usize,
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    /// Model used for replies.
    pub model: String,
    /// When set, `model` is (re)created from this base model at startup.
    pub base_model: Option<String>,
    /// System framing placed at the top of every prompt.
    pub system_prompt: String,
    /// Style instructions placed after the new message.
    pub instructions: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Poll loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds to wait after a completed cycle.
    pub normal_interval_secs: u64,
    /// Seconds to wait after a failed cycle.
    pub error_cooldown_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            root: None,
            inbox_folder: "INBOX".to_string(),
            drafts_folder: "Drafts".to_string(),
            send_as: String::new(),
            max_body_chars: 1000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: "vector".to_string(),
            k: crate::retrieval::DEFAULT_K,
            excerpt_chars: crate::retrieval::DEFAULT_EXCERPT_CHARS,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "email_assistant".to_string(),
            base_model: None,
            system_prompt: crate::generation::prompt::DEFAULT_SYSTEM_PROMPT.to_string(),
            instructions: crate::generation::prompt::DEFAULT_INSTRUCTIONS.to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            normal_interval_secs: 10,
            error_cooldown_secs: 300,
        }
    }
}

impl PollConfig {
    pub fn delay_policy(&self) -> DelayPolicy {
        DelayPolicy {
            normal_interval: Duration::from_secs(self.normal_interval_secs),
            error_cooldown: Duration::from_secs(self.error_cooldown_secs),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("REPLYDRAFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("replydraft").join("config.toml"))
}

/// Return the cache directory for the index and logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("replydraft")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("replydraft.log")
}

/// Return the Maildir root.
pub fn mail_root(config: &Config) -> PathBuf {
    if let Some(ref root) = config.mail.root {
        return root.clone();
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Maildir")
}

/// Return the corpus file path.
pub fn corpus_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.corpus.path {
        return path.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("replydraft")
        .join("sent_emails.json")
}

/// Return the vector index path.
pub fn index_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.corpus.index_path {
        return path.clone();
    }
    cache_dir(config).join("emails.index")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.mail.inbox_folder, "INBOX");
        assert_eq!(cfg.mail.max_body_chars, 1000);
        assert_eq!(cfg.embedding.provider, "hashing");
        assert_eq!(cfg.retrieval.strategy, "vector");
        assert_eq!(cfg.retrieval.k, 5);
        assert_eq!(cfg.retrieval.excerpt_chars, 200);
        assert_eq!(cfg.generation.model, "email_assistant");
        assert_eq!(cfg.poll.delay_policy(), DelayPolicy::default());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.generation.base_model = Some("mistral-nemo".into());
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.generation.base_model.as_deref(), Some("mistral-nemo"));
        assert_eq!(parsed.embedding.dimension(), cfg.embedding.dimension());
        assert_eq!(parsed.generation.system_prompt, cfg.generation.system_prompt);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[mail]
send_as = "support@example.net"

[poll]
normal_interval_secs = 30
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.mail.send_as, "support@example.net");
        assert_eq!(cfg.mail.drafts_folder, "Drafts");
        assert_eq!(cfg.poll.normal_interval_secs, 30);
        assert_eq!(cfg.poll.error_cooldown_secs, 300);
        assert_eq!(cfg.generation.timeout_secs, 300);
    }

    #[test]
    fn test_embedding_dimension_follows_provider() {
        let cfg: Config = toml::from_str("[embedding]\nprovider = \"ollama\"\n").expect("parse");
        assert_eq!(cfg.embedding.dimension(), 768);
        assert_eq!(Config::default().embedding.dimension(), 384);

        let cfg: Config = toml::from_str("[embedding]\nprovider = \"ollama\"\ndimension = 1024\n")
            .expect("parse");
        assert_eq!(cfg.embedding.dimension(), 1024);
    }

    #[test]
    fn test_explicit_paths_win() {
        let cfg: Config = toml::from_str(
            r#"
[general]
cache_dir = "/tmp/rd"

[corpus]
path = "/data/sent.json"
"#,
        )
        .expect("parse");
        assert_eq!(corpus_path(&cfg), PathBuf::from("/data/sent.json"));
        assert_eq!(index_path(&cfg), PathBuf::from("/tmp/rd/emails.index"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/rd/replydraft.log"));
    }
}
