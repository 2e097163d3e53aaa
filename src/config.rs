//! Configuration loading and validation.
//!
//! Non-secret settings come from a TOML file; every section and field has a
//! default so an empty file (or no file at all) yields a working setup for
//! the clinic dataset. Secrets are never read from the file: API keys and the
//! Pinecone environment are taken from the process environment (a `.env`
//! file is loaded by the binary before this runs) and stored in
//! [`Secrets`], which components read at construction time.
//!
//! ```toml
//! [data]
//! faq_path = "data/clinic_info.json"
//!
//! [index]
//! provider = "pinecone"       # or "memory"
//! name = "clinic-faqs-index"
//! dimension = 768
//! batch_size = 100
//!
//! [embedding]
//! provider = "gemini"         # or "disabled"
//! model = "text-embedding-004"
//!
//! [retrieval]
//! top_k = 3
//!
//! [server]
//! bind = "0.0.0.0:5000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config/clinic-rag.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Populated from the environment, never from the file.
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_faq_path")]
    pub faq_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            faq_path: default_faq_path(),
        }
    }
}

fn default_faq_path() -> PathBuf {
    PathBuf::from("data/clinic_info.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Vector dimensionality shared by indexed documents and queries.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Maximum number of vectors sent in one upsert call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Override for the Pinecone controller URL
    /// (default `https://controller.<environment>.pinecone.io`).
    #[serde(default)]
    pub controller_url: Option<String>,
    /// Override for the data-plane host. When unset it is taken from
    /// `describe_index`.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: default_index_name(),
            dimension: default_dimension(),
            metric: default_metric(),
            batch_size: default_batch_size(),
            namespace: None,
            controller_url: None,
            host: None,
            timeout_secs: default_timeout_secs(),
            readiness: ReadinessConfig::default(),
        }
    }
}

fn default_index_provider() -> String {
    "pinecone".to_string()
}
fn default_index_name() -> String {
    "clinic-faqs-index".to_string()
}
fn default_dimension() -> usize {
    768
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// Bounded polling used while a freshly created index initialises.
#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl ReadinessConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

fn default_max_attempts() -> u32 {
    30
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: None,
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            base_url: None,
            max_retries: 0,
            timeout_secs: default_generation_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_system_prompt() -> String {
    "You are the front-desk assistant of a medical clinic. Answer the patient's question \
     using only the FAQ excerpts provided. If the excerpts do not cover the question, say so \
     and suggest contacting the clinic directly. Keep the answer short and friendly."
        .to_string()
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
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Lowercase substrings that route a message to the FAQ answer path.
    #[serde(default = "default_faq_keywords")]
    pub faq_keywords: Vec<String>,
    #[serde(default = "default_scheduling_response")]
    pub scheduling_response: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            faq_keywords: default_faq_keywords(),
            scheduling_response: default_scheduling_response(),
        }
    }
}

fn default_faq_keywords() -> Vec<String> {
    vec!["insurance".to_string(), "cancel".to_string()]
}
fn default_scheduling_response() -> String {
    "I see you are asking about scheduling. Please tell me the reason for your visit.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Run the FAQ indexer once before accepting requests.
    #[serde(default)]
    pub index_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            index_on_startup: false,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Credentials read from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub pinecone_api_key: Option<String>,
    pub pinecone_environment: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("pinecone_api_key", &mask(&self.pinecone_api_key))
            .field("pinecone_environment", &self.pinecone_environment)
            .field("gemini_api_key", &mask(&self.gemini_api_key))
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            pinecone_api_key: get("PINECONE_API_KEY"),
            pinecone_environment: get("PINECONE_ENVIRONMENT"),
            gemini_api_key: get("GEMINI_API_KEY"),
        }
    }
}

/// Load and validate a config file, then apply environment secrets and
/// overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    finish(config, |key| std::env::var(key).ok())
}

/// Load `path` if given; otherwise load [`DEFAULT_CONFIG_PATH`] when it
/// exists, or fall back to built-in defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                finish(Config::default(), |key| std::env::var(key).ok())
            }
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn finish(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    apply_env_overrides(&mut config, &lookup)?;
    config.secrets = Secrets::from_lookup(&lookup);
    config.validate()?;
    Ok(config)
}

/// Apply `BACKEND_PORT` to the server bind address.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(raw) = lookup("BACKEND_PORT") {
        let port: u16 = raw
            .trim()
            .parse()
            .with_context(|| format!("BACKEND_PORT must be a port number, got '{}'", raw))?;
        config.server.bind = with_port(&config.server.bind, port);
    }
    Ok(())
}

fn with_port(bind: &str, port: u16) -> String {
    match bind.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", bind, port),
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.index.dimension == 0 {
            bail!("index.dimension must be > 0");
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be > 0");
        }
        if self.index.name.trim().is_empty() {
            bail!("index.name must not be empty");
        }
        if self.index.readiness.max_attempts == 0 {
            bail!("index.readiness.max_attempts must be >= 1");
        }
        let multiplier = self.index.readiness.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            bail!("index.readiness.multiplier must be a finite number >= 1.0");
        }
        for (field, secs) in [
            ("index.timeout_secs", self.index.timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("generation.timeout_secs", self.generation.timeout_secs),
        ] {
            if secs == 0 {
                bail!("{} must be > 0", field);
            }
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }

        match self.index.metric.as_str() {
            "cosine" | "euclidean" | "dotproduct" => {}
            other => bail!(
                "Unknown index metric: '{}'. Must be cosine, euclidean, or dotproduct.",
                other
            ),
        }

        match self.index.provider.as_str() {
            "pinecone" | "memory" => {}
            other => bail!(
                "Unknown index provider: '{}'. Must be pinecone or memory.",
                other
            ),
        }

        match self.embedding.provider.as_str() {
            "gemini" | "disabled" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be gemini or disabled.",
                other
            ),
        }

        match self.generation.provider.as_str() {
            "gemini" | "extractive" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be gemini or extractive.",
                other
            ),
        }

        Ok(())
    }
}
