//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys joined with `__`, e.g. `APP_GENERATOR__REMOTE__API_KEY`).
//! [`Settings`] is the typed view every crate is constructed from.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name };
        config.validate_for_env(&config.settings_unchecked()?)?;
        Ok(config)
    }

    /// Load a single TOML file plus `APP_*` overrides, skipping env-specific files.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidConfig(format!("config file {} does not exist", path.display())));
        }
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment, env_name: env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()) })
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)), env_name: "test".to_string() }
    }

    /// Apply a typed override on top of every other layer (CLI flags).
    pub fn with_override<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.figment = self.figment.merge(Serialized::default(key, value));
        self
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings = self.settings_unchecked()?;
        settings.validate()?;
        self.validate_for_env(&settings)?;
        Ok(settings)
    }

    fn settings_unchecked(&self) -> Result<Settings> {
        self.figment
            .extract::<Settings>()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    fn validate_for_env(&self, settings: &Settings) -> Result<()> {
        match self.env_name.as_str() {
            "prod" | "production" => {
                if settings.embedder.kind == EmbedderKind::Hash {
                    return Err(Error::InvalidConfig(
                        "embedder.kind = \"hash\" is a development stand-in and is not allowed in production".into(),
                    ));
                }
            }
            "dev" | "development" => {}
            "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: String,
    pub embedder: EmbedderSettings,
    pub generator: GeneratorSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            embedder: EmbedderSettings::default(),
            generator: GeneratorSettings::default(),
            retrieval: RetrievalSettings::default(),
            chunking: ChunkingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Bert,
    Remote,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderSettings {
    pub kind: EmbedderKind,
    /// Used by `hash` and `remote`; `bert` reads it from the model config.
    pub dim: usize,
    pub max_len: usize,
    pub model_dir: Option<String>,
    pub remote: RemoteSettings,
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Hash,
            dim: 384,
            max_len: 256,
            model_dir: None,
            remote: RemoteSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub kind: GeneratorKind,
    pub remote: RemoteSettings,
    pub local: LocalGeneratorSettings,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::Remote,
            remote: RemoteSettings::default(),
            local: LocalGeneratorSettings::default(),
        }
    }
}

/// Connection settings for an OpenAI-compatible HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Retries with exponential backoff. Zero disables retrying.
    pub max_retries: u32,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            api_key: None,
            temperature: 0.3,
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalGeneratorSettings {
    pub model_dir: Option<String>,
    pub max_input_len: usize,
    pub num_beams: usize,
    pub top_k: usize,
    pub top_p: f32,
    pub no_repeat_ngram_size: usize,
    pub max_length: usize,
    pub seed: Option<u64>,
}

impl Default for LocalGeneratorSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            max_input_len: 512,
            num_beams: 4,
            top_k: 50,
            top_p: 0.95,
            no_repeat_ngram_size: 3,
            max_length: 128,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub preview_chars: usize,
    pub preview_suffix: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, preview_chars: 200, preview_suffix: "...".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 10_000, chunk_overlap: 1_000 }
    }
}

impl Settings {
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    /// Range checks only. Required endpoints and model directories are
    /// checked by the factories that need them, so commands that never
    /// build a generator run without generator settings.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.retrieval.top_k == 0 {
            return bad("retrieval.top_k must be >= 1");
        }
        if self.chunking.chunk_size == 0 || self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return bad("chunking.chunk_overlap must be smaller than chunking.chunk_size");
        }
        if self.embedder.kind != EmbedderKind::Bert && self.embedder.dim == 0 {
            return bad("embedder.dim must be > 0");
        }

        let local = &self.generator.local;
        if local.num_beams == 0 {
            return bad("generator.local.num_beams must be >= 1");
        }
        if !(local.top_p > 0.0 && local.top_p <= 1.0) {
            return bad("generator.local.top_p must be in (0, 1]");
        }
        if local.max_length < 2 {
            return bad("generator.local.max_length must be >= 2");
        }
        if local.max_input_len == 0 {
            return bad("generator.local.max_input_len must be > 0");
        }
        Ok(())
    }
}

impl RemoteSettings {
    /// Endpoint and model, or `InvalidConfig` naming the missing key.
    pub fn require(&self, section: &str) -> Result<(&str, &str)> {
        let endpoint = self.endpoint.as_deref().filter(|s| !s.is_empty());
        let model = self.model.as_deref().filter(|s| !s.is_empty());
        match (endpoint, model) {
            (Some(endpoint), Some(model)) => Ok((endpoint, model)),
            (None, _) => Err(Error::InvalidConfig(format!("{section}.endpoint is required"))),
            (_, None) => Err(Error::InvalidConfig(format!("{section}.model is required"))),
        }
    }
}

/// `Some(path)` expanded, or `InvalidConfig` naming the missing key.
pub fn require_dir(dir: Option<&str>, key: &str) -> Result<PathBuf> {
    dir.filter(|d| !d.is_empty())
        .map(expand_path)
        .ok_or_else(|| Error::InvalidConfig(format!("{key} is required")))
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
