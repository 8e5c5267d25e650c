//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_GENERATION__MODEL`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, with relative paths resolved
    /// against the directory the config was loaded from.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.store.data_dir = resolve_with_base(&self.base_dir, settings.store.data_dir.to_string_lossy());
        settings.knowledge.dir = resolve_with_base(&self.base_dir, settings.knowledge.dir.to_string_lossy());
        if let Some(dir) = settings.embedding.model_dir.take() {
            settings.embedding.model_dir = Some(resolve_with_base(&self.base_dir, dir.to_string_lossy()));
        }
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        if matches!(env, "prod" | "production") && settings.embedding.backend == EmbeddingBackend::Hash {
            tracing::warn!("production config uses the hashing embedder");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub knowledge: KnowledgeSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub web_search: WebSearchSettings,
    pub assistant: AssistantSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.index.top_k == 0 {
            return Err(Error::InvalidConfig("index.top_k must be at least 1".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.generation.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("generation.base_url is empty".into()));
        }
        if self.generation.timeout_secs == 0 {
            return Err(Error::InvalidConfig("generation.timeout_secs must be positive".into()));
        }
        if self.store.user.trim().is_empty() {
            return Err(Error::InvalidConfig("store.user is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub data_dir: PathBuf,
    pub user: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("data"), user: "student".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    pub dir: PathBuf,
    /// File stems whose paragraphs count as syllabus provenance.
    pub syllabus_files: Vec<String>,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self { dir: PathBuf::from("knowledge_base"), syllabus_files: vec!["syllabus".to_string()] }
    }
}

/// When the embedding index is rebuilt before serving a query.
///
/// An empty index is always rebuilt first, whatever the policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Rebuild on every query.
    Always,
    /// Rebuild only while the index is empty.
    WhenEmpty,
    /// Rebuild when the store's fragment fingerprint changes.
    #[default]
    OnChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub refresh: RefreshPolicy,
    pub top_k: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { refresh: RefreshPolicy::default(), top_k: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Hash,
    Bge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub dim: usize,
    pub model_dir: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::default(), dim: 1024, model_dir: None }
    }
}

/// Sampling parameters for one kind of generation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub router: Sampling,
    pub answer: Sampling,
    pub fallback: Sampling,
    pub quiz: Sampling,
    pub flashcards: Sampling,
    pub summary: Sampling,
    pub plan: Sampling,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "phi3:3.8b".to_string(),
            timeout_secs: 30,
            router: Sampling { temperature: 0.1, max_tokens: 50 },
            answer: Sampling { temperature: 0.7, max_tokens: 1000 },
            fallback: Sampling { temperature: 0.5, max_tokens: 200 },
            quiz: Sampling { temperature: 0.7, max_tokens: 4000 },
            flashcards: Sampling { temperature: 0.7, max_tokens: 3000 },
            summary: Sampling { temperature: 0.5, max_tokens: 2000 },
            plan: Sampling { temperature: 0.7, max_tokens: 4000 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub max_snippets: usize,
    pub timeout_secs: u64,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: None,
            engine_id: None,
            max_snippets: 5,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub name: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self { name: "StudyMate".to_string() }
    }
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
