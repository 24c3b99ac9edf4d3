//! Configuration management for Recall.
//!
//! Configuration is assembled from several sources, later ones winning:
//! - Built-in defaults
//! - Config file (`.recall/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The result is validated once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .recall/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider ("ollama", "openai")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format ("pretty" or "json")
    pub log_format: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Pipeline tuning knobs
    pub rag: RagConfig,

    /// Local corpus settings
    pub store: StoreConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Custom endpoint, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// HTTP timeout in seconds, if configured.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            ProviderConfig::OpenAI { timeout, .. } | ProviderConfig::Ollama { timeout, .. } => {
                *timeout
            }
        }
    }
}

/// Tuning knobs for the question-answering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfig {
    /// Nearest neighbours requested from the vector index
    #[serde(default = "default_top_k_retrieval")]
    pub top_k_retrieval: usize,

    /// Ranked chunks kept as answer context
    #[serde(default = "default_top_k_context")]
    pub top_k_context: usize,

    /// Sampling temperature for answer generation
    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    /// Sampling temperature for query analysis
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,

    /// Mean relevance needed for a `high` confidence label
    #[serde(default = "default_confidence_threshold_high")]
    pub confidence_threshold_high: f32,

    /// Mean relevance needed for a `medium` confidence label
    #[serde(default = "default_confidence_threshold_medium")]
    pub confidence_threshold_medium: f32,

    /// Optional deadline for a whole pipeline run
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_top_k_retrieval() -> usize {
    10
}

fn default_top_k_context() -> usize {
    5
}

fn default_llm_temperature() -> f32 {
    0.3
}

fn default_analysis_temperature() -> f32 {
    0.1
}

fn default_confidence_threshold_high() -> f32 {
    0.8
}

fn default_confidence_threshold_medium() -> f32 {
    0.6
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k_retrieval: default_top_k_retrieval(),
            top_k_context: default_top_k_context(),
            llm_temperature: default_llm_temperature(),
            analysis_temperature: default_analysis_temperature(),
            confidence_threshold_high: default_confidence_threshold_high(),
            confidence_threshold_medium: default_confidence_threshold_medium(),
            request_timeout_secs: None,
        }
    }
}

impl RagConfig {
    /// Apply `RECALL_*` overrides using the given variable lookup.
    ///
    /// Takes a lookup function so tests can feed values without touching
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RECALL_TOP_K_RETRIEVAL") {
            self.top_k_retrieval = parse_env("RECALL_TOP_K_RETRIEVAL", &v)?;
        }
        if let Some(v) = lookup("RECALL_TOP_K_CONTEXT") {
            self.top_k_context = parse_env("RECALL_TOP_K_CONTEXT", &v)?;
        }
        if let Some(v) = lookup("RECALL_LLM_TEMPERATURE") {
            self.llm_temperature = parse_env("RECALL_LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("RECALL_CONFIDENCE_THRESHOLD_HIGH") {
            self.confidence_threshold_high = parse_env("RECALL_CONFIDENCE_THRESHOLD_HIGH", &v)?;
        }
        if let Some(v) = lookup("RECALL_CONFIDENCE_THRESHOLD_MEDIUM") {
            self.confidence_threshold_medium =
                parse_env("RECALL_CONFIDENCE_THRESHOLD_MEDIUM", &v)?;
        }
        if let Some(v) = lookup("RECALL_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(parse_env("RECALL_REQUEST_TIMEOUT_SECS", &v)?);
        }
        Ok(())
    }

    /// Validate value ranges.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k_retrieval == 0 {
            return Err(AppError::Config(
                "topKRetrieval must be at least 1".to_string(),
            ));
        }
        if self.top_k_context == 0 {
            return Err(AppError::Config("topKContext must be at least 1".to_string()));
        }

        for (name, value) in [
            ("llmTemperature", self.llm_temperature),
            ("analysisTemperature", self.analysis_temperature),
            ("confidenceThresholdHigh", self.confidence_threshold_high),
            ("confidenceThresholdMedium", self.confidence_threshold_medium),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.confidence_threshold_medium > self.confidence_threshold_high {
            return Err(AppError::Config(format!(
                "confidenceThresholdMedium ({}) must not exceed confidenceThresholdHigh ({})",
                self.confidence_threshold_medium, self.confidence_threshold_high
            )));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(AppError::Config(
                "requestTimeoutSecs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid value for {}: {} ({})", name, value, e)))
}

/// Local SQLite corpus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Database path, relative to the workspace unless absolute
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Query embedding settings; must match how the corpus was embedded
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".recall/knowledge.sqlite")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

/// Embedding provider used to vectorize queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Endpoint for HTTP providers
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    rag: Option<RagConfig>,
    store: Option<StoreConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            log_format: None,
            verbose: false,
            no_color: false,
            llm: None,
            rag: RagConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment.
    ///
    /// Environment variables:
    /// - `RECALL_WORKSPACE`: Override workspace path
    /// - `RECALL_CONFIG`: Path to config file
    /// - `RECALL_PROVIDER`: LLM provider
    /// - `RECALL_MODEL`: Model identifier
    /// - `RECALL_API_KEY`: API key
    /// - `RECALL_TOP_K_RETRIEVAL`, `RECALL_TOP_K_CONTEXT`,
    ///   `RECALL_LLM_TEMPERATURE`, `RECALL_CONFIDENCE_THRESHOLD_HIGH`,
    ///   `RECALL_CONFIDENCE_THRESHOLD_MEDIUM`, `RECALL_REQUEST_TIMEOUT_SECS`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use recall_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], but an explicit workspace or config file
    /// wins over `RECALL_WORKSPACE` / `RECALL_CONFIG` and decides which
    /// YAML file is merged.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        match workspace {
            Some(workspace) => config.workspace = workspace,
            None => {
                if let Ok(workspace) = std::env::var("RECALL_WORKSPACE") {
                    config.workspace = PathBuf::from(workspace);
                }
            }
        }

        config.config_file =
            config_file.or_else(|| std::env::var("RECALL_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.recall_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("RECALL_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RECALL_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("RECALL_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.rag.apply_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents).map_err(|e| match e {
            AppError::Serialization(msg) => {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, msg))
            }
            other => other,
        })
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = Some(format);
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::OpenAI { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }

        if let Some(store) = config_file.store {
            result.store = store;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .recall directory.
    pub fn recall_dir(&self) -> PathBuf {
        self.workspace.join(".recall")
    }

    /// Ensure the .recall directory exists.
    pub fn ensure_recall_dir(&self) -> AppResult<()> {
        let recall_dir = self.recall_dir();
        if !recall_dir.exists() {
            std::fs::create_dir_all(&recall_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .recall directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved path of the SQLite corpus.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            self.workspace.join(&self.store.path)
        }
    }

    /// Get the configuration block for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the API key for a provider.
    ///
    /// `RECALL_API_KEY` wins over the provider's `apiKeyEnv` variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider and the pipeline knobs.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["openai", "ollama"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            let hint = match self.get_provider_config(provider) {
                Some(ProviderConfig::OpenAI { api_key_env, .. }) => api_key_env.clone(),
                _ => "RECALL_API_KEY".to_string(),
            };
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                hint
            )));
        }

        if let Some(format) = &self.log_format {
            if crate::logging::LogFormat::parse(format).is_none() {
                return Err(AppError::Config(format!(
                    "Unknown log format: {}. Supported: pretty, json",
                    format
                )));
            }
        }

        self.rag.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert!(!config.verbose);
        assert_eq!(config.rag.top_k_retrieval, 10);
        assert_eq!(config.rag.top_k_context, 5);
        assert_eq!(config.rag.confidence_threshold_high, 0.8);
        assert_eq!(config.rag.confidence_threshold_medium, 0.6);
        assert!(config.rag.request_timeout_secs.is_none());
    }

    #[test]
    fn test_recall_dir_and_store_path() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/kb");
        assert!(config.recall_dir().ends_with(".recall"));
        assert_eq!(
            config.store_path(),
            PathBuf::from("/srv/kb/.recall/knowledge.sqlite")
        );

        config.store.path = PathBuf::from("/data/corpus.sqlite");
        assert_eq!(config.store_path(), PathBuf::from("/data/corpus.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://gpu-box:11434
      model: mistral
      timeout: 60
logging:
  level: debug
  format: json
rag:
  topKRetrieval: 20
  topKContext: 3
  confidenceThresholdHigh: 0.75
store:
  path: corpus/kb.sqlite
  embedding:
    provider: ollama
    model: nomic-embed-text
    dimensions: 768
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();

        assert_eq!(merged.model, "mistral");
        assert_eq!(merged.log_format.as_deref(), Some("json"));
        assert_eq!(merged.rag.top_k_retrieval, 20);
        assert_eq!(merged.rag.top_k_context, 3);
        assert_eq!(merged.rag.confidence_threshold_high, 0.75);
        // Unspecified knobs keep their defaults
        assert_eq!(merged.rag.confidence_threshold_medium, 0.6);
        assert_eq!(merged.rag.llm_temperature, 0.3);
        assert_eq!(merged.store.embedding.dimensions, 768);

        let ollama = merged.get_provider_config("ollama").unwrap();
        assert_eq!(ollama.endpoint(), Some("http://gpu-box:11434"));
        assert_eq!(ollama.timeout(), Some(60));
    }

    #[test]
    fn test_merge_yaml_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rag:\n  topKContext: 2\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.rag.top_k_context, 2);

        std::fs::write(&path, "rag: [not, a, map]\n").unwrap();
        let err = AppConfig::default().merge_yaml(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_explicit_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".recall")).unwrap();
        std::fs::write(
            dir.path().join(".recall").join("config.yaml"),
            "store:\n  path: corpus.sqlite\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.store_path(), dir.path().join("corpus.sqlite"));

        let missing = AppConfig::load_from(Some(dir.path().join("nope")), None);
        assert!(matches!(missing, Err(AppError::Config(_))));
    }

    #[test]
    fn test_rag_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RECALL_TOP_K_RETRIEVAL", "25"),
            ("RECALL_LLM_TEMPERATURE", "0.5"),
            ("RECALL_REQUEST_TIMEOUT_SECS", "45"),
        ]
        .into_iter()
        .collect();

        let mut rag = RagConfig::default();
        rag.apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(rag.top_k_retrieval, 25);
        assert_eq!(rag.llm_temperature, 0.5);
        assert_eq!(rag.request_timeout_secs, Some(45));
        assert_eq!(rag.top_k_context, 5);
    }

    #[test]
    fn test_rag_env_override_rejects_garbage() {
        let mut rag = RagConfig::default();
        let result = rag.apply_env(|name| {
            (name == "RECALL_TOP_K_CONTEXT").then(|| "five".to_string())
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_rag_validate_ranges() {
        assert!(RagConfig::default().validate().is_ok());

        let mut rag = RagConfig::default();
        rag.top_k_context = 0;
        assert!(rag.validate().is_err());

        let mut rag = RagConfig::default();
        rag.llm_temperature = 1.5;
        assert!(rag.validate().is_err());

        let mut rag = RagConfig::default();
        rag.confidence_threshold_medium = 0.9;
        assert!(rag.validate().is_err());

        let mut rag = RagConfig::default();
        rag.request_timeout_secs = Some(0);
        assert!(rag.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_openai_with_explicit_key() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_log_format() {
        let mut config = AppConfig::default();
        config.log_format = Some("xml".to_string());
        assert!(config.validate().is_err());
    }
}
