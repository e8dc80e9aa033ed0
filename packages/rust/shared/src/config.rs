//! Application configuration for researchflow.
//!
//! User config lives at `~/.researchflow/researchflow.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys never live in the file; it only names the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "researchflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".researchflow";

// ---------------------------------------------------------------------------
// Config structs (matching researchflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Article search provider.
    #[serde(default)]
    pub search: SearchConfig,

    /// Text completion provider.
    #[serde(default)]
    pub completion: CompletionConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Where the summaries file is written (relative to the working directory).
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("research_summaries.txt")
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Article search endpoint (NewsAPI `everything`-compatible).
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// HTTP timeout for one search request.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://newsapi.org/v2/everything".into()
}
fn default_search_key_env() -> String {
    "WEB_API_KEY".into()
}
fn default_search_timeout() -> u64 {
    30
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the OpenAI-compatible API (`/completions` is appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Completion model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the completion API key.
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// Generation cap per summary.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout for one completion request.
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_completion_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo-instruct".into()
}
fn default_completion_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_max_tokens() -> u32 {
    100
}
fn default_completion_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Credentials (runtime, read from the environment)
// ---------------------------------------------------------------------------

/// The two secrets a run needs, resolved once at startup.
#[derive(Clone)]
pub struct Credentials {
    /// Completion API key. Required.
    pub completion_api_key: String,
    /// Search API key. Optional; without it searches go out unauthenticated.
    pub search_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("completion_api_key", &"<redacted>")
            .field(
                "search_api_key",
                &self.search_api_key.as_deref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Credentials {
    /// Read both keys from the env vars named in `config`.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        let completion_var = &config.completion.api_key_env;
        let completion_api_key = non_empty_var(completion_var).ok_or_else(|| {
            ResearchError::MissingCredential {
                var: completion_var.clone(),
            }
        })?;

        let search_api_key = non_empty_var(&config.search.api_key_env);
        if search_api_key.is_none() {
            tracing::warn!(
                var = %config.search.api_key_env,
                "search API key not set, requests will be unauthenticated"
            );
        }

        Ok(Self {
            completion_api_key,
            search_api_key,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|val| !val.is_empty())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.researchflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ResearchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.researchflow/researchflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ResearchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ResearchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ResearchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ResearchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ResearchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values that would only fail later, mid-run.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    for (name, raw) in [
        ("search.endpoint", &config.search.endpoint),
        ("completion.base_url", &config.completion.base_url),
    ] {
        url::Url::parse(raw)
            .map_err(|e| ResearchError::config(format!("{name} '{raw}' is not a valid URL: {e}")))?;
    }

    if config.completion.max_tokens == 0 {
        return Err(ResearchError::config("completion.max_tokens must be at least 1"));
    }

    if config.defaults.output_path.as_os_str().is_empty() {
        return Err(ResearchError::config("defaults.output_path must not be empty"));
    }

    Ok(())
}
