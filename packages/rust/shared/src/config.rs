//! Application configuration for arxivsummary.
//!
//! User config lives at `~/.arxivsummary/arxivsummary.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArxivSummaryError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "arxivsummary.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".arxivsummary";

// ---------------------------------------------------------------------------
// Config structs (matching arxivsummary.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog search settings.
    #[serde(default)]
    pub search: SearchSection,

    /// Text generator settings.
    #[serde(default)]
    pub generator: GeneratorSection,

    /// Output locations.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Free-text query; empty means "category filter only".
    #[serde(default)]
    pub query: String,

    /// Category filters, ORed together.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Hard cap on results considered per run.
    #[serde(default = "default_max_total_results")]
    pub max_total_results: usize,

    /// Keep records whose primary category is outside `categories`.
    #[serde(default = "default_true")]
    pub include_cross_listed: bool,

    /// Scope the free-text query to titles.
    #[serde(default)]
    pub title_only: bool,

    /// Scope the free-text query to abstracts.
    #[serde(default)]
    pub abstract_only: bool,

    /// Scope the free-text query to author names.
    #[serde(default)]
    pub author_only: bool,

    /// Results requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Catalog query endpoint.
    #[serde(default = "default_search_api_url")]
    pub api_url: String,

    /// Attempts per page request before the source is declared unreachable.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Minimum ms between page requests.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            query: String::new(),
            categories: default_categories(),
            max_total_results: default_max_total_results(),
            include_cross_listed: true,
            title_only: false,
            abstract_only: false,
            author_only: false,
            page_size: default_page_size(),
            api_url: default_search_api_url(),
            retry_count: default_retry_count(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_categories() -> Vec<String> {
    vec![
        "cond-mat.supr-con".into(),
        "cond-mat.str-el".into(),
        "cond-mat.mtrl-sci".into(),
        "cond-mat.mes-hall".into(),
    ]
}
fn default_max_total_results() -> usize {
    25
}
fn default_true() -> bool {
    true
}
fn default_page_size() -> usize {
    100
}
fn default_search_api_url() -> String {
    "http://export.arxiv.org/api/query".into()
}
fn default_retry_count() -> u32 {
    3
}
fn default_page_delay_ms() -> u64 {
    3000
}
fn default_search_timeout_secs() -> u64 {
    30
}

/// `[generator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSection {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL; the model path and `:generateContent` are appended.
    #[serde(default = "default_generator_api_url")]
    pub api_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Total attempts per request, including the first.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base in seconds; doubled after every failed attempt.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,

    /// Records per batch prompt.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause after every generation call, in ms.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Extra cool-down between batches, in ms.
    #[serde(default = "default_interval_pause_ms")]
    pub interval_pause_ms: u64,

    /// Language the summaries are written in.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            api_url: default_generator_api_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_generator_timeout_secs(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            interval_pause_ms: default_interval_pause_ms(),
            language: default_language(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_generator_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_output_tokens() -> u32 {
    32648
}
fn default_top_p() -> f32 {
    0.8
}
fn default_top_k() -> u32 {
    40
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_generator_timeout_secs() -> u64 {
    300
}
fn default_batch_size() -> usize {
    25
}
fn default_batch_pause_ms() -> u64 {
    2000
}
fn default_interval_pause_ms() -> u64 {
    3000
}
fn default_language() -> String {
    "English".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory receiving reports, metadata and the cursor file.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    #[serde(default = "default_cursor_file")]
    pub cursor_file: String,

    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Whether to archive fetched records as JSON next to the report.
    #[serde(default = "default_true")]
    pub write_metadata: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            cursor_file: default_cursor_file(),
            metadata_file: default_metadata_file(),
            write_metadata: true,
        }
    }
}

fn default_output_dir() -> String {
    "data".into()
}
fn default_cursor_file() -> String {
    "last_run.json".into()
}
fn default_metadata_file() -> String {
    "metadata.json".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (immutable, merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Which field the free-text query is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    All,
    Title,
    Abstract,
    Author,
}

/// Runtime catalog search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub query: String,
    pub categories: Vec<String>,
    pub max_results: usize,
    pub include_cross_listed: bool,
    pub scope: QueryScope,
    pub page_size: usize,
    pub api_url: String,
    pub retry_count: u32,
    pub page_delay: Duration,
    pub timeout: Duration,
}

impl From<&AppConfig> for SearchConfig {
    fn from(config: &AppConfig) -> Self {
        let s = &config.search;
        // Title wins over abstract, abstract over author.
        let scope = if s.title_only {
            QueryScope::Title
        } else if s.abstract_only {
            QueryScope::Abstract
        } else if s.author_only {
            QueryScope::Author
        } else {
            QueryScope::All
        };

        Self {
            query: s.query.clone(),
            categories: s.categories.clone(),
            max_results: s.max_total_results,
            include_cross_listed: s.include_cross_listed,
            scope,
            page_size: s.page_size.max(1),
            api_url: s.api_url.clone(),
            retry_count: s.retry_count.max(1),
            page_delay: Duration::from_millis(s.page_delay_ms),
            timeout: Duration::from_secs(s.timeout_secs),
        }
    }
}

/// Runtime text generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model: String,
    pub api_url: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    pub timeout: Duration,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub interval_pause: Duration,
    pub language: String,
}

impl From<&AppConfig> for GeneratorConfig {
    fn from(config: &AppConfig) -> Self {
        let g = &config.generator;
        Self {
            model: g.model.clone(),
            api_url: g.api_url.clone(),
            api_key_env: g.api_key_env.clone(),
            temperature: g.temperature,
            max_output_tokens: g.max_output_tokens,
            top_p: g.top_p,
            top_k: g.top_k,
            retry_count: g.retry_count.max(1),
            retry_base_delay: Duration::from_secs(g.retry_delay_secs),
            timeout: Duration::from_secs(g.timeout_secs),
            batch_size: g.batch_size.max(1),
            batch_pause: Duration::from_millis(g.batch_pause_ms),
            interval_pause: Duration::from_millis(g.interval_pause_ms),
            language: g.language.clone(),
        }
    }
}

/// Runtime output locations.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub cursor_path: PathBuf,
    pub metadata_file: Option<String>,
}

impl From<&AppConfig> for OutputConfig {
    fn from(config: &AppConfig) -> Self {
        let o = &config.output;
        let dir = PathBuf::from(&o.dir);
        Self {
            cursor_path: dir.join(&o.cursor_file),
            metadata_file: o.write_metadata.then(|| o.metadata_file.clone()),
            dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.arxivsummary/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArxivSummaryError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.arxivsummary/arxivsummary.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ArxivSummaryError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArxivSummaryError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArxivSummaryError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArxivSummaryError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArxivSummaryError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the generator API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.generator.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ArxivSummaryError::config(format!(
            "Generator API key not found. Set the {var_name} environment variable."
        ))),
    }
}
