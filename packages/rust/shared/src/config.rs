//! Application configuration for docketrace.
//!
//! User config lives at `~/.docketrace/docketrace.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocketError, Result};
use crate::types::Environment;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docketrace.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docketrace";

// ---------------------------------------------------------------------------
// Config structs (matching docketrace.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Region reference source.
    #[serde(default)]
    pub regions: RegionsConfig,

    /// Case-search browser session.
    #[serde(default)]
    pub search: SearchConfig,

    /// Phone-lookup service endpoints and credentials.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Batch job scheduling.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the record store database.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Environment used when a command does not name one.
    #[serde(default = "default_environment")]
    pub environment: Environment,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            environment: default_environment(),
        }
    }
}

fn default_db_path() -> String {
    "var/docketrace.db".into()
}
fn default_environment() -> Environment {
    Environment::Sandbox
}

/// `[regions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsConfig {
    /// Live reference document listing regions grouped by parent area.
    #[serde(default = "default_regions_url")]
    pub source_url: String,

    /// Timeout for fetching the reference document.
    #[serde(default = "default_regions_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            source_url: default_regions_url(),
            timeout_secs: default_regions_timeout(),
        }
    }
}

fn default_regions_url() -> String {
    "https://libguides.ctstatelibrary.org/cttowns".into()
}
fn default_regions_timeout() -> u64 {
    30
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search form page opened by the browser session.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Origin that relative docket links are resolved against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// WebDriver endpoint (chromedriver, selenium, ...).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Ceiling for waiting on asynchronous result rendering.
    #[serde(default = "default_render_wait")]
    pub render_wait_secs: u64,

    /// Ceiling for a whole search, from navigation to page source.
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,

    /// Run the browser headless.
    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            origin: default_origin(),
            webdriver_url: default_webdriver_url(),
            render_wait_secs: default_render_wait(),
            search_timeout_secs: default_search_timeout(),
            headless: true,
        }
    }
}

fn default_search_url() -> String {
    "https://civilinquiry.jud.ct.gov/PropertyAddressSearch.aspx".into()
}
fn default_origin() -> String {
    "https://civilinquiry.jud.ct.gov/".into()
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_render_wait() -> u64 {
    10
}
fn default_search_timeout() -> u64 {
    90
}
fn default_true() -> bool {
    true
}

/// `[lookup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Sandbox (mock, never billed) endpoint.
    #[serde(default = "default_sandbox_url")]
    pub sandbox_url: String,

    /// Production (billed) endpoint.
    #[serde(default = "default_production_url")]
    pub production_url: String,

    /// Name of the env var holding the sandbox token (never store the token itself).
    #[serde(default = "default_sandbox_token_env")]
    pub sandbox_token_env: String,

    /// Name of the env var holding the production token.
    #[serde(default = "default_production_token_env")]
    pub production_token_env: String,

    /// Per-request timeout.
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,

    /// State sent when an address does not carry one.
    #[serde(default = "default_state")]
    pub default_state: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            sandbox_url: default_sandbox_url(),
            production_url: default_production_url(),
            sandbox_token_env: default_sandbox_token_env(),
            production_token_env: default_production_token_env(),
            timeout_secs: default_lookup_timeout(),
            default_state: default_state(),
        }
    }
}

fn default_sandbox_url() -> String {
    "https://stoplight.io/mocks/batchdata/batchdata/20349728/property/skip-trace".into()
}
fn default_production_url() -> String {
    "https://api.batchdata.com/api/v1/property/skip-trace".into()
}
fn default_sandbox_token_env() -> String {
    "BATCHDATA_SANDBOX_TOKEN".into()
}
fn default_production_token_env() -> String {
    "BATCHDATA_PROD_TOKEN".into()
}
fn default_lookup_timeout() -> u64 {
    30
}
fn default_state() -> String {
    "CT".into()
}

impl LookupConfig {
    /// Env var name holding the credential for `environment`.
    pub fn token_env(&self, environment: Environment) -> &str {
        match environment {
            Environment::Sandbox => &self.sandbox_token_env,
            Environment::Production => &self.production_token_env,
        }
    }

    /// Endpoint for `environment`.
    pub fn endpoint(&self, environment: Environment) -> &str {
        match environment {
            Environment::Sandbox => &self.sandbox_url,
            Environment::Production => &self.production_url,
        }
    }

    /// Read the credential for `environment`, if set and non-empty.
    pub fn token(&self, environment: Environment) -> Option<String> {
        std::env::var(self.token_env(environment))
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on jobs running at the same time.
    #[serde(default = "default_max_jobs")]
    pub max_concurrent_jobs: usize,

    /// A job still running after this long is marked failed.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// Enrich a region's cases right after they are scraped.
    #[serde(default)]
    pub enrich_after_scrape: bool,

    /// Environment used for post-scrape enrichment.
    #[serde(default = "default_environment")]
    pub enrich_environment: Environment,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_jobs(),
            job_timeout_secs: default_job_timeout(),
            enrich_after_scrape: false,
            enrich_environment: default_environment(),
        }
    }
}

fn default_max_jobs() -> usize {
    4
}
fn default_job_timeout() -> u64 {
    600
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docketrace/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocketError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docketrace/docketrace.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| DocketError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| DocketError::config(format!("failed to parse {}: {e}", path.display())))?;

    validate(&config)?;
    Ok(config)
}

/// Reject values that would make every job, search or request fail at once.
fn validate(config: &AppConfig) -> Result<()> {
    let positive = [
        ("scheduler.max_concurrent_jobs", config.scheduler.max_concurrent_jobs as u64),
        ("scheduler.job_timeout_secs", config.scheduler.job_timeout_secs),
        ("search.search_timeout_secs", config.search.search_timeout_secs),
        ("lookup.timeout_secs", config.lookup.timeout_secs),
        ("regions.timeout_secs", config.regions.timeout_secs),
    ];
    for (key, value) in positive {
        if value == 0 {
            return Err(DocketError::config(format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocketError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocketError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocketError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
