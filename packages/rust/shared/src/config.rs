//! Application configuration for fdrdict.
//!
//! User config lives at `~/.fdrdict/fdrdict.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FdrError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "fdrdict.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".fdrdict";

/// Largest page the schema-events query endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

// ---------------------------------------------------------------------------
// Config structs (matching fdrdict.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// API endpoint and credential lookup.
    #[serde(default)]
    pub falcon: FalconConfig,

    /// Retrieval tuning.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Keyword sources for tagging.
    #[serde(default)]
    pub tags: TagsConfig,
}

/// `[falcon]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalconConfig {
    /// Cloud region: auto, us1, us2, eu1, usgov1, usgov2.
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Explicit API base URL; takes precedence over `cloud`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the env var holding the client id (never store the id itself).
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,

    /// Name of the env var holding the client secret.
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
}

impl Default for FalconConfig {
    fn default() -> Self {
        Self {
            cloud: default_cloud(),
            base_url: None,
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
        }
    }
}

fn default_cloud() -> String {
    "auto".into()
}
fn default_client_id_env() -> String {
    "FALCON_CLIENT_ID".into()
}
fn default_client_secret_env() -> String {
    "FALCON_CLIENT_SECRET".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Ids requested per enumeration page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Retries after the first failed detail request.
    #[serde(default = "default_max_detail_retries")]
    pub max_detail_retries: u32,

    /// Concurrent detail requests.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: u32,

    /// Delay before the first retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Growth factor between consecutive retry delays.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Upper bound on any single retry delay.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_detail_retries: default_max_detail_retries(),
            worker_concurrency: default_worker_concurrency(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_max_detail_retries() -> u32 {
    3
}
fn default_worker_concurrency() -> u32 {
    8
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_retry_max_delay_ms() -> u64 {
    10_000
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the generated dictionary is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// File name used when no explicit output path is given.
    #[serde(default = "default_output_file")]
    pub default_output_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_output_file: default_output_file(),
        }
    }
}

fn default_output_dir() -> String {
    "./docs".into()
}
fn default_output_file() -> String {
    "fdr-event-dictionary.json".into()
}

/// `[tags]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Tag files merged on top of the bundled defaults, in order.
    #[serde(default)]
    pub tag_files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Cloud regions
// ---------------------------------------------------------------------------

/// Falcon cloud region, which selects the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudRegion {
    Auto,
    Us1,
    Us2,
    Eu1,
    UsGov1,
    UsGov2,
}

impl CloudRegion {
    /// Every accepted region name, for help text and error messages.
    pub const NAMES: [&'static str; 6] = ["auto", "us1", "us2", "eu1", "usgov1", "usgov2"];

    /// API base URL for this region. `Auto` resolves to the US-1 endpoint.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Auto | Self::Us1 => "https://api.crowdstrike.com",
            Self::Us2 => "https://api.us-2.crowdstrike.com",
            Self::Eu1 => "https://api.eu-1.crowdstrike.com",
            Self::UsGov1 => "https://api.laggar.gcw.crowdstrike.com",
            Self::UsGov2 => "https://api.us-gov-2.crowdstrike.mil",
        }
    }
}

impl FromStr for CloudRegion {
    type Err = FdrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "us1" | "us-1" => Ok(Self::Us1),
            "us2" | "us-2" => Ok(Self::Us2),
            "eu1" | "eu-1" => Ok(Self::Eu1),
            "usgov1" | "us-gov-1" => Ok(Self::UsGov1),
            "usgov2" | "us-gov-2" => Ok(Self::UsGov2),
            other => Err(FdrError::config(format!(
                "invalid cloud region '{other}': expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl FalconConfig {
    /// Resolve the effective API base URL: explicit override first, then region.
    pub fn resolve_base_url(&self) -> Result<Url> {
        let raw = match &self.base_url {
            Some(url) => url.clone(),
            None => self.cloud.parse::<CloudRegion>()?.base_url().to_string(),
        };
        // Keep any path prefix when endpoint paths are joined on.
        let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
        Url::parse(&raw).map_err(|e| FdrError::config(format!("invalid base URL '{raw}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Effective fetch settings: config file values with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// API base URL, already resolved from region or override.
    pub base_url: Url,
    /// Ids per enumeration page, clamped to `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
    /// Retries after the first failed detail request.
    pub max_detail_retries: u32,
    /// Concurrent detail requests (at least 1).
    pub worker_concurrency: u32,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
    /// Growth factor between retry delays.
    pub retry_multiplier: f64,
    /// Cap on a single retry delay.
    pub retry_max_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl FetchConfig {
    /// Merge the `[falcon]` and `[fetch]` sections into runtime settings.
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        let fetch = &config.fetch;
        Ok(Self {
            base_url: config.falcon.resolve_base_url()?,
            page_size: clamp_page_size(fetch.page_size),
            max_detail_retries: fetch.max_detail_retries,
            worker_concurrency: fetch.worker_concurrency.max(1),
            retry_base_delay: Duration::from_millis(fetch.retry_base_delay_ms),
            retry_multiplier: fetch.retry_multiplier.max(1.0),
            retry_max_delay: Duration::from_millis(fetch.retry_max_delay_ms),
            request_timeout: Duration::from_secs(fetch.request_timeout_secs.max(1)),
        })
    }

    /// Override the page size (clamped).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(page_size);
        self
    }

    /// Override the worker count (at least 1).
    pub fn with_concurrency(mut self, workers: u32) -> Self {
        self.worker_concurrency = workers.max(1);
        self
    }
}

fn clamp_page_size(requested: u32) -> u32 {
    let clamped = requested.clamp(1, MAX_PAGE_SIZE);
    if clamped != requested {
        tracing::warn!(requested, clamped, "page size out of range, clamping");
    }
    clamped
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API client credentials. The secret is never printed.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Resolve credentials: explicit values first, then the configured env vars.
pub fn resolve_credentials(
    config: &AppConfig,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<Credentials> {
    let client_id = pick(client_id, &config.falcon.client_id_env);
    let client_secret = pick(client_secret, &config.falcon.client_secret_env);

    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(Credentials {
            client_id,
            client_secret,
        }),
        _ => Err(FdrError::config(format!(
            "missing API credentials. Pass --client-id/--client-secret or set the {} and {} environment variables",
            config.falcon.client_id_env, config.falcon.client_secret_env
        ))),
    }
}

fn pick(explicit: Option<&str>, env_var: &str) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.fdrdict/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FdrError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.fdrdict/fdrdict.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| FdrError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FdrError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config to `path`. An existing file is left untouched and
/// reported as a [`FdrError::Config`].
pub fn init_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(FdrError::config(format!(
            "config file already exists at {}",
            path.display()
        )));
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| FdrError::io(dir, e))?;
    }

    let content =
        toml::to_string_pretty(&AppConfig::default()).map_err(|e| FdrError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| FdrError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}
