//! Configuration module for strmsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::PathPair;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for strmsync.
///
/// Every section is optional in the YAML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub full_sync: FullSyncConfig,
    pub incremental_sync: IncrementalSyncConfig,
    pub media: MediaConfig,
    pub placeholder: PlaceholderConfig,
    pub rate_limiting: RateLimitingConfig,
    pub cache: CacheConfig,
    pub tree: TreeConfig,
    pub state: StateConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// What to do when a placeholder already exists at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    /// Rewrite existing placeholders whose content differs.
    Always,
    /// Leave existing placeholders untouched.
    #[default]
    Never,
}

/// Full synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FullSyncConfig {
    /// Root pairs in `local#remote` form.
    pub paths: Vec<String>,
    pub overwrite_mode: OverwriteMode,
    /// Remove local placeholders that no longer have a remote counterpart.
    pub cleanup: bool,
    /// Remove parent directories left without placeholders after cleanup.
    pub remove_empty_parents: bool,
    /// Also remove sibling files sharing the removed placeholder's stem.
    pub remove_related_files: bool,
    /// Deletion ratio (percent of existing placeholders) approved without
    /// a stability check.
    pub max_deletion_percent: f64,
    /// Maximum coefficient of variation (percent) for three consecutive
    /// deletion counts to be considered stable.
    pub stable_cv_percent: f64,
}

/// Incremental synchronization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalSyncConfig {
    /// Root pairs in `local#remote` form.
    pub paths: Vec<String>,
}

/// Which remote files qualify for a placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// File extensions (without dot, case-insensitive).
    pub extensions: Vec<String>,
    /// Keywords that exclude a file when its name contains them.
    pub blacklist: Vec<String>,
    /// Minimum file size in bytes; `0` disables the check.
    pub min_file_size: u64,
    /// Remote directories staged for the transfer pipeline; skipped.
    pub transfer_paths: Vec<String>,
}

/// Content layout of placeholder files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderFormat {
    /// Reference carries only the content handle.
    #[default]
    Handle,
    /// Reference carries the content handle and the file name.
    HandleAndName,
}

/// Placeholder file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    /// URL the placeholder reference points at.
    pub base_url: String,
    pub format: PlaceholderFormat,
    /// Percent-encode the file name in `handle_and_name` format.
    pub url_encode_name: bool,
    /// Placeholder file extension, without dot.
    pub extension: String,
}

/// Remote API throttling and enumeration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    /// Calls allowed per sliding window.
    pub max_calls: u32,
    /// Sliding window length in seconds.
    pub time_window_secs: f64,
    /// Minimum spacing between calls of one endpoint, in seconds.
    pub endpoint_cooldown_secs: f64,
    /// Retries for transient errors before a job fails.
    pub max_retries: u32,
    /// Enumeration worker count.
    pub max_workers: usize,
    /// Children requested per listing page.
    pub page_size: u32,
}

/// Content-address cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries per cache map.
    pub max_capacity: u64,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
}

/// Directory tree storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeBackend {
    /// Newline-delimited text files in `tree.work_dir`.
    #[default]
    File,
    /// Set and list keys in a Redis server.
    Redis,
}

/// Directory tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub backend: TreeBackend,
    /// Directory holding text-file trees.
    pub work_dir: PathBuf,
    /// Connection URL, required for the `redis` backend.
    pub redis_url: Option<String>,
}

/// Persistent state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// SQLite database holding deletion stability records.
    pub database: PathBuf,
}

/// Remote listing API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Equivalent API endpoints calls rotate through. When empty, `base_url`
    /// is the only endpoint.
    pub endpoints: Vec<EndpointConfig>,
}

/// One endpoint of the remote pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    /// Overrides `rate_limiting.endpoint_cooldown_secs` for this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_secs: Option<f64>,
    /// Slots this endpoint takes in one rotation cycle.
    #[serde(default = "default_endpoint_weight")]
    pub weight: u32,
}

fn default_endpoint_weight() -> u32 {
    1
}

impl RemoteConfig {
    /// The endpoints calls rotate through, `base_url` alone when none are
    /// listed
    pub fn effective_endpoints(&self) -> Vec<EndpointConfig> {
        if self.endpoints.is_empty() {
            vec![EndpointConfig {
                base_url: self.base_url.clone(),
                cooldown_secs: None,
                weight: 1,
            }]
        } else {
            self.endpoints.clone()
        }
    }
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/strmsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("strmsync")
            .join("config.yaml")
    }
}

impl FullSyncConfig {
    /// Parse the configured root pairs.
    pub fn pairs(&self) -> Result<Vec<PathPair>, crate::domain::DomainError> {
        parse_pairs(&self.paths)
    }
}

impl IncrementalSyncConfig {
    /// Parse the configured root pairs.
    pub fn pairs(&self) -> Result<Vec<PathPair>, crate::domain::DomainError> {
        parse_pairs(&self.paths)
    }
}

fn parse_pairs(paths: &[String]) -> Result<Vec<PathPair>, crate::domain::DomainError> {
    paths
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.parse())
        .collect()
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

/// Extensions mirrored when none are configured.
pub const DEFAULT_MEDIA_EXTENSIONS: &str =
    "mp4,mkv,ts,iso,rmvb,avi,mov,mpeg,mpg,wmv,3gp,asf,m4v,flv,m2ts,tp,f4v";

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("strmsync")
}

impl Default for FullSyncConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            overwrite_mode: OverwriteMode::Never,
            cleanup: false,
            remove_empty_parents: true,
            remove_related_files: false,
            max_deletion_percent: 10.0,
            stable_cv_percent: 5.0,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_MEDIA_EXTENSIONS
                .split(',')
                .map(str::to_string)
                .collect(),
            blacklist: Vec::new(),
            min_file_size: 0,
            transfer_paths: Vec::new(),
        }
    }
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/redirect_url".to_string(),
            format: PlaceholderFormat::Handle,
            url_encode_name: true,
            extension: "strm".to_string(),
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_calls: 2,
            time_window_secs: 1.0,
            endpoint_cooldown_secs: 0.5,
            max_retries: 5,
            max_workers: 4,
            page_size: 1150,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 65_536,
            ttl_secs: 1800,
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            backend: TreeBackend::File,
            work_dir: std::env::temp_dir().join("strmsync"),
            redis_url: None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("state.db"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            endpoints: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"rate_limiting.max_calls"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn is_percent(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- full_sync ---
        for (i, raw) in self.full_sync.paths.iter().enumerate() {
            if let Err(e) = raw.parse::<PathPair>() {
                push(&format!("full_sync.paths[{i}]"), e.to_string());
            }
        }
        if !is_percent(self.full_sync.max_deletion_percent) {
            push(
                "full_sync.max_deletion_percent",
                "must be in range (0, 100]".into(),
            );
        }
        if !is_percent(self.full_sync.stable_cv_percent) {
            push(
                "full_sync.stable_cv_percent",
                "must be in range (0, 100]".into(),
            );
        }

        // --- incremental_sync ---
        for (i, raw) in self.incremental_sync.paths.iter().enumerate() {
            match raw.parse::<PathPair>() {
                Ok(pair) if pair.remote.is_root() => push(
                    &format!("incremental_sync.paths[{i}]"),
                    "remote root '/' cannot be synced incrementally".into(),
                ),
                Ok(_) => {}
                Err(e) => push(&format!("incremental_sync.paths[{i}]"), e.to_string()),
            }
        }

        // --- media ---
        if self.media.extensions.iter().all(|e| e.trim().is_empty()) {
            push("media.extensions", "must not be empty".into());
        }
        for (i, raw) in self.media.transfer_paths.iter().enumerate() {
            if !raw.starts_with('/') {
                push(
                    &format!("media.transfer_paths[{i}]"),
                    format!("must be an absolute remote path: {raw}"),
                );
            }
        }

        // --- placeholder ---
        if !is_http_url(&self.placeholder.base_url) {
            push(
                "placeholder.base_url",
                format!("must be an http(s) URL: {}", self.placeholder.base_url),
            );
        }
        let ext = &self.placeholder.extension;
        if ext.is_empty() || ext.contains('.') || ext.contains('/') {
            push(
                "placeholder.extension",
                format!("must be a bare extension without dot: {ext:?}"),
            );
        }

        // --- rate_limiting ---
        if self.rate_limiting.max_calls == 0 {
            push("rate_limiting.max_calls", "must be greater than 0".into());
        }
        if self.rate_limiting.time_window_secs <= 0.0 {
            push(
                "rate_limiting.time_window_secs",
                "must be greater than 0".into(),
            );
        }
        if self.rate_limiting.endpoint_cooldown_secs < 0.0 {
            push(
                "rate_limiting.endpoint_cooldown_secs",
                "must not be negative".into(),
            );
        }
        if self.rate_limiting.max_workers == 0 || self.rate_limiting.max_workers > 64 {
            push("rate_limiting.max_workers", "must be in range 1..=64".into());
        }
        if self.rate_limiting.page_size == 0 {
            push("rate_limiting.page_size", "must be greater than 0".into());
        }

        // --- cache ---
        if self.cache.max_capacity == 0 {
            push("cache.max_capacity", "must be greater than 0".into());
        }
        if self.cache.ttl_secs == 0 {
            push("cache.ttl_secs", "must be greater than 0".into());
        }

        // --- tree ---
        if self.tree.backend == TreeBackend::Redis
            && self.tree.redis_url.as_deref().map_or(true, str::is_empty)
        {
            push(
                "tree.redis_url",
                "required when tree.backend is redis".into(),
            );
        }

        // --- remote ---
        if !is_http_url(&self.remote.base_url) {
            push(
                "remote.base_url",
                format!("must be an http(s) URL: {}", self.remote.base_url),
            );
        }
        if self.remote.timeout_secs == 0 {
            push("remote.timeout_secs", "must be greater than 0".into());
        }
        for (i, endpoint) in self.remote.endpoints.iter().enumerate() {
            if !is_http_url(&endpoint.base_url) {
                push(
                    &format!("remote.endpoints[{i}].base_url"),
                    format!("must be an http(s) URL: {}", endpoint.base_url),
                );
            }
            if endpoint.cooldown_secs.is_some_and(|c| c < 0.0) {
                push(
                    &format!("remote.endpoints[{i}].cooldown_secs"),
                    "must not be negative".into(),
                );
            }
            if endpoint.weight == 0 {
                push(
                    &format!("remote.endpoints[{i}].weight"),
                    "must be greater than 0".into(),
                );
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use strmsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .full_sync_path("/media/strm#/Movies")
///     .full_sync_cleanup(true)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- full_sync ---

    pub fn full_sync_path(mut self, pair: impl Into<String>) -> Self {
        self.config.full_sync.paths.push(pair.into());
        self
    }

    pub fn full_sync_overwrite_mode(mut self, mode: OverwriteMode) -> Self {
        self.config.full_sync.overwrite_mode = mode;
        self
    }

    pub fn full_sync_cleanup(mut self, enabled: bool) -> Self {
        self.config.full_sync.cleanup = enabled;
        self
    }

    pub fn full_sync_remove_related_files(mut self, enabled: bool) -> Self {
        self.config.full_sync.remove_related_files = enabled;
        self
    }

    pub fn full_sync_max_deletion_percent(mut self, percent: f64) -> Self {
        self.config.full_sync.max_deletion_percent = percent;
        self
    }

    pub fn full_sync_stable_cv_percent(mut self, percent: f64) -> Self {
        self.config.full_sync.stable_cv_percent = percent;
        self
    }

    // --- incremental_sync ---

    pub fn incremental_sync_path(mut self, pair: impl Into<String>) -> Self {
        self.config.incremental_sync.paths.push(pair.into());
        self
    }

    // --- media ---

    pub fn media_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.media.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn media_blacklist_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.config.media.blacklist.push(keyword.into());
        self
    }

    pub fn media_min_file_size(mut self, bytes: u64) -> Self {
        self.config.media.min_file_size = bytes;
        self
    }

    pub fn media_transfer_path(mut self, path: impl Into<String>) -> Self {
        self.config.media.transfer_paths.push(path.into());
        self
    }

    // --- placeholder ---

    pub fn placeholder_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.placeholder.base_url = url.into();
        self
    }

    pub fn placeholder_format(mut self, format: PlaceholderFormat) -> Self {
        self.config.placeholder.format = format;
        self
    }

    // --- rate_limiting ---

    pub fn rate_limiting_max_calls(mut self, n: u32) -> Self {
        self.config.rate_limiting.max_calls = n;
        self
    }

    pub fn rate_limiting_time_window_secs(mut self, secs: f64) -> Self {
        self.config.rate_limiting.time_window_secs = secs;
        self
    }

    pub fn rate_limiting_max_workers(mut self, n: usize) -> Self {
        self.config.rate_limiting.max_workers = n;
        self
    }

    pub fn rate_limiting_page_size(mut self, n: u32) -> Self {
        self.config.rate_limiting.page_size = n;
        self
    }

    // --- tree ---

    pub fn tree_backend(mut self, backend: TreeBackend) -> Self {
        self.config.tree.backend = backend;
        self
    }

    pub fn tree_work_dir(mut self, dir: PathBuf) -> Self {
        self.config.tree.work_dir = dir;
        self
    }

    pub fn tree_redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.tree.redis_url = Some(url.into());
        self
    }

    // --- remote / logging ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    /// Add an endpoint to the remote pool.
    pub fn remote_endpoint(mut self, url: impl Into<String>, cooldown_secs: Option<f64>, weight: u32) -> Self {
        self.config.remote.endpoints.push(EndpointConfig {
            base_url: url.into(),
            cooldown_secs,
            weight,
        });
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
