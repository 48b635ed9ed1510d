//! Configuration module for TransferSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{
    sync_item::normalize_folder, BucketName, ConnectorName, DomainError, KeyPrefix, Schedule,
    SkewTolerance, SyncItem, TargetSpec,
};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for TransferSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub state: StateConfig,
    pub reports: ReportsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub connectors: Vec<ConnectorConfig>,
}

/// Execution settings shared by all items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Forward tolerance (seconds) applied when comparing modification times
    /// to the watermark. `0` means strict comparison.
    pub skew_tolerance_secs: u32,
    /// Maximum number of executions running at the same time.
    pub max_concurrent_executions: u32,
    /// Seconds between scheduler ticks.
    pub tick_interval_secs: u64,
    /// Lifetime of an execution lease in the state database. Running
    /// executions renew it; a crashed holder blocks its item at most this long.
    pub lease_ttl_secs: u64,
}

/// Persistent state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path to the SQLite database holding watermarks and execution history.
    pub database: PathBuf,
}

/// Execution report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Whether JSON report files are written.
    pub enabled: bool,
    /// Root directory for JSON report files.
    pub directory: PathBuf,
}

/// Which transfer backend receives files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Buckets are sub-directories of `storage.root`.
    Directory,
    /// Amazon S3 (requires the `s3` feature).
    S3,
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory used by the `directory` backend.
    pub root: PathBuf,
    /// Region override for the `s3` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

/// One remote endpoint and the folders synchronised from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remote endpoint as `host[:port]`.
    pub url: String,
    /// Local mount point of the remote filesystem.
    pub mount_root: PathBuf,
    /// Default schedule for every sync setting of this connector.
    pub schedule: String,
    pub sync_settings: Vec<SyncSettingConfig>,
}

/// A single remote-folder-to-bucket mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettingConfig {
    pub local_repository: LocalRepositoryConfig,
    pub remote_folders: RemoteFolderConfig,
    /// Overrides the connector schedule for this mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// Target bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalRepositoryConfig {
    pub bucket_name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

/// Source folder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFolderConfig {
    /// Remote folder; may contain `%year%`, `%month%` and `%day%`.
    pub folder: String,
    #[serde(default)]
    pub recursive: bool,
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
    /// Typically `$XDG_CONFIG_HOME/transfersync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("transfersync")
            .join("config.yaml")
    }

    /// The configured execution lease lifetime.
    pub fn lease_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync.lease_ttl_secs)
    }

    /// The configured skew tolerance.
    pub fn skew_tolerance(&self) -> SkewTolerance {
        SkewTolerance::from_secs(self.sync.skew_tolerance_secs)
    }

    /// Flattens every connector's sync settings into sync items.
    ///
    /// Names, buckets, prefixes and folders are normalised on the way.
    pub fn sync_items(&self) -> Result<Vec<SyncItem>, DomainError> {
        let mut items = Vec::new();
        for connector in &self.connectors {
            let name = ConnectorName::new(&connector.name)?;
            for setting in &connector.sync_settings {
                items.push(build_item(&name, connector, setting)?);
            }
        }
        Ok(items)
    }
}

fn build_item(
    name: &ConnectorName,
    connector: &ConnectorConfig,
    setting: &SyncSettingConfig,
) -> Result<SyncItem, DomainError> {
    let schedule = Schedule::parse(setting.schedule.as_deref().unwrap_or(&connector.schedule))?;
    let target = TargetSpec {
        bucket: BucketName::new(&setting.local_repository.bucket_name)?,
        prefix: KeyPrefix::new(&setting.local_repository.prefix),
        kms_key_id: setting.local_repository.kms_key_id.clone(),
    };
    SyncItem::new(
        name.clone(),
        normalize_folder(&setting.remote_folders.folder),
        setting.remote_folders.recursive,
        target,
        schedule,
    )
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("transfersync")
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skew_tolerance_secs: 0,
            max_concurrent_executions: 8,
            tick_interval_secs: 30,
            lease_ttl_secs: 300,
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

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: data_dir().join("reports"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Directory,
            root: data_dir().join("buckets"),
            region: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.tick_interval_secs"`.
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

/// Upper bound for `sync.max_concurrent_executions`.
const MAX_CONCURRENT_EXECUTIONS: u32 = 64;

/// Lower bound for `sync.lease_ttl_secs`; renewals run at a third of it.
const MIN_LEASE_TTL_SECS: u64 = 30;

fn is_valid_url(url: &str) -> bool {
    let (host, port) = match url.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (url, None),
    };
    if let Some(port) = port {
        if port.parse::<u16>().map_or(true, |p| p == 0) {
            return false;
        }
    }
    !host.is_empty()
        && host.contains('.')
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.max_concurrent_executions == 0
            || self.sync.max_concurrent_executions > MAX_CONCURRENT_EXECUTIONS
        {
            errors.push(ValidationError {
                field: "sync.max_concurrent_executions".into(),
                message: format!("must be between 1 and {MAX_CONCURRENT_EXECUTIONS}"),
            });
        }
        if self.sync.tick_interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.tick_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.lease_ttl_secs < MIN_LEASE_TTL_SECS {
            errors.push(ValidationError {
                field: "sync.lease_ttl_secs".into(),
                message: format!("must be at least {MIN_LEASE_TTL_SECS}"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- connectors ---
        let mut seen_names = HashSet::new();
        for (i, connector) in self.connectors.iter().enumerate() {
            let prefix = format!("connectors[{i}]");

            match ConnectorName::new(&connector.name) {
                Ok(name) => {
                    if !seen_names.insert(name.as_str().to_string()) {
                        errors.push(ValidationError {
                            field: format!("{prefix}.name"),
                            message: format!("duplicate connector name '{name}'"),
                        });
                    }
                }
                Err(e) => errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: e.to_string(),
                }),
            }

            if !is_valid_url(&connector.url) {
                errors.push(ValidationError {
                    field: format!("{prefix}.url"),
                    message: format!("expected host[:port], got '{}'", connector.url),
                });
            }

            if let Err(e) = Schedule::parse(&connector.schedule) {
                errors.push(ValidationError {
                    field: format!("{prefix}.schedule"),
                    message: e.to_string(),
                });
            }

            if connector.sync_settings.is_empty() {
                errors.push(ValidationError {
                    field: format!("{prefix}.sync_settings"),
                    message: "at least one sync setting is required".into(),
                });
            }

            for (j, setting) in connector.sync_settings.iter().enumerate() {
                let field = format!("{prefix}.sync_settings[{j}]");
                if let Err(e) = BucketName::new(&setting.local_repository.bucket_name) {
                    errors.push(ValidationError {
                        field: format!("{field}.local_repository.bucket_name"),
                        message: e.to_string(),
                    });
                }
                if let Some(schedule) = &setting.schedule {
                    if let Err(e) = Schedule::parse(schedule) {
                        errors.push(ValidationError {
                            field: format!("{field}.schedule"),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        // Item keys only make sense once every field above is valid.
        if errors.is_empty() {
            match self.sync_items() {
                Ok(items) => {
                    let mut keys = HashSet::new();
                    for item in &items {
                        if !keys.insert(item.key().clone()) {
                            errors.push(ValidationError {
                                field: "connectors".into(),
                                message: format!(
                                    "duplicate sync setting {} -> {}/{}",
                                    item.source_template(),
                                    item.target().bucket,
                                    item.target().prefix
                                ),
                            });
                        }
                    }
                }
                Err(e) => errors.push(ValidationError {
                    field: "connectors".into(),
                    message: e.to_string(),
                }),
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for programmatic construction of a [`Config`].
///
/// Starts from [`Config::default`] and overrides individual fields.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder seeded with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn skew_tolerance_secs(mut self, secs: u32) -> Self {
        self.config.sync.skew_tolerance_secs = secs;
        self
    }

    pub fn max_concurrent_executions(mut self, n: u32) -> Self {
        self.config.sync.max_concurrent_executions = n;
        self
    }

    pub fn tick_interval_secs(mut self, secs: u64) -> Self {
        self.config.sync.tick_interval_secs = secs;
        self
    }

    pub fn lease_ttl_secs(mut self, secs: u64) -> Self {
        self.config.sync.lease_ttl_secs = secs;
        self
    }

    // --- state / reports / storage ---

    pub fn database(mut self, path: PathBuf) -> Self {
        self.config.state.database = path;
        self
    }

    pub fn reports_directory(mut self, path: PathBuf) -> Self {
        self.config.reports.directory = path;
        self
    }

    pub fn reports_enabled(mut self, enabled: bool) -> Self {
        self.config.reports.enabled = enabled;
        self
    }

    pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
        self.config.storage.backend = backend;
        self
    }

    pub fn storage_root(mut self, root: PathBuf) -> Self {
        self.config.storage.root = root;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- connectors ---

    pub fn connector(mut self, connector: ConnectorConfig) -> Self {
        self.config.connectors.push(connector);
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

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn connector(name: &str, folder: &str) -> ConnectorConfig {
        ConnectorConfig {
            name: name.into(),
            description: None,
            url: "sftp.example.com:22".into(),
            mount_root: PathBuf::from("/mnt/remote"),
            schedule: "@daily".into(),
            sync_settings: vec![SyncSettingConfig {
                local_repository: LocalRepositoryConfig {
                    bucket_name: "landing".into(),
                    prefix: "in".into(),
                    kms_key_id: None,
                },
                remote_folders: RemoteFolderConfig {
                    folder: folder.into(),
                    recursive: false,
                },
                schedule: None,
            }],
        }
    }

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.skew_tolerance_secs, 0);
        assert_eq!(cfg.sync.max_concurrent_executions, 8);
        assert_eq!(cfg.sync.tick_interval_secs, 30);
        assert_eq!(cfg.sync.lease_ttl_secs, 300);
        assert!(cfg.state.database.ends_with("transfersync/state.db"));
        assert!(cfg.reports.enabled);
        assert_eq!(cfg.storage.backend, StorageBackend::Directory);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert!(cfg.connectors.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  skew_tolerance_secs: 300
  max_concurrent_executions: 4
  tick_interval_secs: 10
state:
  database: /tmp/ts/state.db
reports:
  enabled: false
  directory: /tmp/ts/reports
storage:
  backend: s3
  root: /unused
  region: eu-west-1
logging:
  level: debug
  json: true
connectors:
  - name: Partner_A
    description: Partner A drop box
    url: sftp.partner-a.example.com:22
    mount_root: /mnt/partner-a
    schedule: "@daily"
    sync_settings:
      - local_repository:
          bucket_name: s3://Landing
          prefix: /partner-a/
        remote_folders:
          folder: outbound/%year%/%month%/
          recursive: true
      - local_repository:
          bucket_name: archive
          kms_key_id: alias/archive
        remote_folders:
          folder: /archive
        schedule: "0 6 ? * MON *"
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.skew_tolerance_secs, 300);
        assert_eq!(cfg.sync.max_concurrent_executions, 4);
        assert_eq!(cfg.state.database, PathBuf::from("/tmp/ts/state.db"));
        assert!(!cfg.reports.enabled);
        assert_eq!(cfg.storage.backend, StorageBackend::S3);
        assert_eq!(cfg.storage.region.as_deref(), Some("eu-west-1"));
        assert!(cfg.logging.json);
        assert_eq!(cfg.connectors.len(), 1);
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());

        let items = cfg.sync_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].connector().as_str(), "partnera");
        assert_eq!(items[0].source_template(), "/outbound/%year%/%month%");
        assert!(items[0].recursive());
        assert_eq!(items[0].target().bucket.as_str(), "landing");
        assert_eq!(items[0].target().prefix.as_str(), "partner-a");
        assert_eq!(items[0].schedule().expression(), "@daily");
        assert_eq!(items[1].schedule().expression(), "0 6 ? * MON *");
        assert_eq!(items[1].target().kms_key_id.as_deref(), Some("alias/archive"));
    }

    #[test]
    fn load_partial_yaml_uses_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"logging:\n  level: warn\nsync:\n  skew_tolerance_secs: 60\n")
            .unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(cfg.logging.level, "warn");
        assert!(!cfg.logging.json);
        assert_eq!(cfg.sync.skew_tolerance_secs, 60);
        assert_eq!(cfg.sync.tick_interval_secs, 30);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.tick_interval_secs, 30);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_sync_values() {
        let mut cfg = Config::default();
        cfg.sync.max_concurrent_executions = 0;
        cfg.sync.tick_interval_secs = 0;
        cfg.sync.lease_ttl_secs = 2;
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "sync.max_concurrent_executions"));
        assert!(errors.iter().any(|e| e.field == "sync.tick_interval_secs"));
        assert!(errors.iter().any(|e| e.field == "sync.lease_ttl_secs"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_catches_connector_problems() {
        let mut bad = connector("!!!", "/out");
        bad.url = "localhost:99999".into();
        bad.schedule = "@never".into();
        bad.sync_settings[0].local_repository.bucket_name = "s3://".into();

        let cfg = ConfigBuilder::new().connector(bad).build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"connectors[0].name".to_string()));
        assert!(fields.contains(&"connectors[0].url".to_string()));
        assert!(fields.contains(&"connectors[0].schedule".to_string()));
        assert!(fields
            .contains(&"connectors[0].sync_settings[0].local_repository.bucket_name".to_string()));
    }

    #[test]
    fn validate_requires_sync_settings() {
        let mut empty = connector("a", "/out");
        empty.sync_settings.clear();
        let cfg = ConfigBuilder::new().connector(empty).build();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "connectors[0].sync_settings"));
    }

    #[test]
    fn validate_catches_duplicate_names_and_items() {
        let cfg = ConfigBuilder::new()
            .connector(connector("a", "/out"))
            .connector(connector("A", "/other"))
            .build();
        assert!(cfg.validate().iter().any(|e| e.field == "connectors[1].name"));

        let mut twice = connector("a", "/out");
        let copy = twice.sync_settings[0].clone();
        twice.sync_settings.push(copy);
        let cfg = ConfigBuilder::new().connector(twice).build();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.message.starts_with("duplicate sync setting")));
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_url("sftp.example.com"));
        assert!(is_valid_url("sftp.example.com:2222"));
        assert!(!is_valid_url("localhost"));
        assert!(!is_valid_url("bad_host.example.com"));
        assert!(!is_valid_url("sftp.example.com:0"));
        assert!(!is_valid_url(""));
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .skew_tolerance_secs(120)
            .max_concurrent_executions(2)
            .tick_interval_secs(5)
            .database(PathBuf::from("/tmp/db"))
            .reports_directory(PathBuf::from("/tmp/reports"))
            .reports_enabled(false)
            .storage_backend(StorageBackend::Directory)
            .storage_root(PathBuf::from("/tmp/buckets"))
            .logging_level("trace")
            .logging_json(true)
            .connector(connector("a", "/out"))
            .build();

        assert_eq!(cfg.skew_tolerance(), SkewTolerance::from_secs(120));
        assert_eq!(cfg.sync.max_concurrent_executions, 2);
        assert_eq!(cfg.state.database, PathBuf::from("/tmp/db"));
        assert_eq!(cfg.storage.root, PathBuf::from("/tmp/buckets"));
        assert!(cfg.logging.json);
        assert_eq!(cfg.connectors.len(), 1);
    }

    #[test]
    fn builder_build_validated() {
        assert!(ConfigBuilder::new()
            .connector(connector("a", "/out"))
            .build_validated()
            .is_ok());
        let errors = ConfigBuilder::new()
            .tick_interval_secs(0)
            .build_validated()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("transfersync/config.yaml"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "sync.tick_interval_secs".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "sync.tick_interval_secs: must be greater than 0");
    }
}
