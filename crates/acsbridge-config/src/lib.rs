//! Shared configuration for acsbridge front ends.
//!
//! TOML profiles, sync tuning, catalog overrides, credential resolution
//! (env + keyring + plaintext), and translation to the runtime types in
//! `acsbridge_core`. The CLI layers its own flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use acsbridge_core::{AcsConfig, CatalogOverride, PathCatalog, RetryPolicy, SyncConfig, TlsVerification};

/// Keyring service name under which profile passwords are stored.
pub const KEYRING_SERVICE: &str = "acsbridge";

const ENV_PREFIX: &str = "ACSBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named ACS profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
            sync: SyncSettings::default(),
            catalog: CatalogSettings::default(),
        }
    }
}

impl Config {
    /// Built-in catalog with this file's overrides applied.
    pub fn path_catalog(&self) -> PathCatalog {
        PathCatalog::with_overrides(&self.catalog.overrides)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Ask the ACS for a connection request when submitting changes.
    #[serde(default = "default_wake")]
    pub wake: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            wake: default_wake(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_wake() -> bool {
    true
}

/// A named ACS profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// NBI base URL (e.g., "http://acs.example.net:7557").
    pub nbi_url: String,

    /// Username for HTTP basic auth in front of the NBI.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// How long the ACS may hold a task request open (seconds).
    pub task_wait: Option<u64>,
}

/// `[sync]` table. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    pub dispatch_timeout: u64,
    pub max_attempts: u32,
    pub retry_initial_delay: u64,
    pub retry_max_delay: u64,
    pub retry_multiplier: f64,
    pub confirm_delay: u64,
    pub confirm_interval: u64,
    pub confirm_attempts: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Self {
            dispatch_timeout: sync.dispatch_timeout.as_secs(),
            max_attempts: sync.retry.max_attempts,
            retry_initial_delay: sync.retry.initial_delay.as_secs(),
            retry_max_delay: sync.retry.max_delay.as_secs(),
            retry_multiplier: sync.retry.multiplier,
            confirm_delay: sync.confirm_delay.as_secs(),
            confirm_interval: sync.confirm_interval.as_secs(),
            confirm_attempts: sync.confirm_attempts,
        }
    }
}

impl SyncSettings {
    /// Validate and convert into the controller's tuning.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid("sync.max_attempts", "must be at least 1"));
        }
        if self.confirm_attempts == 0 {
            return Err(invalid("sync.confirm_attempts", "must be at least 1"));
        }
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            return Err(invalid("sync.retry_multiplier", "must be a number >= 1.0"));
        }
        if self.dispatch_timeout == 0 {
            return Err(invalid("sync.dispatch_timeout", "must be greater than zero"));
        }

        Ok(SyncConfig {
            dispatch_timeout: Duration::from_secs(self.dispatch_timeout),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_delay: Duration::from_secs(self.retry_initial_delay),
                max_delay: Duration::from_secs(self.retry_max_delay),
                multiplier: self.retry_multiplier,
            },
            confirm_delay: Duration::from_secs(self.confirm_delay),
            confirm_interval: Duration::from_secs(self.confirm_interval),
            confirm_attempts: self.confirm_attempts,
        })
    }
}

/// `[catalog]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogSettings {
    /// Extra path candidates, tried before the built-in ones.
    #[serde(default)]
    pub overrides: Vec<CatalogOverride>,
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "acsbridge", "acsbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("acsbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file, then `ACSBRIDGE_*` environment variables.
///
/// Nested keys use a double underscore: `ACSBRIDGE_SYNC__CONFIRM_ATTEMPTS=3`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve basic-auth credentials for a profile.
///
/// A profile without a username talks to the NBI unauthenticated. With a
/// username, the password comes from `password_env`, then the system
/// keyring, then the plaintext `password` field.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<(String, SecretString)>, ConfigError> {
    let Some(username) = profile.username.clone() else {
        return Ok(None);
    };

    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok(Some((username, SecretString::from(pw))));
        }
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(Some((username, SecretString::from(pw))));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(Some((username, SecretString::from(pw.clone()))));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Parse and check an NBI URL.
pub fn parse_nbi_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "nbi_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "nbi_url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Build an `AcsConfig` from a profile, with no command-line overrides.
pub fn profile_to_acs_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<AcsConfig, ConfigError> {
    let url = parse_nbi_url(&profile.nbi_url)?;
    let credentials = resolve_credentials(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut acs = AcsConfig::new(url);
    acs.credentials = credentials;
    acs.tls = tls;
    acs.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    acs.task_wait = profile.task_wait.map(Duration::from_secs);
    Ok(acs)
}
