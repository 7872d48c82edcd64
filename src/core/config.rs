//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! The library itself only needs a [`RuntimeConfig`]. The file/env/CLI layers
//! are used by the `actuator` binary. Config lives at
//! `~/.actuator/config.toml`; if missing on first run, a commented-out default
//! is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Runtime Config (what an Actuator consumes)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Prefix for log lines, to tell several actuators apart.
    pub label: String,
    /// Effects that have not settled by then count as failed.
    pub effect_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            effect_timeout: None,
        }
    }
}

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ActuatorConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RuntimeSection {
    pub label: Option<String>,
    pub effect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingSection {
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StoreSection {
    pub path: Option<String>,
    pub autosave_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_LABEL: &str = "actuator";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
pub const DEFAULT_LOG_FILE: &str = "actuator.log";
pub const DEFAULT_STORE_FILE: &str = "todos.json";
pub const DEFAULT_AUTOSAVE_MS: u64 = 500;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub runtime: RuntimeConfig,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
    pub store_path: PathBuf,
    pub autosave_delay: Duration,
}

/// Values given on the command line (None = not specified).
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub effect_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.actuator/`.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".actuator"))
}

/// Returns the path to `~/.actuator/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    home_dir().map(|dir| dir.join("config.toml"))
}

/// Load config from `~/.actuator/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ActuatorConfig::default()`.
pub fn load_config() -> Result<ActuatorConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ActuatorConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ActuatorConfig::default());
    }

    load_config_from(&path)
}

/// Load config from an explicit path. A missing file is an error here.
pub fn load_config_from(path: &Path) -> Result<ActuatorConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ActuatorConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Actuator Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [runtime]
# label = "actuator"                 # prefix for log lines
# effect_timeout_ms = 30000          # or ACTUATOR_EFFECT_TIMEOUT_MS; unset = no timeout

# [logging]
# level = "info"                     # or ACTUATOR_LOG_LEVEL: off, error, warn, info, debug, trace
# The log file is set with --log-file or ACTUATOR_LOG_FILE only.

# [store]
# path = "~/.actuator/todos.json"    # or ACTUATOR_STORE_PATH
# autosave_ms = 500
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &ActuatorConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`], reading environment variables through `env`.
pub fn resolve_with_env(
    config: &ActuatorConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Effect timeout: CLI → env → config → none
    let effect_timeout_ms = cli
        .effect_timeout_ms
        .or_else(|| env("ACTUATOR_EFFECT_TIMEOUT_MS").and_then(|v| parse_or_warn(&v)))
        .or(config.runtime.effect_timeout_ms);

    // Log level: CLI → env → config → default
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| env("ACTUATOR_LOG_LEVEL"))
        .or_else(|| config.logging.level.clone())
        .and_then(|level| parse_or_warn::<LevelFilter>(&level))
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // Store path: CLI → env → config → ~/.actuator/todos.json
    let store_path = cli
        .store_path
        .clone()
        .or_else(|| env("ACTUATOR_STORE_PATH").map(PathBuf::from))
        .or_else(|| config.store.path.as_deref().map(expand_home))
        .unwrap_or_else(default_store_path);

    ResolvedConfig {
        runtime: RuntimeConfig {
            label: config
                .runtime
                .label
                .clone()
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            effect_timeout: effect_timeout_ms.map(Duration::from_millis),
        },
        log_level,
        log_file: resolve_log_file(cli, &env),
        store_path,
        autosave_delay: Duration::from_millis(
            config.store.autosave_ms.unwrap_or(DEFAULT_AUTOSAVE_MS),
        ),
    }
}

/// Log file: CLI → env → `actuator.log`.
///
/// Never read from the config file: the logger starts before the file is
/// loaded, so config loading itself gets logged.
pub fn resolve_log_file(cli: &CliOverrides, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    cli.log_file
        .clone()
        .or_else(|| env("ACTUATOR_LOG_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

fn parse_or_warn<T: FromStr>(value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring invalid config value: {:?}", value);
            None
        }
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn default_store_path() -> PathBuf {
    home_dir()
        .map(|dir| dir.join(DEFAULT_STORE_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
}
