//! Configuration loader with file resolution and environment overrides.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use crate::sequencer::TimeoutPolicy;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "AT_TEST";

/// Config file name
const CONFIG_FILE_NAME: &str = "at-test.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "AT_TEST_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `AT_TEST_CONFIG` environment variable (explicit path)
    /// 2. `./at-test.toml` (current directory)
    /// 3. `$XDG_CONFIG_HOME/at-test/at-test.toml` or `~/.config/at-test/at-test.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Built-in defaults with no file and no environment.
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_config_dir()
        .map(|dir| dir.join("at-test").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn get_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply `AT_TEST_<SECTION>_<KEY>` overrides from the process environment.
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_overrides_from(config, |var| std::env::var(var).ok())
}

/// Apply overrides using an arbitrary variable lookup.
///
/// Recognised keys:
/// - `AT_TEST_SERIAL_PORT`, `AT_TEST_SERIAL_BAUD`, `AT_TEST_SERIAL_READ_TIMEOUT_MS`
/// - `AT_TEST_SEQUENCER_RESPONSE_TIMEOUT_MS`, `AT_TEST_SEQUENCER_INTER_COMMAND_DELAY_MS`,
///   `AT_TEST_SEQUENCER_ON_TIMEOUT`
/// - `AT_TEST_LOGGING_VERBOSE`, `AT_TEST_LOGGING_LEVEL`
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| format!("{ENV_PREFIX}_{key}");

    if let Some(val) = lookup(&var("SERIAL_PORT")) {
        config.serial.port = val;
    }
    if let Some(val) = lookup(&var("SERIAL_BAUD")) {
        config.serial.baud = parse_env(&var("SERIAL_BAUD"), &val, "Invalid baud rate")?;
    }
    if let Some(val) = lookup(&var("SERIAL_READ_TIMEOUT_MS")) {
        config.serial.read_timeout_ms =
            parse_env(&var("SERIAL_READ_TIMEOUT_MS"), &val, "Invalid timeout")?;
    }

    if let Some(val) = lookup(&var("SEQUENCER_RESPONSE_TIMEOUT_MS")) {
        config.sequencer.response_timeout_ms =
            parse_env(&var("SEQUENCER_RESPONSE_TIMEOUT_MS"), &val, "Invalid timeout")?;
    }
    if let Some(val) = lookup(&var("SEQUENCER_INTER_COMMAND_DELAY_MS")) {
        config.sequencer.inter_command_delay_ms =
            parse_env(&var("SEQUENCER_INTER_COMMAND_DELAY_MS"), &val, "Invalid delay")?;
    }
    if let Some(val) = lookup(&var("SEQUENCER_ON_TIMEOUT")) {
        config.sequencer.on_timeout = TimeoutPolicy::from_str(&val)
            .map_err(|msg| ConfigError::env_parse(var("SEQUENCER_ON_TIMEOUT"), msg))?;
    }

    if let Some(val) = lookup(&var("LOGGING_VERBOSE")) {
        config.logging.verbose = val.eq_ignore_ascii_case("true") || val == "1";
    }
    if let Some(val) = lookup(&var("LOGGING_LEVEL")) {
        config.logging.level = val;
    }

    Ok(())
}

fn parse_env<T: FromStr>(var: &str, val: &str, message: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("{message}: {val:?}")))
}
