//! Runtime configuration
//!
//! All knobs the runtime recognizes at boot, loadable from a TOML file and
//! overridable from the environment. Environment wins over file, file wins
//! over defaults. A malformed value is an error, never a silent default.
//!
//! | Key | Env var | Default | Meaning |
//! |-----|---------|---------|---------|
//! | `heap-limit` | `VAU_HEAP_LIMIT` | 65536 | Cell count ceiling |
//! | `symbol-buffer-size` | `VAU_SYMBOL_BUFFER_SIZE` | 16384 | Intern buffer bytes |
//! | `gc-mode` | `VAU_GC_MODE` | `stop-the-world` | Collector execution mode |
//! | `gc-skip` | `VAU_GC_SKIP` | 256 | Dispatches between concurrent GC cycles |
//! | `watchdog-budget` | `VAU_WATCHDOG_BUDGET` | 0 (off) | Dispatch budget before abort |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the collector is scheduled relative to message dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GcMode {
    /// Collect in one pass when the event queue drains.
    StopTheWorld,
    /// The collector is an actor; mark and sweep are separate dispatches
    /// interleaved with user events.
    ConcurrentMultiphase,
    /// The collector is an actor; one dispatch performs a whole cycle.
    ConcurrentSinglePass,
}

impl GcMode {
    pub fn is_concurrent(self) -> bool {
        !matches!(self, GcMode::StopTheWorld)
    }
}

impl FromStr for GcMode {
    type Err = String;

    fn from_str(s: &str) -> Result<GcMode, String> {
        match s {
            "stop-the-world" => Ok(GcMode::StopTheWorld),
            "concurrent-multiphase" => Ok(GcMode::ConcurrentMultiphase),
            "concurrent-single-pass" => Ok(GcMode::ConcurrentSinglePass),
            other => Err(format!(
                "unknown gc mode {other:?} (expected stop-the-world, \
                 concurrent-multiphase, or concurrent-single-pass)"
            )),
        }
    }
}

impl std::fmt::Display for GcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GcMode::StopTheWorld => "stop-the-world",
            GcMode::ConcurrentMultiphase => "concurrent-multiphase",
            GcMode::ConcurrentSinglePass => "concurrent-single-pass",
        };
        f.write_str(s)
    }
}

/// Configuration errors: unreadable file, unparseable TOML, or a bad
/// environment value.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => {
                write!(f, "cannot read config {}: {e}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "cannot parse config: {e}"),
            ConfigError::InvalidEnv { var, value, reason } => {
                write!(f, "invalid {var}={value:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::InvalidEnv { .. } => None,
        }
    }
}

/// The boot-time knobs of a [`crate::Runtime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Cell count ceiling for the heap.
    pub heap_limit: usize,
    /// Byte ceiling for the symbol intern buffer.
    pub symbol_buffer_size: usize,
    /// Collector scheduling mode.
    pub gc_mode: GcMode,
    /// Dispatches between concurrent collection cycles.
    pub gc_skip: usize,
    /// Dispatch budget before the watchdog sends abort. 0 disables it.
    pub watchdog_budget: u64,
}

impl Default for RuntimeConfig {
    fn default() -> RuntimeConfig {
        RuntimeConfig {
            heap_limit: 65536,
            symbol_buffer_size: 16384,
            gc_mode: GcMode::StopTheWorld,
            gc_skip: 256,
            watchdog_budget: 0,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<RuntimeConfig, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Parse)
    }

    /// Load a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<RuntimeConfig, ConfigError> {
        let mut config = RuntimeConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply any `VAU_*` overrides present in the environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<usize>("VAU_HEAP_LIMIT")? {
            self.heap_limit = v;
        }
        if let Some(v) = env_parse::<usize>("VAU_SYMBOL_BUFFER_SIZE")? {
            self.symbol_buffer_size = v;
        }
        if let Ok(raw) = std::env::var("VAU_GC_MODE") {
            self.gc_mode = raw.parse().map_err(|reason| ConfigError::InvalidEnv {
                var: "VAU_GC_MODE",
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(v) = env_parse::<usize>("VAU_GC_SKIP")? {
            self.gc_skip = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("VAU_WATCHDOG_BUDGET")? {
            self.watchdog_budget = v;
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                var,
                value: raw,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
