//! Configuration – reads/writes `~/.tipsy/config.toml` and applies
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tipsy_runtime::BehaviorConfig;
use tracing::warn;

/// Persisted configuration stored in `~/.tipsy/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the drive base component.
    #[serde(default = "default_base_name")]
    pub base_name: String,

    /// Behavior engine tunables (the `[behavior]` table).
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

fn default_base_name() -> String {
    "tipsy-base".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_name: default_base_name(),
            behavior: BehaviorConfig::default(),
        }
    }
}

/// Return the path to `~/.tipsy/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tipsy").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path, with environment overrides applied.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Defaults with environment overrides applied, for when no file exists.
pub fn from_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROBOT_BASE`, `TIPSY_BASE` | `base_name` |
/// | `ROBOT_CAMERA`, `TIPSY_CAMERA` | `behavior.camera_name` |
/// | `PAUSE_INTERVAL` (seconds) | `behavior.perception_interval_ms` |
/// | `TIPSY_PERCEPTION_INTERVAL_MS` | `behavior.perception_interval_ms` |
/// | `NUMBER_OF_ULTRASONIC_SENSORS`, `TIPSY_SENSOR_COUNT` | `behavior.sensor_count` |
/// | `TIPSY_IDLE_TIMEOUT_MS` | `behavior.idle_timeout_ms` |
/// | `TIPSY_OBSTACLE_THRESHOLD_M` | `behavior.obstacle_threshold_m` |
/// | `TIPSY_CONFIDENCE_THRESHOLD` | `behavior.confidence_threshold` |
/// | `TIPSY_APPROACH_CLEARANCE_M` | `behavior.approach_clearance_m` |
/// | `TIPSY_PERSON_LABEL` | `behavior.person_label` |
/// | `TIPSY_SAFETY_POLL_INTERVAL_MS` | `behavior.safety_poll_interval_ms` |
///
/// `TIPSY_*` names win over the bare ones.  Unparsable values are ignored
/// with a warning.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["ROBOT_BASE", "TIPSY_BASE"] {
        if let Some(v) = lookup(key) {
            cfg.base_name = v;
        }
    }

    let b = &mut cfg.behavior;
    for key in ["ROBOT_CAMERA", "TIPSY_CAMERA"] {
        if let Some(v) = lookup(key) {
            b.camera_name = v;
        }
    }
    if let Some(v) = lookup("PAUSE_INTERVAL")
        && let Some(ms) = parse_or_warn("PAUSE_INTERVAL", &v, parse_seconds_as_ms)
    {
        b.perception_interval_ms = ms;
    }
    if let Some(v) = lookup("TIPSY_PERCEPTION_INTERVAL_MS")
        && let Some(ms) = parse_or_warn("TIPSY_PERCEPTION_INTERVAL_MS", &v, |s| s.parse().ok())
    {
        b.perception_interval_ms = ms;
    }
    for key in ["NUMBER_OF_ULTRASONIC_SENSORS", "TIPSY_SENSOR_COUNT"] {
        if let Some(v) = lookup(key)
            && let Some(n) = parse_or_warn(key, &v, |s| s.parse().ok())
        {
            b.sensor_count = n;
        }
    }
    if let Some(v) = lookup("TIPSY_IDLE_TIMEOUT_MS")
        && let Some(ms) = parse_or_warn("TIPSY_IDLE_TIMEOUT_MS", &v, |s| s.parse().ok())
    {
        b.idle_timeout_ms = ms;
    }
    if let Some(v) = lookup("TIPSY_OBSTACLE_THRESHOLD_M")
        && let Some(m) = parse_or_warn("TIPSY_OBSTACLE_THRESHOLD_M", &v, |s| s.parse().ok())
    {
        b.obstacle_threshold_m = m;
    }
    if let Some(v) = lookup("TIPSY_CONFIDENCE_THRESHOLD")
        && let Some(c) = parse_or_warn("TIPSY_CONFIDENCE_THRESHOLD", &v, |s| s.parse().ok())
    {
        b.confidence_threshold = c;
    }
    if let Some(v) = lookup("TIPSY_APPROACH_CLEARANCE_M")
        && let Some(m) = parse_or_warn("TIPSY_APPROACH_CLEARANCE_M", &v, |s| s.parse().ok())
    {
        b.approach_clearance_m = m;
    }
    if let Some(v) = lookup("TIPSY_PERSON_LABEL") {
        b.person_label = v;
    }
    if let Some(v) = lookup("TIPSY_SAFETY_POLL_INTERVAL_MS")
        && let Some(ms) = parse_or_warn("TIPSY_SAFETY_POLL_INTERVAL_MS", &v, |s| s.parse().ok())
    {
        b.safety_poll_interval_ms = ms;
    }
}

fn parse_or_warn<T>(key: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(variable = key, value = raw, "Ignoring unparsable environment override");
    }
    parsed
}

/// `"2.5"` → `2500`.  Rejects negative and non-finite values.
fn parse_seconds_as_ms(raw: &str) -> Option<u64> {
    let secs: f64 = raw.parse().ok()?;
    Duration::try_from_secs_f64(secs)
        .ok()
        .map(|d| d.as_millis() as u64)
}

/// Save the config to disk, creating `~/.tipsy/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
