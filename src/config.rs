//! Plugin configuration supplied by the host as a JSON options object.
//! Every field has a default; invalid ranges are reset, never rejected.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_MIN_VOLUME: i32 = 20;
pub const DEFAULT_MAX_VOLUME: i32 = 100;
pub const DEFAULT_MIN_SPEED_MS: u32 = 100;
pub const DEFAULT_MAX_SPEED_MS: u32 = 500;
pub const DEFAULT_GAME_DURATION_MINUTES: u64 = 30;
/// One week. Longer rounds are clamped.
pub const MAX_GAME_DURATION_MINUTES: u64 = 7 * 24 * 60;

/// Volume envelope bounds. Volumes are percentages (100 = original loudness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VolumeEnvelopeConfig {
    pub min_volume: i32,
    pub max_volume: i32,
    pub min_speed_ms: u32,
    pub max_speed_ms: u32,
}

impl Default for VolumeEnvelopeConfig {
    fn default() -> Self {
        Self {
            min_volume: DEFAULT_MIN_VOLUME,
            max_volume: DEFAULT_MAX_VOLUME,
            min_speed_ms: DEFAULT_MIN_SPEED_MS,
            max_speed_ms: DEFAULT_MAX_SPEED_MS,
        }
    }
}

impl VolumeEnvelopeConfig {
    /// Reset each inverted or empty range to its default, logging a warning per reset.
    pub fn validated(mut self) -> Self {
        if self.min_volume >= self.max_volume {
            warn!(
                min_volume = self.min_volume,
                max_volume = self.max_volume,
                "volume range invalid, reset to 20-100"
            );
            self.min_volume = DEFAULT_MIN_VOLUME;
            self.max_volume = DEFAULT_MAX_VOLUME;
        }
        if self.min_speed_ms >= self.max_speed_ms {
            warn!(
                min_speed_ms = self.min_speed_ms,
                max_speed_ms = self.max_speed_ms,
                "speed range invalid, reset to 100-500ms"
            );
            self.min_speed_ms = DEFAULT_MIN_SPEED_MS;
            self.max_speed_ms = DEFAULT_MAX_SPEED_MS;
        }
        self
    }
}

/// Top-level plugin options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub volume_config: VolumeEnvelopeConfig,
    /// Game session length in minutes.
    pub kailu_game_duration: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            volume_config: VolumeEnvelopeConfig::default(),
            kailu_game_duration: DEFAULT_GAME_DURATION_MINUTES,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl PluginConfig {
    /// Build from the host's options object. Ranges are validated.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: PluginConfig = serde_json::from_value(value)?;
        Ok(config.validated())
    }

    /// Load from a JSON file on disk. Ranges are validated.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PluginConfig = serde_json::from_str(&content)?;
        Ok(config.validated())
    }

    pub fn validated(mut self) -> Self {
        self.volume_config = self.volume_config.validated();
        if self.kailu_game_duration > MAX_GAME_DURATION_MINUTES {
            warn!(
                kailu_game_duration = self.kailu_game_duration,
                max = MAX_GAME_DURATION_MINUTES,
                "game duration too long, clamped"
            );
            self.kailu_game_duration = MAX_GAME_DURATION_MINUTES;
        }
        self
    }

    pub fn game_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.kailu_game_duration.saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_when_empty() {
        let config = PluginConfig::from_value(json!({})).unwrap();
        assert_eq!(config, PluginConfig::default());
        assert_eq!(config.game_duration().as_secs(), 30 * 60);
    }

    #[test]
    fn test_invalid_volume_range_resets() {
        let config = PluginConfig::from_value(json!({
            "volume_config": { "min_volume": 80, "max_volume": 80, "min_speed_ms": 50, "max_speed_ms": 90 }
        }))
        .unwrap();
        assert_eq!(config.volume_config.min_volume, 20);
        assert_eq!(config.volume_config.max_volume, 100);
        // speed range was valid and is kept
        assert_eq!(config.volume_config.min_speed_ms, 50);
        assert_eq!(config.volume_config.max_speed_ms, 90);
    }

    #[test]
    fn test_invalid_speed_range_resets() {
        let config = PluginConfig::from_value(json!({
            "volume_config": { "min_speed_ms": 900, "max_speed_ms": 200 },
            "kailu_game_duration": 5
        }))
        .unwrap();
        assert_eq!(config.volume_config.min_speed_ms, 100);
        assert_eq!(config.volume_config.max_speed_ms, 500);
        assert_eq!(config.kailu_game_duration, 5);
    }

    #[test]
    fn test_huge_game_duration_is_clamped() {
        let config = PluginConfig::from_value(json!({ "kailu_game_duration": 1u64 << 60 })).unwrap();
        assert_eq!(config.kailu_game_duration, MAX_GAME_DURATION_MINUTES);
        assert_eq!(config.game_duration().as_secs(), MAX_GAME_DURATION_MINUTES * 60);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config = PluginConfig::from_value(json!({ "something_else": true })).unwrap();
        assert_eq!(config.kailu_game_duration, 30);
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let err = PluginConfig::from_value(json!({ "kailu_game_duration": "long" })).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
