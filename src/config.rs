use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::session::SessionConfig;
use crate::step::SessionMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// ROM reported when a session saw no angle data at all.
    pub fallback_rom_deg: f64,
    pub capture_duration_ms: i64,
    pub countdown_secs: u32,
    pub strict_window: bool,
    pub tick_rate_ms: u64,
    /// Interval between readings from the simulated brace.
    pub simulated_sample_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_rom_deg: 90.0,
            capture_duration_ms: 3000,
            countdown_secs: 3,
            strict_window: false,
            tick_rate_ms: 100,
            simulated_sample_ms: 50,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick_rate_ms must be greater than zero")]
    ZeroTickRate,

    #[error("countdown_secs must be at least 1")]
    ZeroCountdown,

    #[error(
        "capture_duration_ms ({duration_ms}) does not match countdown_secs ({countdown_secs})"
    )]
    CountdownMismatch {
        duration_ms: i64,
        countdown_secs: u32,
    },

    #[error("fallback_rom_deg must be a finite angle, got {0}")]
    InvalidFallback(f64),
}

impl Config {
    /// The countdown ticks once per second, so it must cover the capture
    /// window exactly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_ms == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.countdown_secs == 0 {
            return Err(ConfigError::ZeroCountdown);
        }
        if self.capture_duration_ms != i64::from(self.countdown_secs) * 1000 {
            return Err(ConfigError::CountdownMismatch {
                duration_ms: self.capture_duration_ms,
                countdown_secs: self.countdown_secs,
            });
        }
        if !self.fallback_rom_deg.is_finite() {
            return Err(ConfigError::InvalidFallback(self.fallback_rom_deg));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    pub fn session_config(&self, mode: SessionMode) -> Result<SessionConfig, ConfigError> {
        self.validate()?;
        Ok(SessionConfig {
            mode,
            fallback_rom_deg: self.fallback_rom_deg,
            capture_duration_ms: self.capture_duration_ms,
            countdown_secs: self.countdown_secs,
            strict_window: self.strict_window,
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "rightangle") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("rightangle_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => match cfg.validate() {
                    Ok(()) => return cfg,
                    Err(e) => tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "ignoring invalid config"
                    ),
                },
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring malformed config"
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "fallback_rom_deg": 110.0 }"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.fallback_rom_deg, 110.0);
        assert_eq!(cfg.countdown_secs, 3);
    }

    #[test]
    fn malformed_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn session_config_carries_mode() {
        let cfg = Config {
            fallback_rom_deg: 100.0,
            strict_window: true,
            ..Config::default()
        };
        let session = cfg.session_config(SessionMode::Baseline).unwrap();
        assert_eq!(session.mode, SessionMode::Baseline);
        assert_eq!(session.fallback_rom_deg, 100.0);
        assert!(session.strict_window);
        assert_eq!(session.capture_duration_ms, 3000);
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let cfg = Config {
            tick_rate_ms: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTickRate));
        assert!(cfg.session_config(SessionMode::Regular).is_err());
    }

    #[test]
    fn countdown_must_match_capture_duration() {
        let cfg = Config {
            countdown_secs: 5,
            ..Config::default()
        };
        assert_eq!(
            cfg.session_config(SessionMode::Regular),
            Err(ConfigError::CountdownMismatch {
                duration_ms: 3000,
                countdown_secs: 5,
            })
        );

        let longer = Config {
            countdown_secs: 5,
            capture_duration_ms: 5000,
            ..Config::default()
        };
        assert!(longer.session_config(SessionMode::Regular).is_ok());
        assert_eq!(
            Config {
                countdown_secs: 0,
                capture_duration_ms: 0,
                ..Config::default()
            }
            .validate(),
            Err(ConfigError::ZeroCountdown)
        );
    }

    #[test]
    fn invalid_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "tick_rate_ms": 0 }"#).unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }
}
