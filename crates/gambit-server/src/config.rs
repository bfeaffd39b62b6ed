//! Server configuration.
//!
//! Read from the environment at startup; every knob has a sensible default
//! so a bare `gambit-server` starts a 10-minute-per-side server on port 8080.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use gambit_core::TimeControl;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value we could not parse.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// The offending variable.
        key: &'static str,
        /// What it held.
        value: String,
    },
}

/// Runtime configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket edge listens on. Default: 0.0.0.0:8080.
    pub listen_addr: SocketAddr,
    /// Time control for every game, "minutes+increment". Default: 10+0.
    pub time_control: TimeControl,
    /// How often the clock sweep fires. Default: 250ms.
    pub tick_interval: Duration,
    /// How often active games get a `game_time` sync. Default: 5s.
    pub clock_sync_interval: Duration,
    /// How long a disconnected player may return before forfeiting.
    /// Default: 60s.
    pub disconnect_grace: Duration,
    /// How long finished sessions stay addressable for late reconnects
    /// before eviction. Default: 30s.
    pub eviction_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            time_control: TimeControl::RAPID,
            tick_interval: Duration::from_millis(250),
            clock_sync_interval: Duration::from_secs(5),
            disconnect_grace: Duration::from_secs(60),
            eviction_delay: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Build a configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env("GAMBIT_LISTEN_ADDR") {
            config.listen_addr = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "GAMBIT_LISTEN_ADDR",
                value,
            })?;
        }
        if let Some(value) = env("GAMBIT_TIME_CONTROL") {
            config.time_control =
                TimeControl::parse(&value).ok_or(ConfigError::InvalidValue {
                    key: "GAMBIT_TIME_CONTROL",
                    value,
                })?;
        }
        if let Some(value) = env("GAMBIT_TICK_MS") {
            config.tick_interval = duration_ms("GAMBIT_TICK_MS", value)?;
        }
        if let Some(value) = env("GAMBIT_CLOCK_SYNC_MS") {
            config.clock_sync_interval = duration_ms("GAMBIT_CLOCK_SYNC_MS", value)?;
        }
        if let Some(value) = env("GAMBIT_DISCONNECT_GRACE_MS") {
            config.disconnect_grace = duration_ms("GAMBIT_DISCONNECT_GRACE_MS", value)?;
        }
        if let Some(value) = env("GAMBIT_EVICTION_DELAY_MS") {
            config.eviction_delay = duration_ms("GAMBIT_EVICTION_DELAY_MS", value)?;
        }

        Ok(config)
    }

    /// Validate configuration values. Returns an error if any value is
    /// unusable.
    ///
    /// Checks:
    /// - `tick_interval` is non-zero (a zero interval spins the sweep)
    /// - `clock_sync_interval >= tick_interval` (syncs ride on the sweep)
    /// - `time_control` has a non-zero budget
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "GAMBIT_TICK_MS",
                value: "0".to_string(),
            });
        }
        if self.clock_sync_interval < self.tick_interval {
            return Err(ConfigError::InvalidValue {
                key: "GAMBIT_CLOCK_SYNC_MS",
                value: format!("{}ms", self.clock_sync_interval.as_millis()),
            });
        }
        if self.time_control.initial_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GAMBIT_TIME_CONTROL",
                value: self.time_control.to_string(),
            });
        }
        Ok(())
    }
}

fn env(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn duration_ms(key: &'static str, value: String) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_control, TimeControl::RAPID);
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let config = ServerConfig {
            tick_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sync_faster_than_tick() {
        let config = ServerConfig {
            clock_sync_interval: Duration::from_millis(100),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = ServerConfig {
            time_control: TimeControl::new(0, 0),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_ms_parsing() {
        assert_eq!(
            duration_ms("GAMBIT_TICK_MS", "250".into()).unwrap(),
            Duration::from_millis(250)
        );
        assert!(duration_ms("GAMBIT_TICK_MS", "soon".into()).is_err());
    }
}
