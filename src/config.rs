use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::broadcast::BroadcastPolicy;

pub const BIND_ADDR_VAR: &str = "RELAY_BIND_ADDR";
pub const BROADCAST_MODE_VAR: &str = "RELAY_BROADCAST_MODE";
pub const BROADCAST_INTERVAL_VAR: &str = "RELAY_BROADCAST_INTERVAL_MS";
pub const SPAWN_RADIUS_VAR: &str = "RELAY_SPAWN_RADIUS";
pub const SPAWN_HEIGHT_VAR: &str = "RELAY_SPAWN_HEIGHT";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} is not a valid value: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("{var} must be {requirement}")]
    OutOfRange {
        var: &'static str,
        requirement: &'static str,
    },
}

/// Where freshly joined avatars are dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnArea {
    /// Half-width of the square around the origin on the x/z plane
    pub radius: f64,
    pub height: f64,
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            radius: 2.0,
            height: 1.6,
        }
    }
}

/// Runtime configuration for the relay server
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub broadcast: BroadcastPolicy,
    pub spawn: SpawnArea,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            broadcast: BroadcastPolicy::OnChange,
            spawn: SpawnArea::default(),
        }
    }
}

impl RelayConfig {
    /// Reads configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds configuration from an arbitrary variable source; unset variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(BIND_ADDR_VAR) {
            config.bind_addr = parse(BIND_ADDR_VAR, &value)?;
        }

        if let Some(value) = lookup(SPAWN_RADIUS_VAR) {
            let radius: f64 = parse(SPAWN_RADIUS_VAR, &value)?;
            if !radius.is_finite() || radius < 0.0 {
                return Err(ConfigError::OutOfRange {
                    var: SPAWN_RADIUS_VAR,
                    requirement: "a finite number >= 0",
                });
            }
            config.spawn.radius = radius;
        }

        if let Some(value) = lookup(SPAWN_HEIGHT_VAR) {
            let height: f64 = parse(SPAWN_HEIGHT_VAR, &value)?;
            if !height.is_finite() {
                return Err(ConfigError::OutOfRange {
                    var: SPAWN_HEIGHT_VAR,
                    requirement: "a finite number",
                });
            }
            config.spawn.height = height;
        }

        let interval_ms: u64 = match lookup(BROADCAST_INTERVAL_VAR) {
            Some(value) => parse(BROADCAST_INTERVAL_VAR, &value)?,
            None => 50,
        };
        if interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                var: BROADCAST_INTERVAL_VAR,
                requirement: "greater than zero",
            });
        }

        config.broadcast = match lookup(BROADCAST_MODE_VAR).as_deref() {
            None | Some("on_change") => BroadcastPolicy::OnChange,
            Some("interval") => BroadcastPolicy::Interval(Duration::from_millis(interval_ms)),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: BROADCAST_MODE_VAR,
                    value: other.to_string(),
                })
            }
        };

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
