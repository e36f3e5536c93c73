//! Application settings for the arm controller

use crate::core::playback::PlaybackConfig;
use crate::core::transport::Transport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Playback flow-control settings
    pub playback: PlaybackSettings,
    /// Manual control settings
    pub control: ControlSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            playback: PlaybackSettings::default(),
            control: ControlSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load config from file
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = super::config_dir()
            .ok_or("Could not determine config directory")?
            .join("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = super::config_dir()
            .ok_or("Could not determine config directory")?
            .join("config.toml");

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Transports to probe on connect, tried strictly in order
    pub candidates: Vec<Transport>,
    /// Serial baud rate
    pub baud_rate: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        // Bluetooth is preferred; twenty USB adapter slots behind it.
        let mut candidates = vec![Transport::Bluetooth {
            device: "/dev/rfcomm0".to_string(),
        }];
        candidates.extend((0..20).map(|index| Transport::Usb { index }));
        Self {
            candidates,
            baud_rate: 9600,
        }
    }
}

/// Playback flow-control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Longest wait for the ready byte per line (seconds)
    pub ready_timeout_secs: u64,
    /// Pause between ready polls (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 30,
            poll_interval_ms: 5,
        }
    }
}

impl PlaybackSettings {
    /// Engine configuration with these values applied
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Manual control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Step size for arrow-key style moves (degrees)
    pub step_degrees: u32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self { step_degrees: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::TransportKind;

    #[test]
    fn test_default_probe_order_starts_with_bluetooth() {
        let config = AppConfig::default();
        let kinds: Vec<TransportKind> = config
            .connection
            .candidates
            .iter()
            .map(Transport::kind)
            .collect();
        assert_eq!(kinds.len(), 21);
        assert_eq!(kinds[0], TransportKind::Bluetooth);
        assert!(kinds[1..].iter().all(|kind| *kind == TransportKind::Usb));
    }

    #[test]
    fn test_config_survives_toml_round_trip() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.connection.baud_rate, 9600);
        assert_eq!(back.playback.ready_timeout_secs, 30);
        assert_eq!(back.control.step_degrees, 10);
    }
}
