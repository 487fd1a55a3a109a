//! Application settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rfid_core::ListenerConfig;
use rfid_detect::{DeviceScanner, DiscoveryMode, ScannerConfig, DEFAULT_DEVICE_DIR, DEFAULT_MARKERS};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Shortest read timeout accepted from the settings file
const MIN_READ_TIMEOUT_MS: u64 = 10;

/// Shortest retry delay accepted from the settings file
const MIN_RETRY_DELAY_MS: u64 = 100;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// How long one read waits for a line (milliseconds, at least 10)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Wait before rescanning after no device or a fault (milliseconds, at least 100)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Directory scanned for device nodes
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,
    /// How devices are discovered
    #[serde(default)]
    pub discovery: DiscoveryMode,
    /// Name fragments that identify a reader
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
    /// Print JSON status records instead of human-readable lines
    #[serde(default = "default_true")]
    pub json_status: bool,
    /// Use a simulated reader instead of real hardware
    #[serde(default)]
    pub simulate: bool,
}

fn default_baud_rate() -> u32 {
    rfid_core::DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    rfid_core::DEFAULT_READ_TIMEOUT.as_millis() as u64
}

fn default_retry_delay_ms() -> u64 {
    rfid_core::DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_device_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_DIR)
}

fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            device_dir: default_device_dir(),
            discovery: DiscoveryMode::default(),
            markers: default_markers(),
            json_status: true,
            simulate: false,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for rfid-listener
    /// Uses $XDG_CONFIG_HOME/rfid-listener, falls back to ~/.config/rfid-listener
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("rfid-listener"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("rfid-listener"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings, writing the defaults on first start
    ///
    /// Never fails: an unreadable or malformed file is reported and the
    /// defaults are used instead.
    pub fn load_or_init() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_or_init_at(&path),
            None => {
                warn!("Could not determine settings path, using defaults");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, writing the defaults there if it is missing
    pub fn load_or_init_at(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(Some(settings)) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Ok(None) => {
                let settings = Self::default();
                match settings.save_to(path) {
                    Ok(()) => info!("Wrote default settings to {}", path.display()),
                    Err(e) => warn!("Could not write default settings: {:#}", e),
                }
                settings
            }
            Err(e) => {
                warn!("Ignoring settings: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load settings from a file; `Ok(None)` if it does not exist
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(settings))
    }

    /// Save settings to a file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Listener configuration derived from these settings
    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms.max(MIN_READ_TIMEOUT_MS)),
            retry_delay: Duration::from_millis(self.retry_delay_ms.max(MIN_RETRY_DELAY_MS)),
        }
    }

    /// Device scanner derived from these settings
    pub fn scanner(&self) -> DeviceScanner {
        DeviceScanner::with_source(
            ScannerConfig {
                markers: self.markers.clone(),
            },
            self.discovery.source(&self.device_dir),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rfid-console-{}-{}", name, std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"baud_rate": 115200}"#).unwrap();

        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.retry_delay_ms, 5000);
        assert_eq!(settings.read_timeout_ms, 1000);
        assert_eq!(settings.markers, vec!["ttyUSB", "ttyACM"]);
        assert_eq!(settings.discovery, DiscoveryMode::DevDirectory);
        assert!(settings.json_status);
        assert!(!settings.simulate);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_settings_path("roundtrip");
        let settings = Settings {
            baud_rate: 19200,
            discovery: DiscoveryMode::SerialPorts,
            json_status: false,
            ..Default::default()
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert_eq!(loaded, Some(settings));
    }

    #[test]
    fn test_missing_file_is_none() {
        let path = temp_settings_path("missing");
        assert!(Settings::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_settings_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let result = Settings::load_from(&path);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert!(result.is_err());
    }

    #[test]
    fn test_listener_config() {
        let settings = Settings {
            baud_rate: 57600,
            read_timeout_ms: 250,
            retry_delay_ms: 2000,
            ..Default::default()
        };
        let config = settings.listener_config();

        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_listener_config_enforces_minimum_delays() {
        let settings = Settings {
            read_timeout_ms: 0,
            retry_delay_ms: 0,
            ..Default::default()
        };
        let config = settings.listener_config();

        assert_eq!(config.read_timeout, Duration::from_millis(10));
        assert_eq!(config.retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_first_start_writes_defaults() {
        let path = temp_settings_path("first-start");

        let settings = Settings::load_or_init_at(&path);
        let written = Settings::load_from(&path).unwrap();
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(written, Some(Settings::default()));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let path = temp_settings_path("malformed-init");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let settings = Settings::load_or_init_at(&path);
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(contents, "{ not json");
    }

    #[test]
    fn test_scanner_uses_markers() {
        let settings = Settings {
            markers: vec!["ttyAMA".to_string()],
            ..Default::default()
        };
        let scanner = settings.scanner();

        assert!(scanner.is_candidate("/dev/ttyAMA0"));
        assert!(!scanner.is_candidate("/dev/ttyUSB0"));
    }
}
