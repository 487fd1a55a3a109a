//! Device scanner
//!
//! Lists candidate reader endpoints. A candidate is any entry whose name
//! contains one of the configured marker substrings. An empty result is not an
//! error; it just means no reader is plugged in right now.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serialport::available_ports;
use tracing::{debug, trace};

use crate::error::DetectError;

/// Name fragments used by the Linux USB-serial drivers
pub const DEFAULT_MARKERS: &[&str] = &["ttyUSB", "ttyACM"];

/// Directory holding character device nodes
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

/// Something that can produce the current list of device entries
pub trait DeviceSource: Send + Sync {
    /// Return the current entries, in a stable order
    fn list(&self) -> Result<Vec<String>, DetectError>;
}

/// Lists the entries of a device directory
///
/// Entries are sorted by name so that repeated scans of an unchanged directory
/// yield the same order.
#[derive(Debug, Clone)]
pub struct DevDirectory {
    dir: PathBuf,
}

impl DevDirectory {
    /// Create a source over the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for DevDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_DIR)
    }
}

impl DeviceSource for DevDirectory {
    fn list(&self) -> Result<Vec<String>, DetectError> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(|source| DetectError::DirectoryUnreadable {
                dir: self.dir.clone(),
                source,
            })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| self.dir.join(name).to_string_lossy().into_owned())
            .collect())
    }
}

/// Lists ports through the serialport crate's platform enumeration
#[derive(Debug, Clone, Default)]
pub struct SerialPortSource;

impl DeviceSource for SerialPortSource {
    fn list(&self) -> Result<Vec<String>, DetectError> {
        let ports = available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

/// In-memory listing that can be changed while a scanner is using it
///
/// Clones share the same listing, so a test or a simulated setup can keep one
/// handle and plug or unplug devices through it.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    entries: Arc<Mutex<Vec<String>>>,
}

impl StaticSource {
    /// Create a source with an initial listing
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Arc::new(Mutex::new(entries.into_iter().map(Into::into).collect())),
        }
    }

    /// Replace the listing
    pub fn set<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        *guard = entries.into_iter().map(Into::into).collect();
    }
}

impl DeviceSource for StaticSource {
    fn list(&self) -> Result<Vec<String>, DetectError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// How the scanner discovers entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Read the device directory
    #[default]
    DevDirectory,
    /// Use the platform serial port enumeration
    SerialPorts,
}

impl DiscoveryMode {
    /// Build the matching source
    pub fn source(self, device_dir: impl Into<PathBuf>) -> Box<dyn DeviceSource> {
        match self {
            DiscoveryMode::DevDirectory => Box::new(DevDirectory::new(device_dir)),
            DiscoveryMode::SerialPorts => Box::new(SerialPortSource),
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// An entry is a candidate if its name contains any of these
    pub markers: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Device scanner
pub struct DeviceScanner {
    config: ScannerConfig,
    source: Box<dyn DeviceSource>,
}

impl DeviceScanner {
    /// Create a scanner over `/dev` with the default markers
    pub fn new() -> Self {
        Self::with_source(ScannerConfig::default(), Box::new(DevDirectory::default()))
    }

    /// Create a scanner with custom configuration and source
    pub fn with_source(config: ScannerConfig, source: Box<dyn DeviceSource>) -> Self {
        Self { config, source }
    }

    /// List the source and keep only candidate entries
    pub fn scan(&self) -> Result<Vec<String>, DetectError> {
        let entries = self.source.list()?;
        trace!("Device source returned {} entries", entries.len());

        let candidates = self.filter(entries);
        if candidates.is_empty() {
            debug!("No reader candidates found");
        } else {
            debug!("Found {} reader candidate(s): {:?}", candidates.len(), candidates);
        }

        Ok(candidates)
    }

    /// Keep the entries whose name carries a marker, preserving order
    pub fn filter(&self, entries: Vec<String>) -> Vec<String> {
        entries
            .into_iter()
            .filter(|entry| self.is_candidate(entry))
            .collect()
    }

    /// Check an entry against the marker list
    ///
    /// Only the final path component is matched, so a full path like
    /// `/dev/ttyUSB0` and a bare name like `ttyUSB0` are treated the same.
    pub fn is_candidate(&self, entry: &str) -> bool {
        let name = entry_name(entry);
        self.config
            .markers
            .iter()
            .any(|marker| name.contains(marker.as_str()))
    }
}

impl Default for DeviceScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_name(entry: &str) -> &str {
    Path::new(entry)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(entry)
}
