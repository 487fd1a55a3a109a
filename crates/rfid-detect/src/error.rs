//! Error types for device detection

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// The device directory could not be listed
    #[error("cannot read device directory {}: {source}", dir.display())]
    DirectoryUnreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Platform serial port enumeration failed
    #[error("failed to enumerate ports: {0}")]
    SerialPort(#[from] serialport::Error),
}
