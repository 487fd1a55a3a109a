//! RFID Reader Device Detection Library
//!
//! This crate finds serial endpoints that look like a USB-to-serial
//! attached reader (`ttyUSB*`, `ttyACM*`). Discovery is re-run on every
//! call so hot-plugged devices show up without a restart.
//!
//! # Example
//!
//! ```rust,no_run
//! use rfid_detect::DeviceScanner;
//!
//! let scanner = DeviceScanner::new();
//! let candidates = scanner.scan().unwrap();
//!
//! for path in candidates {
//!     println!("Found device: {}", path);
//! }
//! ```

pub mod error;
pub mod scanner;

pub use error::DetectError;
pub use scanner::{
    DevDirectory, DeviceScanner, DeviceSource, DiscoveryMode, ScannerConfig, SerialPortSource,
    StaticSource, DEFAULT_DEVICE_DIR, DEFAULT_MARKERS,
};
