//! RFID Reader Listener Core
//!
//! This crate holds the read loop that turns a USB-serial RFID reader into a
//! stream of scan codes.
//!
//! # Architecture
//!
//! A single background task runs the [`Listener`]. It finds the reader with
//! [`rfid_detect::DeviceScanner`], opens it through a [`PortOpener`], and
//! reads newline-delimited lines of hex octets. Each line is decoded into a
//! [`ScanCode`]. Everything the loop has to say goes out as a
//! [`ListenerEvent`] over an mpsc channel; the loop never calls into the
//! presentation layer.
//!
//! Faults never stop the loop:
//!
//! - **No device**: reported, rescanned after the retry delay
//! - **Connection fault** (open failure, I/O error, unplug): the connection is
//!   closed and the loop rescans after the retry delay
//! - **Bad line** (non-hex or non-UTF-8): reported, the connection stays open
//!
//! # Example
//!
//! ```rust,no_run
//! use rfid_core::{spawn_listener, ListenerConfig, SerialOpener};
//! use rfid_detect::DeviceScanner;
//!
//! # async fn example() {
//! let (_handle, mut events) =
//!     spawn_listener(ListenerConfig::default(), DeviceScanner::new(), SerialOpener);
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.to_record().to_json());
//! }
//! # }
//! ```

pub mod decode;
pub mod error;
pub mod events;
pub mod listener;
pub mod status;
pub mod transport;
pub mod virtual_device;

pub use decode::{decode_line, DecodeError, ScanCode};
pub use error::ListenerError;
pub use events::{DisplayUpdate, ListenerEvent, ScanDisplay};
pub use listener::{
    spawn_listener, Listener, ListenerConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT,
    DEFAULT_RETRY_DELAY, EVENT_CHANNEL_CAPACITY, MAX_LINE_LEN,
};
pub use status::{StatusCode, StatusRecord};
pub use transport::{PortOpener, SerialOpener};
pub use virtual_device::{ConnectionStats, ReaderStep, VirtualOpener, VirtualReader};
