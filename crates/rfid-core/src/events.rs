//! Listener event stream
//!
//! The read loop never talks to a display directly. It pushes
//! `ListenerEvent`s onto a channel and whoever drains the channel decides how
//! to present them: as a status record, as a display update, or both.

use std::time::Duration;

use crate::decode::{DecodeError, ScanCode};
use crate::status::{StatusCode, StatusRecord};

/// Everything the read loop reports
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    // -------------------------------------------------------------------------
    // Discovery and connection lifecycle
    // -------------------------------------------------------------------------
    /// No candidate device was found; the loop waits before rescanning
    NoDevice {
        /// Wait before the next scan
        retry_in: Duration,
    },

    /// Opening the first candidate device
    Connecting {
        /// Device path
        port: String,
    },

    /// The device is open and being read
    Connected {
        /// Device path
        port: String,
    },

    /// The connection failed to open or broke while reading
    ConnectionFault {
        /// Device path
        port: String,
        /// Fault description
        error: String,
    },

    /// The connection has been released
    PortClosed {
        /// Device path
        port: String,
    },

    /// The loop is waiting before rescanning after a connection fault
    RetryScheduled {
        /// Wait before the next scan
        delay: Duration,
    },

    // -------------------------------------------------------------------------
    // Line traffic
    // -------------------------------------------------------------------------
    /// A card was scanned
    Data {
        /// Decoded code
        code: ScanCode,
    },

    /// A line did not hold a valid hex code; the connection stays open
    DecodeWarning {
        /// Decoder error
        error: DecodeError,
    },

    /// A line was not valid text; the connection stays open
    EncodingWarning {
        /// Fault description
        error: String,
    },

    // -------------------------------------------------------------------------
    // Everything else
    // -------------------------------------------------------------------------
    /// An unclassified fault; the loop resumes scanning
    Unexpected {
        /// Fault description
        error: String,
    },
}

/// What a display should show for an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    /// Replace the status line
    Status(String),
    /// Show a new scan code
    Value(ScanCode),
}

/// Presentation side of the event boundary
pub trait ScanDisplay {
    /// Show a human-readable status
    fn update_status(&mut self, status: &str);

    /// Show a decoded scan code
    fn update_data(&mut self, code: &ScanCode);
}

impl ListenerEvent {
    /// Status category for this event
    pub fn status_code(&self) -> StatusCode {
        match self {
            ListenerEvent::NoDevice { .. }
            | ListenerEvent::Connecting { .. }
            | ListenerEvent::ConnectionFault { .. }
            | ListenerEvent::PortClosed { .. }
            | ListenerEvent::RetryScheduled { .. } => StatusCode::Info,
            ListenerEvent::Connected { .. } => StatusCode::Connected,
            ListenerEvent::Data { .. } => StatusCode::Data,
            ListenerEvent::DecodeWarning { .. } | ListenerEvent::EncodingWarning { .. } => {
                StatusCode::Warning
            }
            ListenerEvent::Unexpected { .. } => StatusCode::Unexpected,
        }
    }

    /// Human-readable message (None for data events)
    pub fn message(&self) -> Option<String> {
        let message = match self {
            ListenerEvent::NoDevice { retry_in } => {
                format!("No reader detected. Retrying in {}...", describe_delay(*retry_in))
            }
            ListenerEvent::Connecting { port } => format!("Trying to connect with {}", port),
            ListenerEvent::Connected { port } => format!("Successfully connected on {}", port),
            ListenerEvent::ConnectionFault { port, error } => {
                format!("Connection error on {}. Retrying: {}", port, error)
            }
            ListenerEvent::PortClosed { port } => format!("Port {} closed. Retrying...", port),
            ListenerEvent::RetryScheduled { delay } => {
                format!("Retrying connection in {}...", describe_delay(*delay))
            }
            ListenerEvent::Data { .. } => return None,
            ListenerEvent::DecodeWarning { error } => {
                format!("Warning: could not decode line - {}", error)
            }
            ListenerEvent::EncodingWarning { error } => {
                format!("Warning: Decoding error - {}", error)
            }
            ListenerEvent::Unexpected { error } => format!("Unexpected error: {}", error),
        };
        Some(message)
    }

    /// Status record for external monitoring
    pub fn to_record(&self) -> StatusRecord {
        match self {
            ListenerEvent::Data { code } => StatusRecord::with_data(code.clone()),
            _ => StatusRecord {
                code: self.status_code(),
                message: self.message(),
                data: None,
            },
        }
    }

    /// What a display should show
    pub fn display_update(&self) -> DisplayUpdate {
        match self {
            ListenerEvent::Data { code } => DisplayUpdate::Value(code.clone()),
            _ => DisplayUpdate::Status(self.message().unwrap_or_default()),
        }
    }

    /// Forward this event to a display
    pub fn dispatch<D: ScanDisplay + ?Sized>(&self, display: &mut D) {
        match self.display_update() {
            DisplayUpdate::Status(status) => display.update_status(&status),
            DisplayUpdate::Value(code) => display.update_data(&code),
        }
    }
}

/// Render a retry delay for status messages ("5 seconds", "250 ms")
fn describe_delay(delay: Duration) -> String {
    if delay.subsec_nanos() == 0 {
        match delay.as_secs() {
            1 => "1 second".to_string(),
            secs => format!("{} seconds", secs),
        }
    } else {
        format!("{} ms", delay.as_millis())
    }
}
