//! Error types for the listener

use std::string::FromUtf8Error;

use rfid_detect::DetectError;
use thiserror::Error;

use crate::decode::DecodeError;

/// Errors that can occur in the listener
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Device discovery failed
    #[error("device discovery failed: {0}")]
    Detect(#[from] DetectError),

    /// The serial port could not be opened
    #[error("cannot open port: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// I/O failure on an open connection
    #[error("read failed: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// The device stopped producing data (end of stream)
    #[error("device disconnected")]
    Disconnected { port: String },

    /// A line did not contain a valid hex code
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A line was not valid UTF-8
    #[error("line is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}

impl ListenerError {
    /// Check if this fault means the connection must be closed
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            ListenerError::Open { .. } | ListenerError::Io { .. } | ListenerError::Disconnected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        let io = ListenerError::Io {
            port: "/dev/ttyUSB0".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
        };
        assert!(io.is_connection_fault());
        assert!(ListenerError::Disconnected {
            port: "/dev/ttyUSB0".to_string()
        }
        .is_connection_fault());

        let decode = ListenerError::from(DecodeError::Empty);
        assert!(!decode.is_connection_fault());

        let encoding = ListenerError::from(String::from_utf8(vec![0xFF]).unwrap_err());
        assert!(!encoding.is_connection_fault());

        let detect = ListenerError::from(DetectError::from(serialport::Error::new(
            serialport::ErrorKind::Unknown,
            "no udev",
        )));
        assert!(!detect.is_connection_fault());
    }

    #[test]
    fn test_messages_leave_port_to_the_event() {
        let open = ListenerError::Open {
            port: "/dev/ttyACM0".to_string(),
            source: serialport::Error::new(serialport::ErrorKind::NoDevice, "busy"),
        };
        assert_eq!(open.to_string(), "cannot open port: busy");

        let err = ListenerError::Disconnected {
            port: "/dev/ttyACM0".to_string(),
        };
        assert_eq!(err.to_string(), "device disconnected");
    }
}
