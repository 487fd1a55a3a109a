//! Opening reader connections

use std::time::Duration;

use tokio::io::AsyncRead;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::error::ListenerError;

/// Opens a byte stream to a device path
///
/// The listener only needs to read, so any `AsyncRead` works. Real readers go
/// through [`SerialOpener`]; tests and the simulated mode use
/// [`crate::virtual_device::VirtualOpener`].
pub trait PortOpener: Send + Sync {
    /// Stream type produced by this opener
    type Port: AsyncRead + Unpin + Send + 'static;

    /// Open `path` at `baud_rate`
    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self::Port, ListenerError>;
}

/// Opens real serial ports through tokio-serial
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    type Port = SerialStream;

    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self::Port, ListenerError> {
        debug!("Opening {} at {} baud", path, baud_rate);
        tokio_serial::new(path, baud_rate)
            .timeout(read_timeout)
            .open_native_async()
            .map_err(|source| ListenerError::Open {
                port: path.to_string(),
                source,
            })
    }
}
