//! Reader listener loop
//!
//! One task runs [`Listener::run`] for the lifetime of the process:
//!
//! ```text
//! SEARCHING -> CONNECTING -> CONNECTED -> READING <-> (line handling)
//!     ^                                      |
//!     +-------------- CLOSED <-- fault ------+
//! ```
//!
//! Missing devices, open failures and broken connections all lead back to
//! `SEARCHING` after a fixed delay. Undecodable lines are reported and
//! skipped without touching the connection. Nothing ends the loop except
//! dropping the runtime or aborting the task.

use std::time::Duration;

use rfid_detect::DeviceScanner;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::decode::{decode_line, DecodeError, ScanCode};
use crate::error::ListenerError;
use crate::events::ListenerEvent;
use crate::transport::PortOpener;

/// Baud rate the reader firmware uses
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// How long a single read waits for a line
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Wait between a failed attempt and the next scan
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Longest line kept in the buffer; longer input is dropped with a warning
pub const MAX_LINE_LEN: usize = 4096;

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Read timeout for a single line
    pub read_timeout: Duration,
    /// Delay before rescanning after no device or a fault
    pub retry_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Logs events and forwards them to the consumer
struct EventEmitter {
    tx: mpsc::Sender<ListenerEvent>,
}

impl EventEmitter {
    async fn emit(&self, event: ListenerEvent) {
        match &event {
            ListenerEvent::Data { code } => {
                info!(source = "Listener", "Scanned code {} (0x{})", code, code.to_hex())
            }
            ListenerEvent::NoDevice { .. } | ListenerEvent::RetryScheduled { .. } => {
                debug!(source = "Listener", "{}", event.message().unwrap_or_default())
            }
            ListenerEvent::ConnectionFault { .. }
            | ListenerEvent::DecodeWarning { .. }
            | ListenerEvent::EncodingWarning { .. } => {
                warn!(source = "Listener", "{}", event.message().unwrap_or_default())
            }
            ListenerEvent::Unexpected { .. } => {
                error!(source = "Listener", "{}", event.message().unwrap_or_default())
            }
            _ => info!(source = "Listener", "{}", event.message().unwrap_or_default()),
        }

        // The loop keeps running even if nobody is listening
        let _ = self.tx.send(event).await;
    }
}

/// An open connection and its partially read line
///
/// Dropping the session closes the connection.
struct Session<P> {
    port: String,
    reader: BufReader<P>,
    read_timeout: Duration,
    line: Vec<u8>,
}

impl<P: AsyncRead + Unpin> Session<P> {
    fn new(port: String, stream: P, read_timeout: Duration) -> Self {
        Self {
            port,
            reader: BufReader::new(stream),
            read_timeout,
            line: Vec::new(),
        }
    }

    /// Read and report lines until the connection breaks
    async fn read_until_fault(&mut self, events: &EventEmitter) -> ListenerError {
        loop {
            let result = match self.next_line().await {
                Ok(Some(bytes)) => {
                    trace!("Read {} bytes from {}: {:02X?}", bytes.len(), self.port, bytes);
                    parse_line(bytes)
                }
                Ok(None) => continue,
                Err(fault) => Err(fault),
            };

            match result {
                Ok(Some(code)) => events.emit(ListenerEvent::Data { code }).await,
                Ok(None) => {}
                Err(fault) if fault.is_connection_fault() => return fault,
                Err(fault) => events.emit(line_fault_event(fault)).await,
            }
        }
    }

    /// Wait up to the read timeout for a complete line
    ///
    /// Returns `Ok(None)` on timeout. Bytes of an unfinished line stay in the
    /// buffer and are completed by the next call.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, ListenerError> {
        match timeout(self.read_timeout, self.reader.read_until(b'\n', &mut self.line)).await {
            Err(_) => self.check_overflow().map(|_| None),
            Ok(Ok(0)) => Err(ListenerError::Disconnected {
                port: self.port.clone(),
            }),
            Ok(Ok(_)) => {
                self.check_overflow()?;
                Ok(Some(std::mem::take(&mut self.line)))
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                self.check_overflow().map(|_| None)
            }
            Ok(Err(source)) => Err(ListenerError::Io {
                port: self.port.clone(),
                source,
            }),
        }
    }

    /// Drop the buffered line if it has grown past [`MAX_LINE_LEN`]
    fn check_overflow(&mut self) -> Result<(), ListenerError> {
        if self.line.len() <= MAX_LINE_LEN {
            return Ok(());
        }
        let len = self.line.len();
        self.line.clear();
        Err(DecodeError::TooLong { len }.into())
    }
}

/// Event for a fault that leaves the connection open
fn line_fault_event(fault: ListenerError) -> ListenerEvent {
    match fault {
        ListenerError::Decode(error) => ListenerEvent::DecodeWarning { error },
        err @ ListenerError::Encoding(_) => ListenerEvent::EncodingWarning {
            error: err.to_string(),
        },
        err => ListenerEvent::Unexpected {
            error: err.to_string(),
        },
    }
}

/// Turn one raw line into a scan code; blank lines yield `None`
fn parse_line(bytes: Vec<u8>) -> Result<Option<ScanCode>, ListenerError> {
    let text = String::from_utf8(bytes)?;
    let line = text.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(decode_line(line)?))
}

/// The reader listener
pub struct Listener<O: PortOpener> {
    config: ListenerConfig,
    scanner: DeviceScanner,
    opener: O,
    events: EventEmitter,
}

impl<O: PortOpener> Listener<O> {
    /// Create a listener that reports through `event_tx`
    pub fn new(
        config: ListenerConfig,
        scanner: DeviceScanner,
        opener: O,
        event_tx: mpsc::Sender<ListenerEvent>,
    ) -> Self {
        Self {
            config,
            scanner,
            opener,
            events: EventEmitter { tx: event_tx },
        }
    }

    /// Run forever
    pub async fn run(self) {
        info!(
            "Starting reader listener at {} baud (retry every {:?})",
            self.config.baud_rate, self.config.retry_delay
        );

        loop {
            self.cycle().await;
        }
    }

    /// One pass of scan, open, read; returns when the loop should rescan
    async fn cycle(&self) {
        let port = match self.scanner.scan() {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(port) => port,
                None => {
                    self.events
                        .emit(ListenerEvent::NoDevice {
                            retry_in: self.config.retry_delay,
                        })
                        .await;
                    sleep(self.config.retry_delay).await;
                    return;
                }
            },
            Err(e) => {
                let err = ListenerError::from(e);
                self.events
                    .emit(ListenerEvent::Unexpected {
                        error: err.to_string(),
                    })
                    .await;
                sleep(self.config.retry_delay).await;
                return;
            }
        };

        self.events
            .emit(ListenerEvent::Connecting { port: port.clone() })
            .await;

        let stream = match self
            .opener
            .open(&port, self.config.baud_rate, self.config.read_timeout)
        {
            Ok(stream) => stream,
            Err(e) => {
                self.events
                    .emit(ListenerEvent::ConnectionFault {
                        port,
                        error: e.to_string(),
                    })
                    .await;
                self.schedule_retry().await;
                return;
            }
        };

        self.events
            .emit(ListenerEvent::Connected { port: port.clone() })
            .await;

        let mut session = Session::new(port.clone(), stream, self.config.read_timeout);
        let fault = session.read_until_fault(&self.events).await;

        self.events
            .emit(ListenerEvent::ConnectionFault {
                port: port.clone(),
                error: fault.to_string(),
            })
            .await;
        drop(session);
        self.events.emit(ListenerEvent::PortClosed { port }).await;

        self.schedule_retry().await;
    }

    async fn schedule_retry(&self) {
        self.events
            .emit(ListenerEvent::RetryScheduled {
                delay: self.config.retry_delay,
            })
            .await;
        sleep(self.config.retry_delay).await;
    }
}

/// Spawn a listener task and return its handle and event receiver
///
/// Must be called from within a tokio runtime.
pub fn spawn_listener<O>(
    config: ListenerConfig,
    scanner: DeviceScanner,
    opener: O,
) -> (JoinHandle<()>, mpsc::Receiver<ListenerEvent>)
where
    O: PortOpener + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let listener = Listener::new(config, scanner, opener, event_tx);
    (tokio::spawn(listener.run()), event_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_trims_and_decodes() {
        let code = parse_line(b" 1A 2B \r\n".to_vec()).unwrap();
        assert_eq!(code, Some(ScanCode::from(6699)));
    }

    #[test]
    fn test_parse_line_blank_is_skipped() {
        assert!(parse_line(b"\r\n".to_vec()).unwrap().is_none());
        assert!(parse_line(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn test_parse_line_classifies_faults() {
        match parse_line(b"GG\n".to_vec()) {
            Err(ListenerError::Decode(DecodeError::InvalidHex { digits })) => {
                assert_eq!(digits, "GG")
            }
            other => panic!("Expected decode error, got {:?}", other),
        }

        assert!(matches!(
            parse_line(vec![0xFF, 0xFE, b'\n']),
            Err(ListenerError::Encoding(_))
        ));
    }

    #[test]
    fn test_line_faults_keep_connection() {
        let decode = line_fault_event(DecodeError::TooLong { len: 5000 }.into());
        assert_eq!(
            decode,
            ListenerEvent::DecodeWarning {
                error: DecodeError::TooLong { len: 5000 }
            }
        );

        let encoding = parse_line(vec![0xC3, b'\n']).unwrap_err();
        assert!(!encoding.is_connection_fault());
        assert!(matches!(
            line_fault_event(encoding),
            ListenerEvent::EncodingWarning { .. }
        ));
    }

    #[test]
    fn test_default_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.retry_delay, Duration::from_secs(5));
    }
}
