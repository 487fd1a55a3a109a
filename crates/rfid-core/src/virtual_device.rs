//! Simulated readers
//!
//! A [`VirtualReader`] plays back a script of lines, raw bytes, pauses and
//! faults as an `AsyncRead` stream. A [`VirtualOpener`] hands out scripted
//! readers in order and counts how many are open at once, which lets tests
//! check the single-connection invariant and lets the console run without
//! hardware.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;
use tracing::debug;

use crate::error::ListenerError;
use crate::transport::PortOpener;

/// One step of a reader script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderStep {
    /// A text line; the newline is appended
    Line(String),
    /// Raw bytes, delivered as-is
    Bytes(Vec<u8>),
    /// Produce nothing for a while
    Pause(Duration),
    /// Fail the next read with this error kind
    Fault(io::ErrorKind),
    /// End of stream, as when the device is unplugged
    Eof,
}

impl ReaderStep {
    /// Shorthand for [`ReaderStep::Line`]
    pub fn line(text: impl Into<String>) -> Self {
        ReaderStep::Line(text.into())
    }
}

/// Counts of virtual connections
#[derive(Debug, Default)]
pub struct ConnectionStats {
    open: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl ConnectionStats {
    /// Connections open right now
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of connections open at the same time
    pub fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Connections opened so far
    pub fn total_opened(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            stats: Arc::clone(self),
        }
    }
}

/// Marks a connection as open until dropped
#[derive(Debug)]
struct ConnectionGuard {
    stats: Arc<ConnectionStats>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stats.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A scripted reader stream
///
/// When the script runs out the stream stays silent, like an idle reader.
/// A repeating reader starts the script over instead.
pub struct VirtualReader {
    script: Vec<ReaderStep>,
    steps: VecDeque<ReaderStep>,
    repeat: bool,
    pending: Vec<u8>,
    pause: Option<Pin<Box<Sleep>>>,
    eof: bool,
    _guard: Option<ConnectionGuard>,
}

impl VirtualReader {
    /// Play `steps` once
    pub fn new(steps: Vec<ReaderStep>) -> Self {
        Self {
            steps: steps.iter().cloned().collect(),
            script: steps,
            repeat: false,
            pending: Vec::new(),
            pause: None,
            eof: false,
            _guard: None,
        }
    }

    /// Play `steps` over and over
    pub fn repeating(steps: Vec<ReaderStep>) -> Self {
        Self {
            repeat: true,
            ..Self::new(steps)
        }
    }

    fn next_step(&mut self) -> Option<ReaderStep> {
        if self.steps.is_empty() && self.repeat {
            self.steps.extend(self.script.iter().cloned());
        }
        self.steps.pop_front()
    }
}

impl std::fmt::Debug for VirtualReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualReader")
            .field("remaining_steps", &self.steps.len())
            .field("repeat", &self.repeat)
            .field("eof", &self.eof)
            .finish()
    }
}

impl AsyncRead for VirtualReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        loop {
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            if let Some(pause) = this.pause.as_mut() {
                ready!(pause.as_mut().poll(cx));
                this.pause = None;
            }

            if !this.pending.is_empty() {
                let n = buf.remaining().min(this.pending.len());
                buf.put_slice(&this.pending[..n]);
                this.pending.drain(..n);
                return Poll::Ready(Ok(()));
            }

            match this.next_step() {
                Some(ReaderStep::Line(text)) => this.pending = format!("{}\n", text).into_bytes(),
                Some(ReaderStep::Bytes(bytes)) => this.pending = bytes,
                Some(ReaderStep::Pause(duration)) => {
                    this.pause = Some(Box::pin(tokio::time::sleep(duration)))
                }
                Some(ReaderStep::Fault(kind)) => {
                    return Poll::Ready(Err(io::Error::new(kind, "virtual reader fault")))
                }
                Some(ReaderStep::Eof) => this.eof = true,
                // Idle; only the caller's read timeout wakes us
                None => return Poll::Pending,
            }
        }
    }
}

/// Scripted result of one open call
#[derive(Debug, Clone)]
enum OpenScript {
    Reader { steps: Vec<ReaderStep>, repeat: bool },
    Failure(serialport::ErrorKind),
}

/// Hands out scripted readers, one per successful open
///
/// Clones share the same script queue and statistics.
#[derive(Debug, Clone, Default)]
pub struct VirtualOpener {
    scripts: Arc<Mutex<VecDeque<OpenScript>>>,
    opened: Arc<Mutex<Vec<(String, u32)>>>,
    stats: Arc<ConnectionStats>,
}

impl VirtualOpener {
    /// Create an opener with an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reader that plays `steps` once
    pub fn push_reader(&self, steps: Vec<ReaderStep>) -> &Self {
        self.push(OpenScript::Reader {
            steps,
            repeat: false,
        })
    }

    /// Queue a reader that loops over `steps`
    pub fn push_repeating_reader(&self, steps: Vec<ReaderStep>) -> &Self {
        self.push(OpenScript::Reader {
            steps,
            repeat: true,
        })
    }

    /// Queue an open failure
    pub fn push_failure(&self, kind: serialport::ErrorKind) -> &Self {
        self.push(OpenScript::Failure(kind))
    }

    /// Connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Every successful open so far, as (path, baud rate)
    pub fn opened_ports(&self) -> Vec<(String, u32)> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, script: OpenScript) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(script);
        self
    }
}

impl PortOpener for VirtualOpener {
    type Port = VirtualReader;

    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Self::Port, ListenerError> {
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let (steps, repeat) = match script {
            Some(OpenScript::Reader { steps, repeat }) => (steps, repeat),
            Some(OpenScript::Failure(kind)) => {
                return Err(ListenerError::Open {
                    port: path.to_string(),
                    source: serialport::Error::new(kind, "virtual open failure"),
                })
            }
            None => {
                return Err(ListenerError::Open {
                    port: path.to_string(),
                    source: serialport::Error::new(
                        serialport::ErrorKind::NoDevice,
                        "no virtual reader available",
                    ),
                })
            }
        };

        debug!("Opening virtual reader on {} at {} baud", path, baud_rate);
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((path.to_string(), baud_rate));

        let mut reader = if repeat {
            VirtualReader::repeating(steps)
        } else {
            VirtualReader::new(steps)
        };
        reader._guard = Some(self.stats.acquire());
        Ok(reader)
    }
}
