//! Virtual listener standing in for an OS listener.
//!
//! A [`MemoryListener`] never touches a socket: connections are handed to
//! [`accept`](MemoryListener::accept) by the listener's own
//! [`MemoryConnector`](crate::MemoryConnector), created via
//! [`connector`](MemoryListener::connector). The handoff is a rendezvous:
//! a dial only succeeds once an accept has committed to the server-facing
//! endpoint, so there is no state where a client believes it is connected
//! while no server endpoint exists.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::pipe::PipeStream;

/// A dialed server-facing endpoint waiting for an accept. The dial call
/// blocks on `ack`; firing it is the accept side's commitment to own the
/// endpoint.
pub(crate) struct Handoff {
    pub(crate) conn: PipeStream,
    pub(crate) ack: oneshot::Sender<()>,
}

/// State shared between the listener and every connector clone.
pub(crate) struct Shared {
    pub(crate) conn_tx: mpsc::UnboundedSender<Handoff>,
    /// One-shot broadcast close signal, observed by all blocked and future
    /// accepts and dials.
    pub(crate) closed: CancellationToken,
}

struct Inner {
    conn_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Handoff>>,
    shared: Arc<Shared>,
}

/// In-memory listener for a test server.
///
/// Clones share the same listener identity; closing any clone closes them
/// all. Create one per test server, attach its accept side to the server
/// engine, and configure the client engine to dial through
/// [`connector`](Self::connector).
#[derive(Clone)]
pub struct MemoryListener {
    inner: Arc<Inner>,
}

impl MemoryListener {
    /// Create a new, open listener with no pending connections.
    pub fn new() -> Self {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                conn_rx: tokio::sync::Mutex::new(conn_rx),
                shared: Arc::new(Shared {
                    conn_tx,
                    closed: CancellationToken::new(),
                }),
            }),
        }
    }

    /// Wait for the next connection dialed through this listener's
    /// connector.
    ///
    /// Blocks until a dial hands over a server-facing endpoint, or until
    /// [`close`](Self::close) fires. Close wins over queued handoffs,
    /// so a closed listener never yields a connection.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once the listener has been closed; this is the
    /// only error `accept` returns.
    pub async fn accept(&self) -> Result<PipeStream> {
        let mut conn_rx = self.inner.conn_rx.lock().await;
        loop {
            tokio::select! {
                biased;
                () = self.inner.shared.closed.cancelled() => {
                    trace!("accept observed close");
                    return Err(Error::Closed);
                }
                handoff = conn_rx.recv() => {
                    // The sender lives in `Shared`, so `recv` only yields
                    // `None` after close tears the channel down.
                    let Some(Handoff { conn, ack }) = handoff else {
                        return Err(Error::Closed);
                    };
                    if ack.send(()).is_ok() {
                        trace!("accepted in-memory connection");
                        return Ok(conn);
                    }
                    // The dialer gave up (its future was dropped) before we
                    // got here; discard the stale endpoint and keep waiting.
                    debug!("discarding handoff from abandoned dial");
                }
            }
        }
    }

    /// Close the listener.
    ///
    /// Idempotent and infallible. The first call arms the close signal; all
    /// blocked and future [`accept`](Self::accept) and
    /// [`dial`](crate::MemoryConnector::dial) calls then fail with
    /// [`Error::Closed`].
    pub fn close(&self) {
        if !self.inner.shared.closed.is_cancelled() {
            debug!("closing in-memory listener");
        }
        self.inner.shared.closed.cancel();
    }

    /// The placeholder address. Never used for routing: to connect, use
    /// [`connector`](Self::connector).
    pub fn local_addr(&self) -> MemoryAddr {
        MemoryAddr
    }

    /// The dial capability bound to this listener, for wiring into a client
    /// engine's transport.
    pub fn connector(&self) -> crate::MemoryConnector {
        crate::MemoryConnector::new(Arc::clone(&self.inner.shared))
    }
}

impl Default for MemoryListener {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryListener")
            .field("closed", &self.inner.shared.closed.is_cancelled())
            .finish()
    }
}

/// Placeholder address satisfying interfaces that require one.
///
/// Carries a fixed protocol label and a fixed textual form; it does not
/// identify anything and cannot be connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryAddr;

impl MemoryAddr {
    /// The protocol label, mirroring what a TCP listener would report.
    pub const fn network(self) -> &'static str {
        "tcp"
    }
}

impl fmt::Display for MemoryAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memserve:0")
    }
}
