//! Virtual dialer producing connected endpoint pairs on demand.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{Error, Result};
use crate::listener::{Handoff, Shared};
use crate::pipe::{self, PipeStream};

/// Dial capability bound to one [`MemoryListener`](crate::MemoryListener).
///
/// Cheap to clone; all clones dial into the same listener. Obtained from
/// [`MemoryListener::connector`](crate::MemoryListener::connector).
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Dial the listener, returning the client-facing endpoint of a fresh
    /// connection pair.
    ///
    /// `network` and `address` are accepted but ignored, so the connector
    /// is a drop-in for any address scheme. Exactly one pair is created per
    /// call; it is handed over only when an [`accept`] commits to the
    /// server-facing endpoint. On any failure both endpoints are dropped;
    /// no half-connected pipe survives.
    ///
    /// Cancellation is per-call and Rust-native: drop the returned future
    /// (e.g. via [`tokio::time::timeout`]) and the pending handoff is
    /// discarded by the accept side without ever being delivered.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if the listener has been closed, before or while
    /// the dial is waiting for an accept.
    ///
    /// [`accept`]: crate::MemoryListener::accept
    pub async fn dial(&self, _network: &str, _address: &str) -> Result<PipeStream> {
        if self.shared.closed.is_cancelled() {
            return Err(Error::Closed);
        }

        let (client, server) = pipe::pair();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.shared
            .conn_tx
            .send(Handoff {
                conn: server,
                ack: ack_tx,
            })
            .map_err(|_| Error::Closed)?;

        tokio::select! {
            biased;
            // An ack that already fired means an accept owns the server
            // endpoint; honor it even if close raced us.
            committed = ack_rx => match committed {
                Ok(()) => {
                    trace!("dial matched an accept");
                    Ok(client)
                }
                Err(_) => Err(Error::Closed),
            },
            () = self.shared.closed.cancelled() => {
                trace!("dial observed close");
                Err(Error::Closed)
            }
        }
    }
}

impl fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("closed", &self.shared.closed.is_cancelled())
            .finish()
    }
}
