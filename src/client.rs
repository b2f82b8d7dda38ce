//! Client engine wiring: an HTTP/1.1 client that dials exclusively through
//! a listener's [`MemoryConnector`].
//!
//! One connection per request, driven on a background task. There is
//! deliberately no pooling, so every request exercises the full
//! dial/accept handoff and
//! the accepted-connection count stays meaningful in tests.

use bytes::Bytes;
use http::header::HOST;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tracing::trace;

use crate::error::Result;
use crate::listener::MemoryAddr;
use crate::MemoryConnector;

/// HTTP client bound to one virtual listener.
///
/// Obtained from [`TestServer::client`](crate::TestServer::client), or
/// built directly from a connector for tests that wire things up by hand.
/// Cancelling a request (dropping its future, e.g. under
/// [`tokio::time::timeout`]) cancels the dial and closes any endpoint that
/// was already handed out.
#[derive(Clone, Debug)]
pub struct MemoryClient {
    connector: MemoryConnector,
}

impl MemoryClient {
    /// Build a client that dials through the given connector.
    pub fn new(connector: MemoryConnector) -> Self {
        Self { connector }
    }

    /// The dial capability this client was configured with.
    pub fn connector(&self) -> &MemoryConnector {
        &self.connector
    }

    /// Send a request over a fresh in-memory connection and return the
    /// response head with a streaming body.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`](crate::Error::Closed) if the listener is closed,
    /// or [`Error::Http`](crate::Error::Http) from the HTTP engine.
    pub async fn request(&self, req: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        let addr = MemoryAddr;
        let stream = self.connector.dial(addr.network(), &addr.to_string()).await?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                trace!("client connection ended: {err}");
            }
        });

        let response = sender.send_request(req).await?;
        Ok(response)
    }

    /// `GET` the given path (for example `"/delay/500ms"`).
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid request target; that is a test bug,
    /// not a runtime condition.
    pub async fn get(&self, path: &str) -> Result<Response<Incoming>> {
        let req = Request::builder()
            .uri(path)
            .header(HOST, MemoryAddr.to_string())
            .body(Full::default())
            .expect("valid request target");
        self.request(req).await
    }
}
