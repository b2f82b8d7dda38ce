//! Construction entry point: a running HTTP server on a virtual listener,
//! paired with a client that can only reach it through memory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{Request, Response};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::client::MemoryClient;
use crate::error::{Error, Result};
use crate::listener::MemoryListener;
use crate::pipe::PipeStream;
use crate::MemoryConnector;

/// A test HTTP server bound to a [`MemoryListener`], plus a
/// [`MemoryClient`] pre-configured to dial through it.
///
/// Dropping the server closes the listener, which unblocks the accept loop
/// and fails any in-flight dials, the Rust counterpart of registering the
/// shutdown with a test framework's cleanup hook.
///
/// ```no_run
/// use http_body_util::Full;
/// use hyper::service::service_fn;
/// use memserve::TestServer;
///
/// # async fn example() -> memserve::Result<()> {
/// let server = TestServer::spawn(service_fn(|_req| async {
///     Ok::<_, hyper::Error>(hyper::Response::new(Full::new(bytes::Bytes::from("ok"))))
/// }));
/// let response = server.client().get("/").await?;
/// assert_eq!(response.status(), 200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TestServer {
    listener: MemoryListener,
    client: MemoryClient,
    accepted: Arc<AtomicUsize>,
    accept_task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server running `service` and return it together with its
    /// paired client.
    ///
    /// Must be called within a tokio runtime. Each accepted connection is
    /// served on its own task by hyper's HTTP/1.1 engine.
    pub fn spawn<S, B>(service: S) -> Self
    where
        S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
        S::Future: Send,
        S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let listener = MemoryListener::new();
        let client = MemoryClient::new(listener.connector());
        let accepted = Arc::new(AtomicUsize::new(0));
        let accept_task = tokio::spawn(accept_loop(
            listener.clone(),
            service,
            Arc::clone(&accepted),
        ));
        Self {
            listener,
            client,
            accepted,
            accept_task: Some(accept_task),
        }
    }

    /// The client wired to dial exclusively through this server's listener.
    pub fn client(&self) -> &MemoryClient {
        &self.client
    }

    /// A fresh handle to the listener's dial capability.
    pub fn connector(&self) -> MemoryConnector {
        self.listener.connector()
    }

    /// The listener the server is accepting from.
    pub fn listener(&self) -> &MemoryListener {
        &self.listener
    }

    /// Obtain a raw client-facing endpoint for protocol-level poking,
    /// bypassing the HTTP client engine.
    ///
    /// Re-invokes the same dial capability the paired client uses, with the
    /// placeholder address.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if the server has been closed.
    pub async fn dial(&self) -> Result<PipeStream> {
        let addr = self.listener.local_addr();
        self.client
            .connector()
            .dial(addr.network(), &addr.to_string())
            .await
    }

    /// Number of connections the accept loop has received so far.
    pub fn connection_count(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Close the listener. Idempotent; also invoked on drop.
    pub fn close(&self) {
        self.listener.close();
    }

    /// Close the listener and wait for the accept loop to finish.
    pub async fn shutdown(mut self) {
        self.listener.close();
        // The loop exits as soon as accept observes the close signal.
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.listener.close();
    }
}

/// Accept connections until the listener closes, serving each on its own
/// task.
async fn accept_loop<S, B>(listener: MemoryListener, service: S, accepted: Arc<AtomicUsize>)
where
    S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    loop {
        match listener.accept().await {
            Ok(conn) => {
                accepted.fetch_add(1, Ordering::Relaxed);
                let service = service.clone();
                tokio::spawn(async move {
                    if let Err(err) = http1::Builder::new()
                        .serve_connection(TokioIo::new(conn), service)
                        .await
                    {
                        // Routine for cancelled clients; the fixture adds no
                        // handling beyond surfacing it in the logs.
                        trace!("server connection ended: {err}");
                    }
                });
            }
            Err(Error::Closed) => {
                debug!("listener closed, stopping accept loop");
                return;
            }
            Err(err) => {
                debug!("accept failed: {err}");
                return;
            }
        }
    }
}
