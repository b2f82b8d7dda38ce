//! Shared helpers for the integration tests: tracing setup and the demo
//! handlers used to exercise the listener/dialer pair.

use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;

pub(crate) fn configure_tracing() {
    use std::sync::OnceLock;
    static TRACING_INIT: OnceLock<()> = OnceLock::new();
    TRACING_INIT.get_or_init(|| {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::builder()
                        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                        .from_env_lossy(),
                )
                .with_test_writer()
                .finish(),
        )
        .expect("Configure tracing");
    });
}

/// Handler with a httpbin-style `/delay/<duration>` endpoint: waits the
/// given (virtual) duration before responding 200.
pub(crate) async fn delay(
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    match parse_delay(req.uri().path()) {
        Some(duration) => {
            tokio::time::sleep(duration).await;
            Ok(Response::new(Full::new(Bytes::from("delayed response"))))
        }
        None => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .expect("static response")),
    }
}

/// Handler that echoes the request body back verbatim.
pub(crate) async fn echo(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let body = req.into_body().collect().await?.to_bytes();
    Ok(Response::new(Full::new(body)))
}

/// Handler that answers every request with `200 ok`.
pub(crate) async fn ok(_req: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
    Ok(Response::new(Full::new(Bytes::from("ok"))))
}

/// Parse `/delay/500ms` or `/delay/2s`.
fn parse_delay(path: &str) -> Option<Duration> {
    let spec = path.strip_prefix("/delay/")?;
    if let Some(millis) = spec.strip_suffix("ms") {
        millis.parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = spec.strip_suffix('s') {
        secs.parse().ok().map(Duration::from_secs)
    } else {
        None
    }
}
