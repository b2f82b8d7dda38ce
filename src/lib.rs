//! # memserve
//!
//! **In-memory HTTP server/client pairs for deterministic tokio tests.**
//!
//! Tests that run under virtualized time (`#[tokio::test(start_paused =
//! true)]`) can fast-forward timers, delays, and timeouts instantly, but
//! only as long as nothing blocks on the real world. The moment a request
//! crosses a real socket, the OS clock drives the connection and the
//! determinism is gone. `memserve` bridges a real server accept loop and a
//! real client dial call through an in-memory, rendezvous, full-duplex
//! connection, so both protocol stacks behave exactly as they would over a
//! socket (same read/write/close and half-close semantics) while staying
//! entirely inside the test's scheduling domain.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use hyper::service::service_fn;
//! use memserve::TestServer;
//!
//! #[tokio::test(start_paused = true)]
//! async fn responds_ok() {
//!     let server = TestServer::spawn(service_fn(|_req| async {
//!         Ok::<_, hyper::Error>(hyper::Response::new(Full::new(Bytes::from("ok"))))
//!     }));
//!
//!     let response = server.client().get("/").await.unwrap();
//!     assert_eq!(response.status(), 200);
//! }
//! ```
//!
//! ## How it fits together
//!
//! ```text
//!  hyper client engine                      hyper server engine
//!  (client::conn::http1)                    (server::conn::http1)
//!        │                                        ▲
//!        ▼ dial                                   │ accept
//!  ┌───────────────┐    rendezvous handoff  ┌───────────────┐
//!  │ MemoryConnector│ ──────────────────────▶│ MemoryListener│
//!  └───────────────┘   (one pair per dial)  └───────────────┘
//!        │                                        │
//!        └────────── PipeStream ◀──▶ PipeStream ──┘
//!                   (in-memory duplex, no buffering)
//! ```
//!
//! A dial synthesizes a fresh connection pair and succeeds only once an
//! accept has committed to the server-facing endpoint; there is no state in
//! which a client holds a "connected" endpoint with no server counterpart.
//! Closing the listener is a one-shot broadcast that fails all blocked and
//! future accepts and dials.
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`pipe`] | Rendezvous duplex byte stream, [`PipeStream`] endpoints |
//! | `listener` | [`MemoryListener`], [`MemoryAddr`], accept/close |
//! | `connector` | [`MemoryConnector`], the dial capability |
//! | `client` | [`MemoryClient`], HTTP/1.1 engine wiring for the dial side |
//! | `server` | [`TestServer`], construction entry point and accept loop |
//! | `error` | [`Error`], [`Result`] |
//!
//! ## What this crate is not
//!
//! No real network transport, no TLS, no HTTP/2 or other multiplexed
//! protocols, no connection pooling, no resilience logic. It is purely a
//! deterministic substitute for "listen on a port and dial it".

pub mod error;
pub mod pipe;

mod client;
mod connector;
mod listener;
mod server;

pub use client::MemoryClient;
pub use connector::MemoryConnector;
pub use error::{Error, Result};
pub use listener::{MemoryAddr, MemoryListener};
pub use pipe::PipeStream;
pub use server::TestServer;
