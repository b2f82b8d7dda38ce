//! In-memory duplex byte stream with rendezvous semantics.
//!
//! [`pair`] creates the two endpoints of a connection. Unlike
//! `tokio::io::duplex`, there is no free-running buffer between the sides:
//! a write completes only once the peer is actually parked in a read, and
//! [`poll_flush`](tokio::io::AsyncWrite::poll_flush) completes only once the
//! handed-over chunk has been fully drained. This reproduces the blocking
//! backpressure of a real socket, which is what makes timeout and
//! partial-read tests meaningful.
//!
//! Each direction is an independent channel, so half-close works the same
//! way it does on TCP: shutting down the write side delivers EOF to the
//! peer after it drains, while the opposite direction stays usable.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// One direction of the pipe. Guarded by a `Mutex` with short critical
/// sections; there is at most one reader task and one writer task per
/// direction, so a single waker slot per side suffices.
#[derive(Debug, Default)]
struct Channel {
    /// The in-flight chunk. Non-empty only between a committed write and
    /// the reads that drain it.
    buf: BytesMut,
    /// Set while the reader is parked waiting for data. A write only
    /// commits against a parked reader.
    reader_parked: bool,
    /// The writing side shut down; EOF once `buf` drains.
    write_closed: bool,
    /// The reading side went away; further writes fail with `BrokenPipe`.
    read_closed: bool,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl Channel {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }
}

/// One endpoint of an in-memory duplex connection created by [`pair`].
///
/// Implements [`AsyncRead`] and [`AsyncWrite`]. Dropping an endpoint closes
/// both directions: the peer reads EOF (after draining any in-flight chunk)
/// and its writes fail with [`io::ErrorKind::BrokenPipe`].
#[derive(Debug)]
pub struct PipeStream {
    /// Direction peer -> us.
    recv: Arc<Mutex<Channel>>,
    /// Direction us -> peer.
    send: Arc<Mutex<Channel>>,
}

/// Create a connected pair of endpoints.
///
/// The two endpoints are symmetric; by convention the dialer keeps the
/// first and hands the second to the accept side.
pub fn pair() -> (PipeStream, PipeStream) {
    let a = Arc::new(Mutex::new(Channel::default()));
    let b = Arc::new(Mutex::new(Channel::default()));
    (
        PipeStream {
            recv: Arc::clone(&a),
            send: Arc::clone(&b),
        },
        PipeStream { recv: b, send: a },
    )
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut ch = match self.recv.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !ch.buf.is_empty() {
            let n = ch.buf.len().min(buf.remaining());
            buf.put_slice(&ch.buf[..n]);
            ch.buf.advance(n);
            if ch.buf.is_empty() {
                // Chunk fully consumed; a flush (or the next write) on the
                // peer may now complete.
                ch.wake_writer();
            }
            return Poll::Ready(Ok(()));
        }

        if ch.write_closed {
            // EOF
            return Poll::Ready(Ok(()));
        }

        ch.reader_parked = true;
        ch.read_waker = Some(cx.waker().clone());
        // A writer parked before we arrived needs to see `reader_parked`.
        ch.wake_writer();
        Poll::Pending
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let mut ch = match self.send.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        };

        if ch.read_closed {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        if ch.write_closed {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }

        // Rendezvous: only commit the chunk against a parked reader with an
        // empty channel. Otherwise wait for the reader to show up.
        if ch.buf.is_empty() && ch.reader_parked {
            ch.buf.extend_from_slice(data);
            ch.reader_parked = false;
            ch.wake_reader();
            return Poll::Ready(Ok(data.len()));
        }

        ch.write_waker = Some(cx.waker().clone());
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut ch = match self.send.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        };

        // If the peer's read side is gone the chunk will never drain;
        // reporting that is the next write's job.
        if ch.buf.is_empty() || ch.read_closed {
            return Poll::Ready(Ok(()));
        }

        ch.write_waker = Some(cx.waker().clone());
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut ch = match self.send.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        };
        ch.write_closed = true;
        ch.wake_reader();
        Poll::Ready(Ok(()))
    }
}

impl Drop for PipeStream {
    fn drop(&mut self) {
        let mut ch = match self.send.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        };
        ch.write_closed = true;
        ch.wake_reader();
        drop(ch);

        let mut ch = match self.recv.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        };
        ch.read_closed = true;
        ch.wake_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    #[tokio::test]
    async fn ping_pong() {
        let (mut client, mut server) = pair();

        let echo = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let n = server.read(&mut buf).await.unwrap();
            server.write_all(&buf[..n]).await.unwrap();
        });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        echo.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn write_blocks_without_reader() {
        let (mut client, mut server) = pair();

        // No reader is parked on the peer, so the write must not complete.
        let blocked = timeout(Duration::from_millis(10), client.write_all(b"data")).await;
        assert!(blocked.is_err(), "write completed without a reader");

        // Once the peer reads, the same write goes through.
        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"data");
            server
        });
        client.write_all(b"data").await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn flush_waits_for_full_consumption() {
        let (mut client, mut server) = pair();

        let writer = tokio::spawn(async move {
            client.write_all(b"abcdef").await.unwrap();
            client.flush().await.unwrap();
            client
        });

        // Drain in two small reads; flush on the writer side must only
        // complete after the second one.
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abc");
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"def");

        let _client = timeout(Duration::from_millis(10), writer)
            .await
            .expect("flush did not complete after drain")
            .unwrap();
    }

    #[tokio::test]
    async fn drop_closes_both_directions() {
        let (mut client, server) = pair();
        drop(server);

        let mut buf = [0u8; 8];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "expected EOF after peer drop");

        let err = client.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn half_close_keeps_reverse_direction_open() {
        let (mut client, mut server) = pair();

        let peer = tokio::spawn(async move {
            let mut buf = Vec::new();
            server.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, b"request");
            server.write_all(b"response").await.unwrap();
        });

        client.write_all(b"request").await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"response");
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn large_transfer_crosses_small_reads() {
        let (mut client, mut server) = pair();
        let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client.flush().await.unwrap();
            drop(client);
        });

        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = server.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, expected);
        writer.await.unwrap();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Bytes written in arbitrary chunk patterns arrive intact and
            /// in order, regardless of how the rendezvous interleaves.
            #[test]
            fn chunked_writes_arrive_in_order(
                chunks in proptest::collection::vec(
                    proptest::collection::vec(any::<u8>(), 0..512),
                    0..16,
                ),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let (mut client, mut server) = pair();
                    let expected: Vec<u8> = chunks.concat();

                    let write = async move {
                        for chunk in &chunks {
                            client.write_all(chunk).await.unwrap();
                        }
                        drop(client);
                    };
                    let read = async move {
                        let mut buf = Vec::new();
                        server.read_to_end(&mut buf).await.unwrap();
                        buf
                    };

                    let ((), received) = tokio::join!(write, read);
                    prop_assert_eq!(received, expected);
                    Ok(())
                })?;
            }
        }
    }
}
