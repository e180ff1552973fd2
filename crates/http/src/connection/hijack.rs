//! Taking a connection out of the engine.
//!
//! A handler calls [`ResponseWriter::hijack`](crate::connection::ResponseWriter::hijack)
//! and gets an [`OnHijack`] future. Once the handler returns, the connection
//! driver stops serving HTTP and sends the raw transport halves through that
//! future, together with any bytes it had buffered. From then on the engine
//! never touches the transport again: it does not write, shut down or pool
//! anything belonging to that connection.
//!
//! The future only resolves after the handler has returned, so it has to be
//! awaited from a spawned task:
//!
//! ```ignore
//! let on_hijack = resp.hijack()?;
//! tokio::spawn(async move {
//!     if let Ok(hijacked) = on_hijack.await {
//!         // speak another protocol over hijacked.reader / hijacked.writer
//!     }
//! });
//! ```

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::FutureExt;
use futures::channel::oneshot;

use crate::protocol::SendError;

/// A connection handed over by the engine.
pub struct Hijacked<R, W> {
    /// Read half of the transport.
    pub reader: R,
    /// Write half of the transport.
    pub writer: W,
    /// Bytes already read from the peer but not consumed by the engine.
    pub read_buf: Bytes,
    /// Response bytes buffered by the engine but never sent.
    pub pending: Bytes,
}

impl<R, W> fmt::Debug for Hijacked<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hijacked")
            .field("read_buf", &self.read_buf.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Resolves to the [`Hijacked`] connection after the handler returns.
///
/// Fails with [`SendError::HijackCanceled`] if the driver was dropped before
/// it could hand the connection over.
#[must_use = "the hijacked transport is dropped with this future"]
pub struct OnHijack<R, W> {
    receiver: oneshot::Receiver<Hijacked<R, W>>,
}

impl<R, W> OnHijack<R, W> {
    pub(crate) fn channel() -> (oneshot::Sender<Hijacked<R, W>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }
}

impl<R, W> Future for OnHijack<R, W> {
    type Output = Result<Hijacked<R, W>, SendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map_err(|_canceled| SendError::HijackCanceled)
    }
}

impl<R, W> fmt::Debug for OnHijack<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnHijack").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_parts() {
        let (sender, on_hijack) = OnHijack::<&'static [u8], Vec<u8>>::channel();

        let parts = Hijacked { reader: &b"raw"[..], writer: Vec::new(), read_buf: Bytes::from_static(b"x"), pending: Bytes::new() };
        assert!(sender.send(parts).is_ok());

        let hijacked = on_hijack.await.unwrap();
        assert_eq!(hijacked.reader, b"raw");
        assert_eq!(&hijacked.read_buf[..], b"x");
    }

    #[tokio::test]
    async fn canceled_when_sender_dropped() {
        let (sender, on_hijack) = OnHijack::<&'static [u8], Vec<u8>>::channel();
        drop(sender);

        assert!(matches!(on_hijack.await, Err(SendError::HijackCanceled)));
    }
}
