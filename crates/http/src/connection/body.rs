//! Request body reading.
//!
//! [`Body`] reads straight from the connection's read buffer through the
//! request's payload decoder. It never reads past the framed end of the body,
//! so pipelined bytes stay buffered for the next request.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncRead;
use tracing::{info, trace};

use crate::codec::PayloadDecoder;
use crate::connection::message_reader::MessageReader;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// How much unread request body may be discarded after the response.
///
/// Shared by the [`Body`] of a request and its response writer: once the
/// declared rest of the body is over the limit, a response committed from
/// then on announces that the connection closes.
#[derive(Debug)]
pub(crate) struct DrainBudget {
    limit: u64,
    exceeded: AtomicBool,
}

impl DrainBudget {
    pub(crate) fn new(limit: u64) -> Self {
        Self { limit, exceeded: AtomicBool::new(false) }
    }

    pub(crate) fn is_exceeded(&self) -> bool {
        self.exceeded.load(Ordering::Relaxed)
    }

    pub(crate) fn track(&self, unread: Option<u64>) {
        self.exceeded.store(unread.is_some_and(|unread| unread > self.limit), Ordering::Relaxed);
    }
}

/// Reader over the body of the current request.
#[derive(Debug)]
pub struct Body<'a, R> {
    reader: MessageReader<'a, R>,
    decoder: &'a mut PayloadDecoder,
    size: PayloadSize,
    /// Bytes of the last chunk not yet handed out by [`Body::read`].
    leftover: Bytes,
    budget: &'a DrainBudget,
}

impl<'a, R> Body<'a, R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        reader: MessageReader<'a, R>,
        decoder: &'a mut PayloadDecoder,
        size: PayloadSize,
        budget: &'a DrainBudget,
    ) -> Self {
        let body = Self { reader, decoder, size, leftover: Bytes::new(), budget };
        budget.track(body.unread());
        body
    }

    /// Declared body bytes not handed out yet; `None` for chunked bodies.
    fn unread(&self) -> Option<u64> {
        self.decoder.remaining_length().map(|remaining| remaining + self.leftover.len() as u64)
    }

    /// How the body is framed on the wire.
    pub fn size(&self) -> PayloadSize {
        self.size
    }

    /// True once every body byte has been handed out.
    pub fn is_end_stream(&self) -> bool {
        self.leftover.is_empty() && self.decoder.is_finish()
    }

    /// Returns the next piece of the body, or `None` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ParseError> {
        if !self.leftover.is_empty() {
            return Ok(Some(std::mem::take(&mut self.leftover)));
        }

        let item = self.reader.read_payload(self.decoder).await?;
        self.budget.track(self.unread());
        match item {
            PayloadItem::Chunk(bytes) => Ok(Some(bytes)),
            PayloadItem::Eof => Ok(None),
        }
    }

    /// Copies body bytes into `buf`, returning how many were copied. Zero
    /// means the body is complete (or `buf` is empty).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ParseError> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.leftover.is_empty() {
            match self.chunk().await? {
                Some(bytes) => self.leftover = bytes,
                None => return Ok(0),
            }
        }

        let len = buf.len().min(self.leftover.len());
        buf[..len].copy_from_slice(&self.leftover[..len]);
        self.leftover.advance(len);
        self.budget.track(self.unread());
        Ok(len)
    }

    /// Collects the rest of the body.
    pub async fn to_bytes(&mut self) -> Result<Bytes, ParseError> {
        let first = match self.chunk().await? {
            Some(bytes) => bytes,
            None => return Ok(Bytes::new()),
        };

        let Some(second) = self.chunk().await? else {
            return Ok(first);
        };

        let mut collected = BytesMut::with_capacity(first.len() + second.len());
        collected.extend_from_slice(&first);
        collected.extend_from_slice(&second);
        while let Some(bytes) = self.chunk().await? {
            collected.extend_from_slice(&bytes);
        }
        Ok(collected.freeze())
    }

    /// Discards the rest of the body, returning the number of bytes skipped.
    pub async fn skip(&mut self) -> Result<u64, ParseError> {
        let mut skipped = 0;
        while let Some(bytes) = self.chunk().await? {
            skipped += bytes.len() as u64;
        }
        Ok(skipped)
    }

    /// Discards the rest of the body unless more than the drain budget
    /// remains.
    ///
    /// Returns false when the budget was exceeded; the connection is then out
    /// of sync and can't be reused.
    pub(crate) async fn drain(&mut self) -> Result<bool, ParseError> {
        if self.is_end_stream() {
            return Ok(true);
        }

        let limit = self.budget.limit;
        if self.budget.is_exceeded() {
            trace!(unread = ?self.unread(), limit, "request body too large to drain");
            return Ok(false);
        }

        let mut drained = self.leftover.len() as u64;
        self.leftover.clear();
        loop {
            match self.reader.read_payload(self.decoder).await? {
                PayloadItem::Chunk(bytes) => {
                    drained += bytes.len() as u64;
                    if drained > limit {
                        trace!(drained, limit, "request body too large to drain");
                        return Ok(false);
                    }
                }
                PayloadItem::Eof => break,
            }
        }

        if drained > 0 {
            info!(drained, "drained unread request body");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        io: &'static [u8],
        buffer: BytesMut,
        decoder: PayloadDecoder,
        size: PayloadSize,
        budget: DrainBudget,
    }

    impl Fixture {
        fn new(io: &'static [u8], size: PayloadSize) -> Self {
            Self::with_drain_limit(io, size, u64::MAX)
        }

        fn with_drain_limit(io: &'static [u8], size: PayloadSize, limit: u64) -> Self {
            Self { io, buffer: BytesMut::new(), decoder: PayloadDecoder::from(size), size, budget: DrainBudget::new(limit) }
        }

        fn body(&mut self) -> Body<'_, &'static [u8]> {
            let deadline = Instant::now() + Duration::from_secs(5);
            let reader = MessageReader::new(&mut self.io, &mut self.buffer, deadline, 1024);
            Body::new(reader, &mut self.decoder, self.size, &self.budget)
        }
    }

    #[tokio::test]
    async fn chunked_body_to_bytes() {
        let mut fixture = Fixture::new(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n", PayloadSize::Chunked);
        let mut body = fixture.body();

        assert_eq!(body.to_bytes().await.unwrap(), Bytes::from_static(b"Wikipedia"));
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn fixed_length_stops_at_boundary() {
        let mut fixture = Fixture::new(b"helloGET / HTTP/1.1\r\n\r\n", PayloadSize::Length(5));
        let mut body = fixture.body();

        assert_eq!(body.to_bytes().await.unwrap(), Bytes::from_static(b"hello"));
        assert!(body.chunk().await.unwrap().is_none());
        drop(body);

        assert_eq!(&fixture.buffer[..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn read_into_small_buffer() {
        let mut fixture = Fixture::new(b"hello world", PayloadSize::Length(11));
        let mut body = fixture.body();

        let mut buf = [0u8; 4];
        let mut out = Vec::new();
        loop {
            let n = body.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(&out[..], b"hello world");
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn skip_rest_after_partial_read() {
        let mut fixture = Fixture::new(b"0123456789", PayloadSize::Length(10));
        let mut body = fixture.body();

        let mut buf = [0u8; 3];
        assert_eq!(body.read(&mut buf).await.unwrap(), 3);
        assert_eq!(body.skip().await.unwrap(), 7);
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn drain_respects_limit() {
        let mut fixture = Fixture::with_drain_limit(b"a\r\n0123456789\r\n0\r\n\r\n", PayloadSize::Chunked, 4);
        assert!(!fixture.body().drain().await.unwrap());

        let mut fixture = Fixture::with_drain_limit(b"0123456789", PayloadSize::Length(10), 64);
        let mut body = fixture.body();
        assert!(body.drain().await.unwrap());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn budget_follows_unread_length() {
        let mut fixture = Fixture::with_drain_limit(b"0123456789", PayloadSize::Length(10), 4);
        let mut body = fixture.body();
        assert!(body.budget.is_exceeded());

        let mut buf = [0u8; 7];
        assert_eq!(body.read(&mut buf).await.unwrap(), 7);
        assert!(!body.budget.is_exceeded());

        assert!(body.drain().await.unwrap());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn chunked_budget_is_unknown_up_front() {
        let mut fixture = Fixture::with_drain_limit(b"a\r\n0123456789\r\n0\r\n\r\n", PayloadSize::Chunked, 4);
        let body = fixture.body();
        assert!(!body.budget.is_exceeded());
    }

    #[tokio::test]
    async fn empty_body() {
        let mut fixture = Fixture::new(b"GET / HTTP/1.1\r\n\r\n", PayloadSize::Empty);
        let mut body = fixture.body();

        assert!(body.is_end_stream());
        assert!(body.to_bytes().await.unwrap().is_empty());
        drop(body);

        assert!(fixture.buffer.is_empty());
        assert_eq!(fixture.io.len(), 18);
    }
}
