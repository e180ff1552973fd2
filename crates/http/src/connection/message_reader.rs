use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::{HeaderDecoder, PayloadDecoder};
use crate::protocol::{ParseError, PayloadItem, PayloadSize, RequestHead};

/// Reads request heads and body items from a transport into the connection's
/// pooled read buffer. Every transport read is bounded by one deadline.
#[derive(Debug)]
pub struct MessageReader<'a, R> {
    reader: &'a mut R,
    buffer: &'a mut BytesMut,
    deadline: Instant,
    read_size: usize,
}

impl<'a, R> MessageReader<'a, R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: &'a mut R, buffer: &'a mut BytesMut, deadline: Instant, read_size: usize) -> Self {
        Self { reader, buffer, deadline, read_size }
    }

    /// Reads until `head` holds a complete request head.
    ///
    /// Returns `Ok(None)` when the peer closed the connection before sending
    /// any byte of a new request.
    pub async fn read_head(&mut self, head: &mut RequestHead) -> Result<Option<PayloadSize>, ParseError> {
        loop {
            if let Some(payload_size) = HeaderDecoder.decode(self.buffer, head)? {
                return Ok(Some(payload_size));
            }

            if self.fill().await? == 0 {
                return if self.buffer.is_empty() { Ok(None) } else { Err(ParseError::UnexpectedEof) };
            }
        }
    }

    /// Waits until at least one byte is buffered. Returns false when the peer
    /// closed the connection first.
    pub async fn wait_for_data(&mut self) -> Result<bool, ParseError> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        Ok(self.fill().await? > 0)
    }

    /// Reads the next body item. EOF from the transport before the body is
    /// complete is [`ParseError::UnexpectedEof`].
    pub async fn read_payload(&mut self, decoder: &mut PayloadDecoder) -> Result<PayloadItem, ParseError> {
        loop {
            if let Some(item) = decoder.decode(self.buffer)? {
                return Ok(item);
            }

            if self.fill().await? == 0 {
                return Err(ParseError::UnexpectedEof);
            }
        }
    }

    async fn fill(&mut self) -> Result<usize, ParseError> {
        self.buffer.reserve(self.read_size);
        match timeout_at(self.deadline, self.reader.read_buf(self.buffer)).await {
            Ok(Ok(size)) => {
                trace!(size, "read bytes from transport");
                Ok(size)
            }
            Ok(Err(e)) => Err(ParseError::io(e)),
            Err(_) => Err(ParseError::Timeout),
        }
    }
}
