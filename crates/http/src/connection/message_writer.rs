use crate::protocol::SendError;
use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};

/// Pushes the connection's pooled write buffer to a transport. Every
/// transport write is bounded by one deadline.
#[derive(Debug)]
pub struct MessageWriter<'a, W> {
    writer: &'a mut W,
    buffer: &'a mut BytesMut,
    deadline: Instant,
}

impl<'a, W> MessageWriter<'a, W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: &'a mut W, buffer: &'a mut BytesMut, deadline: Instant) -> Self {
        Self { writer, buffer, deadline }
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        self.buffer
    }

    /// Writes `bytes` straight to the transport, ahead of anything buffered.
    /// Used for interim responses.
    pub async fn write_direct(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        let deadline = self.deadline;
        let writer = &mut *self.writer;
        with_deadline(deadline, async move {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await
    }

    /// Writes out the buffer once it holds at least `high_water` bytes,
    /// without flushing the transport.
    pub async fn write_if_above(&mut self, high_water: usize) -> Result<(), SendError> {
        if self.buffer.len() < high_water {
            return Ok(());
        }

        let deadline = self.deadline;
        let (writer, buffer) = (&mut *self.writer, &mut *self.buffer);
        with_deadline(deadline, writer.write_all(buffer.as_ref())).await?;
        buffer.clear();
        Ok(())
    }

    /// Writes out the buffer and flushes the transport.
    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        let deadline = self.deadline;
        let (writer, buffer) = (&mut *self.writer, &mut *self.buffer);
        with_deadline(deadline, async move {
            if !buffer.is_empty() {
                writer.write_all(buffer.as_ref()).await?;
                buffer.clear();
            }
            writer.flush().await
        })
        .await
    }
}

async fn with_deadline<F>(deadline: Instant, io: F) -> Result<(), SendError>
where
    F: Future<Output = std::io::Result<()>>,
{
    match timeout_at(deadline, io).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SendError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn buffered_until_high_water() {
        let mut io = Vec::new();
        let mut buffer = BytesMut::new();
        let mut writer = MessageWriter::new(&mut io, &mut buffer, Instant::now() + Duration::from_secs(5));

        writer.buffer_mut().extend_from_slice(b"abc");
        writer.write_if_above(4).await.unwrap();
        assert_eq!(writer.buffer_mut().len(), 3);

        writer.buffer_mut().extend_from_slice(b"d");
        writer.write_if_above(4).await.unwrap();
        assert!(writer.buffer_mut().is_empty());

        writer.buffer_mut().extend_from_slice(b"ef");
        writer.flush().await.unwrap();
        assert_eq!(&io[..], b"abcdef");
    }

    #[tokio::test]
    async fn direct_write_skips_buffer() {
        let mut io = Vec::new();
        let mut buffer = BytesMut::new();
        let mut writer = MessageWriter::new(&mut io, &mut buffer, Instant::now() + Duration::from_secs(5));

        writer.buffer_mut().extend_from_slice(b"later");
        writer.write_direct(b"now ").await.unwrap();
        writer.flush().await.unwrap();

        assert_eq!(&io[..], b"now later");
    }
}
