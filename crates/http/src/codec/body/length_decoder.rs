//! Body reader for requests framed by `Content-Length`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Hands out exactly `remaining` bytes, then reports end of body.
///
/// Bytes past the declared length stay in the source buffer: on a keep-alive
/// connection they are the start of the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn is_finish(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.is_finish() {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let take = usize::try_from(self.remaining).map_or(src.len(), |r| r.min(src.len()));
        self.remaining -= take as u64;
        Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_declared_length() {
        let mut src = BytesMut::from(&b"helloGET / HTTP/1.1\r\n"[..]);
        let mut decoder = LengthDecoder::new(5);

        let chunk = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &b"hello"[..]);
        assert!(decoder.is_finish());

        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
        assert_eq!(&src[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn body_split_across_reads() {
        let mut src = BytesMut::from(&b"0123"[..]);
        let mut decoder = LengthDecoder::new(10);

        assert_eq!(decoder.decode(&mut src).unwrap().unwrap().as_bytes().unwrap(), &b"0123"[..]);
        assert!(decoder.decode(&mut src).unwrap().is_none());
        assert!(!decoder.is_finish());

        src.extend_from_slice(b"456789abc");
        assert_eq!(decoder.decode(&mut src).unwrap().unwrap().as_bytes().unwrap(), &b"456789"[..]);
        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
        assert_eq!(&src[..], b"abc");
    }
}
