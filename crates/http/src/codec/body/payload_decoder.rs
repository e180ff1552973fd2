//! Picks the body reader that matches a request's framing.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Decoder for one request body, built from the [`PayloadSize`] of its head.
///
/// It lives in the pooled connection state and is replaced for every request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PayloadDecoder {
    framing: Framing,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Framing {
    #[default]
    None,
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fix_length(size: u64) -> Self {
        Self { framing: Framing::Length(LengthDecoder::new(size)) }
    }

    /// True once the body has been read up to its end marker.
    pub fn is_finish(&self) -> bool {
        match &self.framing {
            Framing::None => true,
            Framing::Length(decoder) => decoder.is_finish(),
            Framing::Chunked(decoder) => decoder.is_finish(),
        }
    }
}

impl PayloadDecoder {
    /// Body bytes still to come from the transport or the read buffer, when
    /// the framing declares them. `None` for chunked bodies.
    pub fn remaining_length(&self) -> Option<u64> {
        match &self.framing {
            Framing::None => Some(0),
            Framing::Length(decoder) => Some(decoder.remaining()),
            Framing::Chunked(_) => None,
        }
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Empty => Self::empty(),
            PayloadSize::Length(length) => Self::fix_length(length),
            PayloadSize::Chunked => Self { framing: Framing::Chunked(ChunkedDecoder::new()) },
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.framing {
            Framing::None => Ok(Some(PayloadItem::Eof)),
            Framing::Length(decoder) => decoder.decode(src),
            Framing::Chunked(decoder) => decoder.decode(src),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_leaves_next_request_alone() {
        let mut decoder = PayloadDecoder::from(PayloadSize::Empty);
        let mut src = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);

        assert!(decoder.is_finish());
        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
        assert_eq!(src.len(), 16);
    }

    #[test]
    fn framing_follows_payload_size() {
        let mut src = BytesMut::from(&b"3\r\nabc\r\n0\r\n\r\n"[..]);

        let mut length = PayloadDecoder::from(PayloadSize::Length(5));
        assert_eq!(length.decode(&mut src.clone()).unwrap().unwrap().as_bytes().unwrap(), &b"3\r\nab"[..]);
        assert_eq!(length.remaining_length(), Some(0));

        let mut chunked = PayloadDecoder::from(PayloadSize::Chunked);
        assert_eq!(chunked.remaining_length(), None);
        assert_eq!(chunked.decode(&mut src).unwrap().unwrap().as_bytes().unwrap(), &b"abc"[..]);
        assert!(!chunked.is_finish());
        assert!(chunked.decode(&mut src).unwrap().unwrap().is_eof());
        assert!(chunked.is_finish());
    }
}
