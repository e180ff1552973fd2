use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::utils::Scratch;
use bytes::BytesMut;

/// encode payload for response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// content-length payload
    Length(LengthEncoder),

    /// transfer-encoding chunked payload
    Chunked(ChunkedEncoder),

    /// body delimited by closing the connection
    UntilClose,

    /// the status code forbids a body
    NoBody,

    /// response to a HEAD request, body bytes are dropped
    Discard,
}

impl PayloadEncoder {
    /// create a `PayloadEncoder` for a status that forbids a body
    pub fn no_body() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// create a chunked `PayloadEncoder`
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    /// create a fixed length `PayloadEncoder`
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    /// create a `PayloadEncoder` whose body ends when the connection closes
    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }

    /// create a `PayloadEncoder` that drops every body byte
    pub fn discard() -> Self {
        Self { kind: Kind::Discard }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_no_body(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut, scratch: &mut Scratch) {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(data, dst),
            Kind::Chunked(encoder) => encoder.encode(data, dst, scratch),
            Kind::UntilClose => dst.extend_from_slice(data),
            Kind::NoBody | Kind::Discard => {}
        }
    }

    /// Writes the end-of-body framing, if the kind has any. Returns false when
    /// a fixed-length body came up short.
    pub fn finish(&mut self, dst: &mut BytesMut) -> bool {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.finish(),
            Kind::Chunked(encoder) => {
                encoder.finish(dst);
                true
            }
            Kind::UntilClose | Kind::NoBody | Kind::Discard => true,
        }
    }
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::fix_length(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SCRATCH_LEN;

    #[test]
    fn test_discard_and_no_body_write_nothing() {
        let mut scratch = [0u8; SCRATCH_LEN];
        let mut dst = BytesMut::new();

        for mut encoder in [PayloadEncoder::discard(), PayloadEncoder::no_body()] {
            encoder.encode(b"hello", &mut dst, &mut scratch);
            encoder.finish(&mut dst);
        }

        assert!(dst.is_empty());
    }

    #[test]
    fn test_until_close_is_raw() {
        let mut scratch = [0u8; SCRATCH_LEN];
        let mut dst = BytesMut::new();
        let mut encoder = PayloadEncoder::until_close();

        encoder.encode(b"hello", &mut dst, &mut scratch);
        encoder.finish(&mut dst);

        assert_eq!(&dst[..], b"hello");
    }
}
