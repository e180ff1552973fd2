use bytes::BytesMut;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    declared: u64,
    remaining: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { declared: length, remaining: length }
    }

    /// Copies `data` as is. Writing past the declared length is not refused,
    /// the overrun is only logged.
    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut) {
        if data.is_empty() {
            return;
        }

        let len = data.len() as u64;
        if len > self.remaining {
            warn!(declared = self.declared, overrun = len - self.remaining, "response body exceeds content-length");
        }
        self.remaining = self.remaining.saturating_sub(len);
        dst.extend_from_slice(data);
    }

    /// Returns false when fewer bytes than declared were written; the peer is
    /// then still waiting for body bytes.
    pub fn finish(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        warn!(declared = self.declared, missing = self.remaining, "response body shorter than content-length");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrun_is_written() {
        let mut dst = BytesMut::new();
        let mut encoder = LengthEncoder::new(3);

        encoder.encode(b"ab", &mut dst);
        encoder.encode(b"cde", &mut dst);
        assert!(encoder.finish());
        assert_eq!(&dst[..], b"abcde");
    }

    #[test]
    fn test_short_body_is_reported() {
        let mut dst = BytesMut::new();
        let mut encoder = LengthEncoder::new(4);

        encoder.encode(b"ab", &mut dst);
        assert!(!encoder.finish());
    }
}
