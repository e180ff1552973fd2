//! HTTP header encoder for serializing response heads
//!
//! The framing headers (`Content-Length`, `Transfer-Encoding`, `Connection`)
//! are settled by the response writer before encoding, so this encoder only
//! writes the status line and the header map as given.

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, StatusCode};

/// Rough per-header size used to reserve buffer space up front
const HEADER_SIZE_HINT: usize = 32;

/// Encoder for HTTP/1.1 response heads.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    /// Writes `HTTP/1.1 <code> <reason>\r\n`, every header line and the
    /// terminating blank line into `dst`.
    ///
    /// Status codes without a canonical reason phrase get an empty reason.
    pub fn encode(&self, status: StatusCode, headers: &HeaderMap, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE_HINT * (headers.len() + 1));

        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(status.canonical_reason().unwrap_or("").as_bytes());
        dst.put_slice(b"\r\n");

        for (header_name, header_value) in headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE};

    #[test]
    fn encode_status_line_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("5"));

        let mut dst = BytesMut::new();
        HeaderEncoder.encode(StatusCode::OK, &headers, &mut dst);

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 5\r\n\r\n");
    }

    #[test]
    fn encode_unknown_reason() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode(StatusCode::from_u16(599).unwrap(), &HeaderMap::new(), &mut dst);

        assert_eq!(&dst[..], b"HTTP/1.1 599 \r\n\r\n");
    }
}
