//! HTTP request head handling.
//!
//! [`RequestHead`] lives inside the pooled connection state and is reused for
//! every request served on a connection. The decoder overwrites it in place, so
//! the header map keeps its allocation across keep-alive requests.

use http::header::{CONNECTION, EXPECT};
use http::{HeaderMap, Method, Uri, Version};

use crate::protocol::PayloadSize;

/// The parsed start line and headers of a request.
#[derive(Debug)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    payload_size: PayloadSize,
    not_keep_alive: bool,
    expect_continue: bool,
}

impl Default for RequestHead {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::default(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            payload_size: PayloadSize::Empty,
            not_keep_alive: false,
            expect_continue: false,
        }
    }
}

impl RequestHead {
    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The path component of the request target.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// How the request body is framed.
    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// True when the connection must close after this request: an HTTP/1.0
    /// request without `Connection: keep-alive`, or any request carrying a
    /// `close` connection token.
    pub fn is_not_keep_alive(&self) -> bool {
        self.not_keep_alive
    }

    pub fn is_keep_alive(&self) -> bool {
        !self.not_keep_alive
    }

    /// True when the client sent `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.expect_continue
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub(crate) fn set_start_line(&mut self, method: Method, uri: Uri, version: Version) {
        self.method = method;
        self.uri = uri;
        self.version = version;
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn set_payload_size(&mut self, payload_size: PayloadSize) {
        self.payload_size = payload_size;
    }

    /// Derives the keep-alive and expect flags from the current headers.
    pub(crate) fn update_flags(&mut self) {
        self.not_keep_alive = if self.version == Version::HTTP_10 {
            !has_connection_token(&self.headers, "keep-alive")
        } else {
            has_connection_token(&self.headers, "close")
        };

        self.expect_continue = self.version == Version::HTTP_11
            && self
                .headers
                .get(EXPECT)
                .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"));
    }

    /// Clears everything but keeps the header map allocation.
    pub(crate) fn reset(&mut self) {
        self.method = Method::GET;
        self.uri = Uri::default();
        self.version = Version::HTTP_11;
        self.headers.clear();
        self.payload_size = PayloadSize::Empty;
        self.not_keep_alive = false;
        self.expect_continue = false;
    }
}

/// Looks for `token` in every `Connection` header value, comma separated and
/// case insensitive.
pub(crate) fn has_connection_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn head(version: Version, connection: Option<&'static str>) -> RequestHead {
        let mut head = RequestHead::default();
        head.set_start_line(Method::GET, Uri::from_static("/"), version);
        if let Some(value) = connection {
            head.headers_mut().insert(CONNECTION, HeaderValue::from_static(value));
        }
        head.update_flags();
        head
    }

    #[test]
    fn http_11_defaults_to_keep_alive() {
        assert!(head(Version::HTTP_11, None).is_keep_alive());
        assert!(head(Version::HTTP_11, Some("keep-alive")).is_keep_alive());
        assert!(head(Version::HTTP_11, Some("Close")).is_not_keep_alive());
        assert!(head(Version::HTTP_11, Some("upgrade, close")).is_not_keep_alive());
    }

    #[test]
    fn http_10_defaults_to_close() {
        assert!(head(Version::HTTP_10, None).is_not_keep_alive());
        assert!(head(Version::HTTP_10, Some("Keep-Alive")).is_keep_alive());
    }

    #[test]
    fn expect_continue_only_for_http_11() {
        let mut head = RequestHead::default();
        head.set_start_line(Method::POST, Uri::from_static("/upload"), Version::HTTP_11);
        head.headers_mut().insert(EXPECT, HeaderValue::from_static("100-Continue"));
        head.update_flags();
        assert!(head.expects_continue());

        head.set_start_line(Method::POST, Uri::from_static("/upload"), Version::HTTP_10);
        head.update_flags();
        assert!(!head.expects_continue());
    }

    #[test]
    fn reset_keeps_header_capacity() {
        let mut head = head(Version::HTTP_10, Some("close"));
        head.headers_mut().insert("x-a", HeaderValue::from_static("1"));
        let capacity = head.headers().capacity();

        head.reset();

        assert!(head.headers().is_empty());
        assert_eq!(head.headers().capacity(), capacity);
        assert_eq!(head.version(), Version::HTTP_11);
        assert!(head.is_keep_alive());
    }
}
