//! HTTP codec module for decoding requests and encoding responses
//!
//! The codecs are synchronous and work on `BytesMut` buffers owned by the
//! connection state; the async reading and writing lives in
//! [`connection`](crate::connection).
//!
//! # Architecture
//!
//! - Request side:
//!   - [`HeaderDecoder`]: decodes the request line and headers into a
//!     reusable [`RequestHead`](crate::protocol::RequestHead)
//!   - [`PayloadDecoder`]: decodes `Content-Length` or chunked bodies
//!
//! - Response side:
//!   - [`HeaderEncoder`]: writes the status line and headers
//!   - [`PayloadEncoder`]: frames body bytes (fixed length, chunked, until close)
//!   - [`detect_content_type`]: sniffs a `Content-Type` from the first body bytes
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_h1::codec::{HeaderDecoder, PayloadDecoder};
//! use micro_h1::protocol::{PayloadItem, RequestHead};
//! use tokio_util::codec::Decoder;
//!
//! let mut buffer = BytesMut::from("POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
//! let mut head = RequestHead::default();
//!
//! let payload_size = HeaderDecoder.decode(&mut buffer, &mut head).unwrap().unwrap();
//! assert_eq!(head.path(), "/echo");
//!
//! let mut decoder = PayloadDecoder::from(payload_size);
//! let item = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(item, PayloadItem::Chunk("hello".into()));
//! ```

mod body;
mod header;
mod sniff;

pub(crate) use header::is_chunked;

pub use body::{PayloadDecoder, PayloadEncoder};
pub use header::{HeaderDecoder, HeaderEncoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use sniff::{SNIFF_LEN, detect_content_type};
