//! HTTP header processing module for encoding and decoding heads
//!
//! # Components
//!
//! - [`HeaderDecoder`]: Decodes request heads from raw bytes
//!   - Supports HTTP/1.0 and HTTP/1.1
//!   - Separates request-line errors from header errors
//!   - Manages header size limits
//!
//! - [`HeaderEncoder`]: Encodes response heads to bytes

mod header_decoder;
mod header_encoder;

pub(crate) use header_decoder::is_chunked;
pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use header_encoder::HeaderEncoder;
