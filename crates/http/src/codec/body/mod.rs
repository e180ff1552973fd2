//! HTTP body handling module for processing request and response payloads
//!
//! # Components
//!
//! ## Decoders
//! - [`ChunkedDecoder`](chunked_decoder::ChunkedDecoder): Handles chunked transfer encoded payloads
//! - [`LengthDecoder`](length_decoder::LengthDecoder): Processes fixed-length payloads
//! - [`PayloadDecoder`]: Main decoder that coordinates different decoding strategies
//!
//! ## Encoders
//! - [`ChunkedEncoder`](chunked_encoder::ChunkedEncoder): Implements chunked transfer encoding
//! - [`LengthEncoder`](length_encoder::LengthEncoder): Handles fixed-length payload encoding
//! - [`PayloadEncoder`]: Main encoder that manages the response framing kinds

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
