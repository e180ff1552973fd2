//! HTTP/1.1 connection handling.
//!
//! [`HttpConnection`] drives one transport: it parses a request head into the
//! connection's pooled state, hands the handler a [`Request`] and a
//! [`ResponseWriter`], finalizes the response and loops while the connection
//! stays keep-alive.
//!
//! # Components
//!
//! - [`HttpConnection`]: the per-connection state machine
//! - [`Request`] and [`Body`]: the parsed head and a reader over the body
//! - [`ResponseWriter`]: lazily committed, streamed response
//! - [`OnHijack`] and [`Hijacked`]: taking the raw transport out of the engine

mod body;
pub mod hijack;
mod http_connection;
mod message_reader;
mod message_writer;
mod request;
mod response_writer;

pub use body::Body;
pub use hijack::{Hijacked, OnHijack};
pub use http_connection::{ConnectionEnd, HttpConnection};
pub use request::Request;
pub use response_writer::{ResponseState, ResponseWriter};
