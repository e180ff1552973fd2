//! A small HTTP/1.1 connection engine on top of tokio.
//!
//! The crate parses requests straight out of pooled, connection-bound buffers,
//! hands them to a handler together with a streaming response writer, and
//! keeps the connection alive for as long as the protocol allows. A handler can
//! also take the raw transport over, for protocol upgrades.
//!
//! # Features
//!
//! - HTTP/1.1 and HTTP/1.0 requests, keep-alive and pipelining
//! - Chunked and fixed-length request bodies, read on demand
//! - Lazily committed responses with content-type sniffing and automatic
//!   framing (fixed length, chunked or close-delimited)
//! - `Expect: 100-continue`
//! - Per-connection state recycled through a shared pool
//! - Read, write and idle deadlines
//! - Connection hijacking
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use micro_h1::connection::{Request, ResponseWriter};
//! use micro_h1::handler::Handler;
//! use micro_h1::server::Server;
//! use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
//! use tracing::error;
//!
//! struct HelloWorld;
//!
//! impl Handler<OwnedReadHalf, OwnedWriteHalf> for HelloWorld {
//!     async fn call(&self, req: &mut Request<'_, OwnedReadHalf>, resp: &mut ResponseWriter<'_, OwnedReadHalf, OwnedWriteHalf>) {
//!         if let Err(e) = req.body_mut().skip().await {
//!             error!(cause = %e, "failed to read request body");
//!             return;
//!         }
//!         if let Err(e) = resp.write(b"Hello World!\r\n").await {
//!             error!(cause = %e, "failed to write response");
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = match Server::builder().bind("127.0.0.1:8080").build() {
//!         Ok(server) => server,
//!         Err(e) => {
//!             error!(cause = %e, "invalid server configuration");
//!             return;
//!         }
//!     };
//!
//!     if let Err(e) = server.serve(Arc::new(HelloWorld)).await {
//!         error!(cause = %e, "server stopped");
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`arena`]: the pool of reusable per-connection state
//! - [`codec`]: head parsing and serialization, body framing, content sniffing
//! - [`connection`]: the connection driver, request body reader, response writer and hijack
//! - [`handler`]: the handler trait
//! - [`config`]: timeouts, buffer sizes and the diagnostic sink
//! - [`protocol`]: request head and error types
//! - [`server`]: a TCP accept loop
//!
//! # Error Handling
//!
//! - [`protocol::ParseError`]: request side
//! - [`protocol::SendError`]: response side
//! - [`protocol::HttpError`]: either of the two
//!
//! Errors never leave a connection task. Peer hang-ups and timeouts close the
//! connection quietly; anything else goes to the configured
//! [`config::Diagnostics`] sink first.
//!
//! # Limitations
//!
//! - HTTP/1.x only, no TLS
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//! - Request trailers are discarded and responses never carry trailers
//!
//! # Safety
//!
//! Header parsing builds header values from slices of the read buffer without
//! re-validating them; httparse has already checked every byte.

pub mod arena;
pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
