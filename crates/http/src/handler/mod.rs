//! The request handler seam.
//!
//! A handler receives the parsed request and a response sink. It writes the
//! response through the sink and returns; the connection then finalizes
//! whatever the handler left open. There is no routing at this level.
//!
//! ```no_run
//! use micro_h1::connection::{Request, ResponseWriter};
//! use micro_h1::handler::Handler;
//! use tokio::io::{AsyncRead, AsyncWrite};
//!
//! struct Hello;
//!
//! impl<R, W> Handler<R, W> for Hello
//! where
//!     R: AsyncRead + Unpin + Send,
//!     W: AsyncWrite + Unpin + Send,
//! {
//!     async fn call(&self, _req: &mut Request<'_, R>, resp: &mut ResponseWriter<'_, R, W>) {
//!         let _ = resp.write(b"Hello World!\r\n").await;
//!     }
//! }
//! ```

use crate::connection::{Request, ResponseWriter};

/// Handles one request. `R` and `W` are the transport halves of the
/// connection, visible to handlers that hijack it.
///
/// Errors are the handler's own business: anything it wants the peer to see
/// has to be written through `resp`.
#[trait_variant::make(Handler: Send)]
pub trait LocalHandler<R, W> {
    async fn call(&self, req: &mut Request<'_, R>, resp: &mut ResponseWriter<'_, R, W>);
}
