use std::sync::Arc;

use futures::channel::oneshot;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::arena::{ConnState, ConnStatePool};
use crate::codec::PayloadDecoder;
use crate::config::HttpConfig;
use crate::connection::body::{Body, DrainBudget};
use crate::connection::hijack::Hijacked;
use crate::connection::message_reader::MessageReader;
use crate::connection::message_writer::MessageWriter;
use crate::connection::request::Request;
use crate::connection::response_writer::{RequestInfo, ResponseWriter};
use crate::handler::Handler;
use crate::protocol::HttpError;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Serves HTTP/1.1 requests over one transport until it closes or is hijacked.
///
/// Requests are handled strictly one after the other. Every connection borrows
/// a [`ConnState`] from the pool for its whole life and gives it back when it
/// closes; a hijacked connection keeps it.
///
/// # Type Parameters
///
/// * `R`: the read half of the transport
/// * `W`: the write half of the transport
pub struct HttpConnection<R, W> {
    reader: R,
    writer: W,
    pool: Arc<ConnStatePool>,
    config: Arc<HttpConfig>,
    base: CancellationToken,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The transport was shut down and the state went back to the pool.
    Closed,
    /// The transport was handed to a handler.
    Hijacked,
}

enum Step<R, W> {
    KeepAlive,
    Close,
    Hijacked(oneshot::Sender<Hijacked<R, W>>),
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// A connection with default configuration and a private pool.
    pub fn new(reader: R, writer: W) -> Self {
        let config = HttpConfig::default();
        let pool = Arc::new(ConnStatePool::with_config(&config));
        Self::with_pool(reader, writer, pool, Arc::new(config))
    }

    pub fn with_pool(reader: R, writer: W, pool: Arc<ConnStatePool>, config: Arc<HttpConfig>) -> Self {
        Self { reader, writer, pool, config, base: CancellationToken::new() }
    }

    /// Stops the connection at its next idle wait once `token` is cancelled.
    pub fn shutdown_token(mut self, token: &CancellationToken) -> Self {
        self.base = token.child_token();
        self
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> ConnectionEnd
    where
        H: Handler<R, W>,
    {
        let mut state = self.pool.acquire();
        let mut idle = false;

        loop {
            state.reset();

            match self.serve_one(&mut state, &*handler, idle).await {
                Ok(Step::KeepAlive) => idle = true,
                Ok(Step::Close) => break,
                Ok(Step::Hijacked(sender)) => {
                    self.hand_over(state, sender);
                    return ConnectionEnd::Hijacked;
                }
                Err(e) => {
                    self.report(&e);
                    break;
                }
            }
        }

        self.close(state).await;
        ConnectionEnd::Closed
    }

    async fn serve_one<H>(&mut self, state: &mut ConnState, handler: &H, idle: bool) -> Result<Step<R, W>, HttpError>
    where
        H: Handler<R, W>,
    {
        let ConnState { read_buf, write_buf, scratch, request, response, payload, cancel, .. } = state;

        if idle && read_buf.is_empty() {
            let deadline = Instant::now() + self.config.idle_timeout;
            let mut waiting = MessageReader::new(&mut self.reader, read_buf, deadline, self.config.read_buffer_size);
            let opened = select! {
                biased;

                () = self.base.cancelled() => {
                    debug!("connection shutdown requested");
                    return Ok(Step::Close);
                }
                result = waiting.wait_for_data() => result?,
            };
            if !opened {
                debug!("peer closed the idle connection");
                return Ok(Step::Close);
            }
        }

        let deadline = Instant::now() + self.config.read_timeout;
        let mut reader = MessageReader::new(&mut self.reader, read_buf, deadline, self.config.read_buffer_size);
        let size = select! {
            biased;

            () = self.base.cancelled() => {
                debug!("connection shutdown requested");
                return Ok(Step::Close);
            }
            result = reader.read_head(request) => match result? {
                Some(size) => size,
                None => {
                    debug!("peer closed the connection");
                    return Ok(Step::Close);
                }
            },
        };

        *payload = PayloadDecoder::from(size);
        let token = self.base.child_token();
        *cancel = Some(token.clone());

        let mut writer = MessageWriter::new(&mut self.writer, write_buf, Instant::now() + self.config.write_timeout);
        if request.expects_continue() {
            writer.write_direct(CONTINUE).await?;
            info!("receive expect request header, sent continue response");
        }

        let info = RequestInfo::from(&*request);
        let budget = DrainBudget::new(self.config.max_drain_body);
        let mut hijack = None;
        let mut reusable = true;
        {
            let mut req = Request::new(request, Body::new(reader, payload, size, &budget), &token);
            let mut resp =
                ResponseWriter::new(writer, response, scratch, &mut hijack, info, self.config.write_buffer_size, &budget);

            handler.call(&mut req, &mut resp).await;

            if !resp.is_hijacked() {
                resp.finalize().await?;
                reusable = req.body_mut().drain().await? && !resp.must_close();
            }
        }

        if let Some(sender) = hijack.take() {
            return Ok(Step::Hijacked(sender));
        }

        token.cancel();
        if request.is_not_keep_alive() || !reusable { Ok(Step::Close) } else { Ok(Step::KeepAlive) }
    }

    /// Sends the transport to the hijacker. The state is dropped, never pooled.
    fn hand_over(self, mut state: Box<ConnState>, sender: oneshot::Sender<Hijacked<R, W>>) {
        state.hijacked = true;
        let hijacked = Hijacked {
            reader: self.reader,
            writer: self.writer,
            read_buf: std::mem::take(&mut state.read_buf).freeze(),
            pending: std::mem::take(&mut state.write_buf).freeze(),
        };

        if sender.send(hijacked).is_err() {
            debug!("hijack future dropped, transport closed");
        }
    }

    fn report(&self, e: &HttpError) {
        if e.is_lifecycle() {
            debug!(cause = %e, "connection closed");
        } else {
            self.config.diagnostics.report(e);
        }
    }

    async fn close(mut self, state: Box<ConnState>) {
        self.base.cancel();

        match timeout(self.config.write_timeout, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(cause = %e, "transport shutdown failed"),
            Err(_) => debug!("transport shutdown timed out"),
        }

        self.pool.release(state);
    }
}

impl<R, W> std::fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("config", &self.config).finish_non_exhaustive()
    }
}
