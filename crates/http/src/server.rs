//! A TCP accept loop around [`HttpConnection`].
//!
//! Every accepted stream gets its own task and its own connection driver; all
//! drivers share one [`ConnStatePool`] and one [`HttpConfig`]. Cancelling the
//! shutdown token stops accepting and closes idle connections.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arena::ConnStatePool;
use crate::config::{Diagnostics, HttpConfig};
use crate::connection::HttpConnection;
use crate::handler::Handler;

#[derive(Debug)]
pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    config: HttpConfig,
    shutdown: Option<CancellationToken>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, config: HttpConfig::default(), shutdown: None }
    }

    pub fn bind<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.config.diagnostics = diagnostics;
        self
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::invalid_address)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }

        let pool = Arc::new(ConnStatePool::with_config(&self.config));
        Ok(Server { address, pool, config: Arc::new(self.config), shutdown: self.shutdown.unwrap_or_default() })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },
}

impl ServerBuildError {
    fn invalid_address(source: io::Error) -> Self {
        Self::InvalidAddress { source }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind server error: {source}")]
    Bind { source: io::Error },
}

#[derive(Debug)]
pub struct Server {
    address: Vec<SocketAddr>,
    pool: Arc<ConnStatePool>,
    config: Arc<HttpConfig>,
    shutdown: CancellationToken,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The pool shared by every connection of this server.
    pub fn pool(&self) -> &Arc<ConnStatePool> {
        &self.pool
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn serve<H>(self, handler: Arc<H>) -> Result<(), ServerError>
    where
        H: Handler<OwnedReadHalf, OwnedWriteHalf> + Sync + 'static,
    {
        let listener = TcpListener::bind(self.address.as_slice()).await.map_err(|source| ServerError::Bind { source })?;
        self.serve_listener(listener, handler).await
    }

    /// Serves connections accepted from `listener` until shutdown.
    pub async fn serve_listener<H>(self, listener: TcpListener, handler: Arc<H>) -> Result<(), ServerError>
    where
        H: Handler<OwnedReadHalf, OwnedWriteHalf> + Sync + 'static,
    {
        match listener.local_addr() {
            Ok(address) => info!(%address, "start listening"),
            Err(e) => warn!(cause = %e, "listening on unknown address"),
        }

        loop {
            let (tcp_stream, remote_addr) = select! {
                biased;

                () = self.shutdown.cancelled() => {
                    info!("shutdown requested, stop accepting");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            if let Err(e) = tcp_stream.set_nodelay(true) {
                warn!(cause = %e, "failed to set TCP_NODELAY");
            }

            let (reader, writer) = tcp_stream.into_split();
            let connection =
                HttpConnection::with_pool(reader, writer, Arc::clone(&self.pool), Arc::clone(&self.config)).shutdown_token(&self.shutdown);
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                let end = connection.process(handler).await;
                debug!(%remote_addr, ?end, "finished process");
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Request, ResponseWriter};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct Hello;

    impl Handler<OwnedReadHalf, OwnedWriteHalf> for Hello {
        async fn call(&self, _req: &mut Request<'_, OwnedReadHalf>, resp: &mut ResponseWriter<'_, OwnedReadHalf, OwnedWriteHalf>) {
            resp.write(b"hello").await.unwrap();
        }
    }

    #[test]
    fn build_requires_address() {
        assert!(matches!(Server::builder().build(), Err(ServerBuildError::MissingAddress)));
        assert!(matches!(Server::builder().bind("not an address").build(), Err(ServerBuildError::InvalidAddress { .. })));
        assert!(Server::builder().bind("127.0.0.1:0").build().is_ok());
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let shutdown = CancellationToken::new();
        let server = Server::builder().bind("127.0.0.1:0").shutdown(shutdown.clone()).build().unwrap();
        let pool = server.pool().clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let task = tokio::spawn(server.serve_listener(listener, Arc::new(Hello)));

        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(pool.created(), 1);
    }
}
