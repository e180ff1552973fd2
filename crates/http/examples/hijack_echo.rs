//! Switches a request to a raw echo protocol.
//!
//! ```text
//! printf 'GET / HTTP/1.1\r\nConnection: upgrade\r\nUpgrade: echo\r\n\r\nping\n' | nc -q 1 127.0.0.1 8080
//! ```

use std::sync::Arc;

use http::header::{CONNECTION, CONTENT_LENGTH, UPGRADE};
use http::{HeaderValue, StatusCode};
use micro_h1::connection::{Hijacked, Request, ResponseWriter};
use micro_h1::handler::Handler;
use micro_h1::server::Server;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

struct EchoUpgrade;

impl Handler<OwnedReadHalf, OwnedWriteHalf> for EchoUpgrade {
    async fn call(&self, req: &mut Request<'_, OwnedReadHalf>, resp: &mut ResponseWriter<'_, OwnedReadHalf, OwnedWriteHalf>) {
        if req.headers().get(UPGRADE).is_none_or(|protocol| protocol != "echo") {
            let body = b"upgrade to echo\r\n";
            resp.headers_mut().insert(UPGRADE, HeaderValue::from_static("echo"));
            resp.headers_mut().insert(CONTENT_LENGTH, body.len().into());
            let _ = resp.write_header(StatusCode::UPGRADE_REQUIRED);
            if let Err(e) = resp.write(body).await {
                warn!(cause = %e, "failed to write response");
            }
            return;
        }

        resp.headers_mut().insert(CONNECTION, HeaderValue::from_static("upgrade"));
        resp.headers_mut().insert(UPGRADE, HeaderValue::from_static("echo"));
        let switched = match resp.write_header(StatusCode::SWITCHING_PROTOCOLS) {
            Ok(()) => resp.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = switched {
            warn!(cause = %e, "failed to switch protocols");
            return;
        }

        let on_hijack = match resp.hijack() {
            Ok(on_hijack) => on_hijack,
            Err(e) => {
                warn!(cause = %e, "failed to hijack connection");
                return;
            }
        };

        tokio::spawn(async move {
            match on_hijack.await {
                Ok(hijacked) => {
                    if let Err(e) = echo(hijacked).await {
                        warn!(cause = %e, "echo session failed");
                    }
                }
                Err(e) => warn!(cause = %e, "connection was not handed over"),
            }
        });
    }
}

async fn echo(hijacked: Hijacked<OwnedReadHalf, OwnedWriteHalf>) -> std::io::Result<()> {
    let Hijacked { mut reader, mut writer, read_buf, pending } = hijacked;

    writer.write_all(&pending).await?;
    writer.write_all(&read_buf).await?;
    let echoed = tokio::io::copy(&mut reader, &mut writer).await?;
    info!(echoed = echoed + read_buf.len() as u64, "echo session finished");
    writer.shutdown().await
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = Server::builder().bind("127.0.0.1:8080").build().expect("valid address");
    if let Err(e) = server.serve(Arc::new(EchoUpgrade)).await {
        error!(cause = %e, "server stopped");
    }
}
