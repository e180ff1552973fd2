use std::sync::Arc;

use micro_h1::config::HttpConfig;
use micro_h1::connection::{Request, ResponseWriter};
use micro_h1::handler::Handler;
use micro_h1::server::Server;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

struct HelloWorld;

impl Handler<OwnedReadHalf, OwnedWriteHalf> for HelloWorld {
    // curl -v -d "name=hello" http://127.0.0.1:8080/
    async fn call(&self, req: &mut Request<'_, OwnedReadHalf>, resp: &mut ResponseWriter<'_, OwnedReadHalf, OwnedWriteHalf>) {
        info!(method = %req.method(), path = req.path(), "receive request");

        let body = match req.body_mut().to_bytes().await {
            Ok(body) => body,
            Err(e) => {
                error!(cause = %e, "failed to read request body");
                return;
            }
        };
        info!(body = %String::from_utf8_lossy(&body), "receiving request body");

        let response_body = b"Hello World!\r\n";
        resp.headers_mut().insert(http::header::CONTENT_LENGTH, response_body.len().into());
        if let Err(e) = resp.write(response_body).await {
            error!(cause = %e, "failed to write response");
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = HttpConfig::from_json(r#"{"read_timeout": "10s", "idle_timeout": "1m30s"}"#).expect("valid config");
    let server = Server::builder().bind("127.0.0.1:8080").config(config).build().expect("valid address");

    let shutdown = server.shutdown_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    if let Err(e) = server.serve(Arc::new(HelloWorld)).await {
        error!(cause = %e, "server stopped");
    }
}
