//! TCP transport: newline-delimited JSON, one task per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{MethodHandler, Request, Response};

pub struct Transport {
    bind_addr: SocketAddr,
    handler: Arc<MethodHandler>,
}

impl Transport {
    pub fn new(bind_addr: SocketAddr, handler: MethodHandler) -> Self {
        Self {
            bind_addr,
            handler: Arc::new(handler),
        }
    }

    /// Accept connections until the shutdown signal arrives.
    pub async fn listen(&self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "rpc server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, handler).await {
                                    debug!(peer = %peer, error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "failed to accept connection"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("rpc server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, handler: Arc<MethodHandler>) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => {
                if let Err(msg) = request.validate() {
                    warn!(error = msg, "invalid rpc request");
                    Response::invalid_request(request.id.unwrap_or(serde_json::Value::Null))
                } else if request.is_notification() {
                    handler.handle(request).await;
                    continue;
                } else {
                    handler.handle(request).await
                }
            }
            Err(e) => {
                warn!(error = %e, "unparseable rpc request");
                Response::parse_error()
            }
        };

        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
    }

    Ok(())
}
