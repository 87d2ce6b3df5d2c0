//! JSON-RPC 2.0 server for UI clients.
//!
//! The daemon speaks JSON-RPC 2.0 over localhost TCP with newline-delimited
//! framing. The UI shell lives in a separate process and drives everything
//! through these methods; see `methods` for the dispatch table. `client`
//! is the matching client used by the `status` CLI subcommand.

pub mod client;
pub mod methods;
mod transport;

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

pub use client::RpcClient;
pub use methods::MethodHandler;
use transport::Transport;

// Standard JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Application-level "not found".
pub const NOT_FOUND: i32 = -32000;

/// JSON-RPC 2.0 request object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    /// None marks a notification; no response is expected.
    #[serde(default)]
    pub id: Option<Value>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"");
        }
        if self.method.is_empty() {
            return Err("method must not be empty");
        }
        Ok(())
    }
}

/// JSON-RPC 2.0 response object; exactly one of result/error is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl Response {
    pub fn success(id: Value, result: impl Serialize) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }

    pub fn parse_error() -> Self {
        Self::error(Value::Null, PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(id: Value) -> Self {
        Self::error(id, INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(id: Value, details: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, details.into())
    }

    pub fn internal_error(id: Value, details: impl Into<String>) -> Self {
        Self::error(id, INTERNAL_ERROR, details.into())
    }
}

/// RPC server that exposes daemon functionality to clients.
pub struct RpcServer {
    transport: Transport,
    shutdown_tx: broadcast::Sender<()>,
}

impl RpcServer {
    pub fn new(handler: MethodHandler, bind_addr: SocketAddr) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            transport: Transport::new(bind_addr, handler),
            shutdown_tx,
        }
    }

    /// Serve until `shutdown()` is called.
    pub async fn start(&self) -> anyhow::Result<()> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.transport.listen(shutdown_rx).await
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
