//! Client side of the daemon's JSON-RPC interface.

use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::{Request, Response, RpcError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to daemon: {0}")]
    Connect(std::io::Error),
    #[error("communication error: {0}")]
    Io(std::io::Error),
    #[error("invalid rpc payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("rpc error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),
}

pub struct RpcClient {
    addr: SocketAddr,
}

impl RpcClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Call an RPC method and deserialize its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(ClientError::Connect)?;

        let request = Request {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(Value::from(1)),
        };
        let mut payload = serde_json::to_vec(&request)?;
        payload.push(b'\n');
        stream.write_all(&payload).await.map_err(ClientError::Io)?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.map_err(ClientError::Io)?;

        let response: Response = serde_json::from_str(&line)?;
        if let Some(error) = response.error {
            return Err(ClientError::Rpc(error));
        }
        Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
    }

    pub async fn call_no_params<T: DeserializeOwned>(&self, method: &str) -> Result<T, ClientError> {
        self.call(method, None).await
    }
}
