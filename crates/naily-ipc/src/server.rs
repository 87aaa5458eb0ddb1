//! Unix socket IPC server hosting an agent.
//!
//! Handles incoming connections, rejects requests that do not decode into a
//! typed [`Request`], and dispatches the rest to the agent's handler under a
//! fixed invocation timeout.

use crate::{protocol, ErrorCode, IpcError, Request, Response};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::instrument::WithSubscriber;

/// Maximum request size (1MB)
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Request timeout for reading from socket
const REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Default bound on a single action invocation
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    handler: Arc<dyn RequestHandler>,
    action_timeout: Duration,
}

impl IpcServer {
    /// Create a new IPC server bound to the given socket path
    pub async fn new<P: AsRef<Path>>(
        socket_path: P,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, IpcError> {
        let socket_path = socket_path.as_ref();

        // Remove stale socket file if it exists
        if socket_path.exists() {
            let _ = std::fs::remove_file(socket_path);
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;

        // Set socket permissions (user only - 0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        crate::logging::in_scope(|| {
            tracing::info!("IPC server listening on {}", socket_path.display())
        });

        Ok(Self {
            listener,
            handler,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        })
    }

    /// Bound each action invocation by `timeout`
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Run the server, accepting connections until shutdown
    pub async fn run(&self) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    let action_timeout = self.action_timeout;
                    let connection = async move {
                        if let Err(e) =
                            Self::handle_connection(stream, handler, action_timeout).await
                        {
                            tracing::debug!("Connection error: {}", e);
                        }
                    };
                    tokio::spawn(connection.with_subscriber(crate::logging::logger()));
                }
                Err(e) => {
                    crate::logging::in_scope(|| tracing::error!("Accept error: {}", e));
                }
            }
        }
    }

    /// Handle a single connection
    async fn handle_connection(
        mut stream: UnixStream,
        handler: Arc<dyn RequestHandler>,
        action_timeout: Duration,
    ) -> Result<(), IpcError> {
        // Read request with timeout to avoid blocking
        let request = tokio::time::timeout(REQUEST_TIMEOUT, Self::read_request(&mut stream))
            .await
            .map_err(IpcError::Timeout)?;

        let request = match request {
            Ok(req) => req,
            Err(e) => {
                let response = Response::error(
                    ErrorCode::InvalidRequest,
                    format!("Failed to parse request: {}", e),
                );
                Self::write_response(&mut stream, &response).await?;
                return Err(e);
            }
        };

        tracing::debug!("Received request: {:?}", request);

        let action = request.action();
        let response = match tokio::time::timeout(action_timeout, handler.handle(request)).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(action, "Action timed out");
                Response::error(
                    ErrorCode::Timeout,
                    format!("Action '{}' exceeded {:?} timeout", action, action_timeout),
                )
            }
        };

        Self::write_response(&mut stream, &response).await?;

        Ok(())
    }

    /// Read a request from the stream
    async fn read_request(stream: &mut UnixStream) -> Result<Request, IpcError> {
        // Read length prefix (4 bytes, little-endian)
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;

        if len > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge);
        }

        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;

        let msgpack_err = match rmp_serde::from_slice(&buf) {
            Ok(request) => return Ok(request),
            Err(e) => e,
        };

        // JSON fallback (useful for testing with nc/socat)
        if let Ok(request) = serde_json::from_slice(&buf) {
            return Ok(request);
        }

        Err(IpcError::Deserialize(msgpack_err))
    }

    /// Write a response to the stream
    async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<(), IpcError> {
        let response_bytes = protocol::encode(response)?;
        let len_bytes = (response_bytes.len() as u32).to_le_bytes();

        stream.write_all(&len_bytes).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;

        Ok(())
    }
}

/// Trait for handling incoming requests
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a request and return a response
    async fn handle(&self, request: Request) -> Response;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reply, ResponseData};
    use tempfile::tempdir;

    struct TestHandler;

    #[async_trait]
    impl RequestHandler for TestHandler {
        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Ping => Response::ok_with(ResponseData::Pong {
                    timestamp: chrono::Utc::now().timestamp(),
                }),
                Request::Get { key } if key == "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Response::reply(Reply::default())
                }
                _ => Response::ack(),
            }
        }
    }

    async fn roundtrip(socket_path: &Path, payload: &[u8]) -> Response {
        let mut stream = UnixStream::connect(socket_path).await.unwrap();

        let len_bytes = (payload.len() as u32).to_le_bytes();
        stream.write_all(&len_bytes).await.unwrap();
        stream.write_all(payload).await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut response_buf = vec![0u8; len];
        stream.read_exact(&mut response_buf).await.unwrap();

        rmp_serde::from_slice(&response_buf).unwrap()
    }

    async fn spawn_server(socket_path: &Path, action_timeout: Duration) {
        let server = IpcServer::new(socket_path, Arc::new(TestHandler))
            .await
            .unwrap()
            .with_action_timeout(action_timeout);

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_server_ping() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("ping.sock");
        spawn_server(&socket_path, DEFAULT_ACTION_TIMEOUT).await;

        let request = protocol::encode(&Request::Ping).unwrap();
        let response = roundtrip(&socket_path, &request).await;

        assert!(
            matches!(
                response,
                Response::Ok {
                    data: Some(ResponseData::Pong { .. })
                }
            ),
            "Expected Pong response, got {:?}",
            response
        );
    }

    #[tokio::test]
    async fn test_server_accepts_json() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("json.sock");
        spawn_server(&socket_path, DEFAULT_ACTION_TIMEOUT).await;

        let response = roundtrip(&socket_path, br#"{"action":"ping"}"#).await;
        assert!(matches!(response, Response::Ok { .. }));
    }

    #[tokio::test]
    async fn test_server_rejects_mistyped_request() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("invalid.sock");
        spawn_server(&socket_path, DEFAULT_ACTION_TIMEOUT).await;

        let response = roundtrip(&socket_path, br#"{"action":"post","value":[1,2]}"#).await;
        if let Response::Error { code, message } = response {
            assert_eq!(code, ErrorCode::InvalidRequest);
            assert!(message.contains("Failed to parse request"));
        } else {
            panic!("Expected InvalidRequest, got {:?}", response);
        }
    }

    #[tokio::test]
    async fn test_server_enforces_action_timeout() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("timeout.sock");
        spawn_server(&socket_path, Duration::from_millis(100)).await;

        let request = protocol::encode(&Request::Get {
            key: "slow".to_string(),
        })
        .unwrap();
        let response = roundtrip(&socket_path, &request).await;

        assert!(matches!(
            response,
            Response::Error {
                code: ErrorCode::Timeout,
                ..
            }
        ));
    }
}
