//! IPC client for invoking the Naily agent.

use crate::{protocol, AgentMetadata, FactSet, IpcError, Reply, Request, Response, ResponseData};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/naily.sock";

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Request/response timeout; slightly above the agent's invocation timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// IPC client for communicating with the agent host
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    /// Create a client with default socket path
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }

    /// Create a client with custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    async fn do_connect(&self) -> Result<ConnectedClient, IpcError> {
        if !self.socket_path.exists() {
            return Err(IpcError::AgentNotRunning);
        }

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| IpcError::ConnectionFailed("Connection timed out".to_string()))??;

        Ok(ConnectedClient { stream })
    }

    /// Check if the agent is running
    pub fn is_agent_running(&self) -> bool {
        self.socket_path.exists()
    }

    /// Socket this client talks to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected IPC client that can send requests and receive responses
pub struct ConnectedClient {
    stream: UnixStream,
}

impl ConnectedClient {
    /// Send a request and wait for response
    pub async fn send(&mut self, request: Request) -> Result<Response, IpcError> {
        tokio::time::timeout(REQUEST_TIMEOUT, self.do_send(request))
            .await
            .map_err(|_| IpcError::ConnectionFailed("Request timed out".to_string()))?
    }

    async fn do_send(&mut self, request: Request) -> Result<Response, IpcError> {
        let request_bytes = protocol::encode(&request)?;
        let len_bytes = (request_bytes.len() as u32).to_le_bytes();

        self.stream.write_all(&len_bytes).await?;
        self.stream.write_all(&request_bytes).await?;
        self.stream.flush().await?;

        // Read response length
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut response_buf = vec![0u8; len];
        self.stream.read_exact(&mut response_buf).await?;

        let response: Response = rmp_serde::from_slice(&response_buf)?;

        Ok(response)
    }
}

/// Convenience functions for one-off requests
impl IpcClient {
    /// Send a request and wait for response (opens new connection)
    pub async fn request(&self, request: Request) -> Result<Response, IpcError> {
        let mut client = self.do_connect().await?;
        client.send(request).await
    }

    /// Invoke an action and unwrap its reply fields
    async fn invoke(&self, request: Request) -> Result<Reply, IpcError> {
        match self.request(request).await? {
            Response::Ok {
                data: Some(ResponseData::Reply(reply)),
            } => Ok(reply),
            Response::Ok { data: None } | Response::Ack => Ok(Reply::default()),
            Response::Error { message, .. } => Err(IpcError::ActionFailed(message)),
            other => Err(IpcError::ConnectionFailed(format!(
                "Unexpected response: {:?}",
                other
            ))),
        }
    }

    /// Look up a fact; `None` when the key is not stored
    pub async fn get_fact(&self, key: &str) -> Result<Option<String>, IpcError> {
        let reply = self
            .invoke(Request::Get {
                key: key.to_string(),
            })
            .await?;
        Ok(reply.value)
    }

    /// Replace the agent's whole fact set, returning the confirmation message
    pub async fn post_facts(&self, facts: FactSet) -> Result<String, IpcError> {
        let reply = self.invoke(Request::Post { value: facts }).await?;
        Ok(reply.msg.unwrap_or_default())
    }

    /// Fetch agent metadata
    pub async fn describe(&self) -> Result<AgentMetadata, IpcError> {
        match self.request(Request::Describe).await? {
            Response::Ok {
                data: Some(ResponseData::Metadata { metadata }),
            } => Ok(metadata),
            Response::Error { message, .. } => Err(IpcError::ConnectionFailed(message)),
            _ => Err(IpcError::ConnectionFailed(
                "Unexpected response".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IpcServer, RequestHandler};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct TestHandler;

    #[async_trait]
    impl RequestHandler for TestHandler {
        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Ping => Response::ok_with(ResponseData::Pong { timestamp: 0 }),
                Request::Get { key } if key == "known" => Response::reply(Reply::with_value("42")),
                Request::Get { .. } => Response::reply(Reply::default()),
                Request::Post { value } if value.contains_key("fail") => {
                    Response::fail("Could not write file!")
                }
                Request::Post { .. } => Response::reply(Reply::with_msg("Settings Updated!")),
                _ => Response::ack(),
            }
        }
    }

    async fn start_server(socket_path: &Path) {
        let server = IpcServer::new(socket_path, Arc::new(TestHandler))
            .await
            .unwrap();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_client_connect_no_agent() {
        let client = IpcClient::with_socket_path("/tmp/nonexistent_naily_12345.sock");
        let result = client.do_connect().await;
        assert!(matches!(result, Err(IpcError::AgentNotRunning)));
        assert!(!client.is_agent_running());
    }

    #[tokio::test]
    async fn test_client_default() {
        let client = IpcClient::default();
        assert_eq!(client.socket_path(), Path::new(DEFAULT_SOCKET_PATH));
    }

    #[tokio::test]
    async fn test_client_connect_and_ping() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_server(&socket_path).await;

        let client = IpcClient::with_socket_path(&socket_path);
        let response = client.request(Request::Ping).await.unwrap();

        assert!(matches!(
            response,
            Response::Ok {
                data: Some(ResponseData::Pong { .. })
            }
        ));
    }

    #[tokio::test]
    async fn test_client_get_fact() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_server(&socket_path).await;

        let client = IpcClient::with_socket_path(&socket_path);
        assert_eq!(client.get_fact("known").await.unwrap().as_deref(), Some("42"));
        assert_eq!(client.get_fact("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_client_post_failure_surfaces_message() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_server(&socket_path).await;

        let client = IpcClient::with_socket_path(&socket_path);

        let mut facts = FactSet::new();
        facts.insert("x".to_string(), "1".to_string());
        let msg = client.post_facts(facts.clone()).await.unwrap();
        assert_eq!(msg, "Settings Updated!");

        facts.insert("fail".to_string(), "yes".to_string());
        match client.post_facts(facts).await {
            Err(IpcError::ActionFailed(message)) => assert_eq!(message, "Could not write file!"),
            other => panic!("Expected ActionFailed, got {:?}", other),
        }
    }
}
