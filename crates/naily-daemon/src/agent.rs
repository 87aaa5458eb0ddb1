//! The fact agent: `get` and `post` actions over a [`FactStore`].

use async_trait::async_trait;
use naily_core::{FactSet, FactStore, Logger};
use naily_ipc::{AgentMetadata, ErrorCode, Reply, Request, RequestHandler, Response, ResponseData};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Reply message for a successful `post`
pub const SETTINGS_UPDATED: &str = "Settings Updated!";

/// Failure message for a `post` that could not persist
pub const WRITE_FAILED: &str = "Could not write file!";

/// Descriptive metadata the agent exposes to its host
pub fn metadata(timeout: Duration) -> AgentMetadata {
    AgentMetadata {
        name: "Naily Fact Agent".to_string(),
        description: "Key/values in a text file".to_string(),
        author: "Puppet Master Guy".to_string(),
        license: "GPL".to_string(),
        version: "Version 1".to_string(),
        url: "www.naily.com".to_string(),
        timeout: timeout.as_secs(),
    }
}

/// Stateless handler for fact requests; the file is the only state.
#[derive(Clone)]
pub struct FactAgent {
    store: FactStore,
    logger: Logger,
    metadata: Arc<AgentMetadata>,
    shutdown_tx: broadcast::Sender<()>,
}

impl FactAgent {
    pub fn new(
        store: FactStore,
        logger: Logger,
        metadata: AgentMetadata,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            logger,
            metadata: Arc::new(metadata),
            shutdown_tx,
        }
    }

    /// `get`: reply `value` is set only when the key is stored
    pub fn get(&self, key: &str) -> Response {
        let facts = self.store.read();
        match facts.get(key) {
            Some(value) => Response::reply(Reply::with_value(value.clone())),
            None => {
                self.logger
                    .in_scope(|| tracing::debug!(key, "Fact not found"));
                Response::reply(Reply::default())
            }
        }
    }

    /// `post`: replace the whole fact set
    pub fn post(&self, facts: &FactSet) -> Response {
        if self.store.write(facts) {
            self.logger.in_scope(|| {
                tracing::info!(
                    path = %self.store.path().display(),
                    facts = facts.len(),
                    "Facts replaced"
                )
            });
            Response::reply(Reply::with_msg(SETTINGS_UPDATED))
        } else {
            self.logger.in_scope(|| {
                tracing::warn!(path = %self.store.path().display(), "Failed to write facts")
            });
            Response::fail(WRITE_FAILED)
        }
    }

    pub fn metadata(&self) -> &AgentMetadata {
        &self.metadata
    }

    /// Run a file action off the async workers
    async fn blocking<F>(&self, action: F) -> Response
    where
        F: FnOnce(&FactAgent) -> Response + Send + 'static,
    {
        let agent = self.clone();
        match tokio::task::spawn_blocking(move || action(&agent)).await {
            Ok(response) => response,
            Err(e) => {
                self.logger
                    .in_scope(|| tracing::error!(error = %e, "Action task failed"));
                Response::error(ErrorCode::InternalError, e.to_string())
            }
        }
    }
}

#[async_trait]
impl RequestHandler for FactAgent {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Get { key } => self.blocking(move |agent| agent.get(&key)).await,

            Request::Post { value } => self.blocking(move |agent| agent.post(&value)).await,

            Request::Describe => Response::ok_with(ResponseData::Metadata {
                metadata: self.metadata().clone(),
            }),

            Request::Ping => Response::ok_with(ResponseData::Pong {
                timestamp: chrono::Utc::now().timestamp(),
            }),

            Request::Shutdown => {
                self.logger.in_scope(|| tracing::info!("Shutdown requested"));
                let _ = self.shutdown_tx.send(());
                Response::ack()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naily_core::LogBuffer;
    use std::path::Path;
    use tempfile::tempdir;

    fn test_agent(fact_file: &Path) -> (FactAgent, LogBuffer) {
        let buffer = LogBuffer::new();
        let logger = Logger::with_writer("debug", buffer.clone());
        let store = FactStore::new(fact_file, logger.clone());
        let (shutdown_tx, _) = broadcast::channel(1);
        let agent = FactAgent::new(
            store,
            logger,
            metadata(Duration::from_secs(10)),
            shutdown_tx,
        );
        (agent, buffer)
    }

    fn extract_reply(response: Response) -> Reply {
        if let Response::Ok {
            data: Some(ResponseData::Reply(reply)),
        } = response
        {
            reply
        } else {
            panic!("Expected Reply response, got {:?}", response);
        }
    }

    fn facts(pairs: &[(&str, &str)]) -> FactSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_post_then_get() {
        let temp_dir = tempdir().unwrap();
        let (agent, _) = test_agent(&temp_dir.path().join("naily.facts"));

        let reply = extract_reply(
            agent
                .handle(Request::Post {
                    value: facts(&[("x", "1"), ("y", "2")]),
                })
                .await,
        );
        assert_eq!(reply.msg.as_deref(), Some(SETTINGS_UPDATED));
        assert_eq!(reply.value, None);

        let reply = extract_reply(
            agent
                .handle(Request::Get {
                    key: "x".to_string(),
                })
                .await,
        );
        assert_eq!(reply.value.as_deref(), Some("1"));

        let reply = extract_reply(
            agent
                .handle(Request::Get {
                    key: "z".to_string(),
                })
                .await,
        );
        assert_eq!(reply, Reply::default());
    }

    #[tokio::test]
    async fn test_get_missing_file_touches_it() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("naily.facts");
        let (agent, _) = test_agent(&path);

        let reply = extract_reply(
            agent
                .handle(Request::Get {
                    key: "x".to_string(),
                })
                .await,
        );
        assert_eq!(reply.value, None);
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_get_unreadable_store_looks_empty() {
        let temp_dir = tempdir().unwrap();
        let (agent, buffer) = test_agent(temp_dir.path());

        let reply = extract_reply(
            agent
                .handle(Request::Get {
                    key: "x".to_string(),
                })
                .await,
        );
        assert_eq!(reply.value, None);
        assert!(buffer.contents().contains("warn:"));
    }

    #[tokio::test]
    async fn test_post_failure_uses_fixed_message() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a").join("b").join("naily.facts");
        let (agent, _) = test_agent(&path);

        let response = agent
            .handle(Request::Post {
                value: facts(&[("x", "1")]),
            })
            .await;

        if let Response::Error { code, message } = response {
            assert_eq!(code, ErrorCode::ActionFailed);
            assert_eq!(message, WRITE_FAILED);
        } else {
            panic!("Expected failure, got {:?}", response);
        }
    }

    #[tokio::test]
    async fn test_describe() {
        let temp_dir = tempdir().unwrap();
        let (agent, _) = test_agent(&temp_dir.path().join("naily.facts"));

        let response = agent.handle(Request::Describe).await;
        if let Response::Ok {
            data: Some(ResponseData::Metadata { metadata }),
        } = response
        {
            assert_eq!(metadata.name, "Naily Fact Agent");
            assert_eq!(metadata.timeout, 10);
        } else {
            panic!("Expected Metadata response");
        }
    }

    #[tokio::test]
    async fn test_shutdown_notifies_daemon() {
        let temp_dir = tempdir().unwrap();
        let (agent, _) = test_agent(&temp_dir.path().join("naily.facts"));
        let mut shutdown_rx = agent.shutdown_tx.subscribe();

        let response = agent.handle(Request::Shutdown).await;
        assert!(matches!(response, Response::Ack));
        assert!(shutdown_rx.try_recv().is_ok());
    }
}
