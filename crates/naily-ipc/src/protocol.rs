//! IPC Protocol definitions for the Naily agent host.
//!
//! Uses MessagePack (named fields) over Unix sockets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete set of facts, keyed by fact name
pub type FactSet = BTreeMap<String, String>;

/// Request from client to the agent host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Look up a single fact
    Get { key: String },

    /// Replace the whole fact set
    Post { value: FactSet },

    /// Agent metadata
    Describe,

    /// Graceful shutdown
    Shutdown,

    /// Ping for health check
    Ping,
}

impl Request {
    /// Wire name of the action, as used in logs
    pub fn action(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::Post { .. } => "post",
            Request::Describe => "describe",
            Request::Shutdown => "shutdown",
            Request::Ping => "ping",
        }
    }
}

/// Fields an action sets on its reply.
///
/// Unset fields are left off the wire entirely rather than sent as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl Reply {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            msg: None,
        }
    }

    pub fn with_msg(msg: impl Into<String>) -> Self {
        Self {
            value: None,
            msg: Some(msg.into()),
        }
    }
}

/// Descriptive data an agent exposes to the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentMetadata {
    pub name: String,
    pub description: String,
    pub author: String,
    pub license: String,
    pub version: String,
    pub url: String,
    /// Invocation timeout in seconds
    pub timeout: u64,
}

/// Response from the agent host to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Success with optional data
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },

    /// Acknowledgment for requests with nothing to return
    Ack,

    /// Error response
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Create a success response with no data
    pub fn ok() -> Self {
        Response::Ok { data: None }
    }

    /// Create a success response with data
    pub fn ok_with(data: ResponseData) -> Self {
        Response::Ok { data: Some(data) }
    }

    /// Create a success response carrying an action reply
    pub fn reply(reply: Reply) -> Self {
        Response::ok_with(ResponseData::Reply(reply))
    }

    /// Create an acknowledgment response
    pub fn ack() -> Self {
        Response::Ack
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    /// Signal the failure path of an action
    pub fn fail(message: impl Into<String>) -> Self {
        Response::error(ErrorCode::ActionFailed, message)
    }
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Reply fields set by an action
    Reply(Reply),

    /// Agent metadata
    Metadata { metadata: AgentMetadata },

    /// Pong response
    Pong { timestamp: i64 },
}

/// Error codes for error responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request failed validation before reaching an action
    InvalidRequest,
    /// The action ran and reported failure
    ActionFailed,
    /// Internal host error
    InternalError,
    /// Action exceeded the invocation timeout
    Timeout,
}

/// Encode a message with field names so optional fields can be omitted
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(message)
}
