//! Naily IPC Protocol and Client/Server
//!
//! This crate hosts the fact agent: the wire protocol, the Unix socket
//! server that validates and dispatches requests, the client used by the
//! CLI, and the host-side logger injection point.

mod client;
mod error;
pub mod logging;
mod protocol;
mod server;

pub use client::{ConnectedClient, IpcClient, DEFAULT_SOCKET_PATH};
pub use error::IpcError;
pub use protocol::*;
pub use server::{IpcServer, RequestHandler, DEFAULT_ACTION_TIMEOUT};
