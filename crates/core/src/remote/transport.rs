use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum RemoteArg {
    Float(f32),
    Int(i32),
    Str(String),
}

impl From<&str> for RemoteArg {
    fn from(value: &str) -> Self {
        RemoteArg::Str(value.to_string())
    }
}

impl From<String> for RemoteArg {
    fn from(value: String) -> Self {
        RemoteArg::Str(value)
    }
}

impl From<i32> for RemoteArg {
    fn from(value: i32) -> Self {
        RemoteArg::Int(value)
    }
}

impl From<f32> for RemoteArg {
    fn from(value: f32) -> Self {
        RemoteArg::Float(value)
    }
}

/// A request addressed to the show controller.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteMessage {
    pub address: String,
    pub args: Vec<RemoteArg>,
}

impl RemoteMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<RemoteArg>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// The controller's reply to a request: the request address, a status and an optional payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RemoteReply {
    pub address: String,
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RemoteReply {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// True when this reply answers a request sent to `address`. The OSC reply path carries a
    /// `/reply` prefix that the payload's address may or may not repeat.
    pub fn acknowledges(&self, address: &str) -> bool {
        self.address.strip_prefix("/reply").unwrap_or(&self.address) == address
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message for {address}: {detail}")]
    Encode { address: String, detail: String },

    #[error("connection closed by the controller")]
    Closed,
}

/// Carries requests to the controller and replies back. Implementations only frame and move
/// messages; acknowledgment and retry belong to the caller.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: &RemoteMessage) -> Result<(), TransportError>;

    /// Waits up to `timeout` for the next reply, returning `None` when none arrived.
    async fn recv(&mut self, timeout: Duration) -> Result<Option<RemoteReply>, TransportError>;
}
