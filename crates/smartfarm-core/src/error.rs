//! Engine error taxonomy.
//!
//! Every variant is recoverable and local: the engine never terminates on any
//! of these. Malformed/unknown inputs are logged and dropped; command-path
//! failures surface to the immediate caller; `BrokerUnavailable` feeds the
//! reconnect state machine.

use crate::command::CommandId;
use crate::device::DeviceId;

/// Errors produced by the communication and automation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Inbound topic did not match the expected grammar.
    #[error("malformed topic: {0}")]
    MalformedTopic(String),

    /// Inbound body was not valid JSON for the expected schema.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Telemetry arrived from a device the registry does not know.
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// A command targeted a device the registry does not know.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// Publish attempted while the broker session is down.
    #[error("broker unavailable")]
    BrokerUnavailable,

    /// The transport rejected or failed a publish.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// No acknowledgment arrived within the configured window.
    #[error("command timed out: {0}")]
    CommandTimeout(CommandId),

    /// The backing store rejected an operation.
    #[error("store error: {0}")]
    Store(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::MalformedPayload(e.to_string())
    }
}

/// Engine result alias.
pub type EngineResult<T> = Result<T, EngineError>;
