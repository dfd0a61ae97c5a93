//! Device commands and their lifecycle.
//!
//! A command's status is a small forward-only state machine:
//!
//! ```text
//! pending ──► sent ──► acked
//!    │          │
//!    └──────────┴────► failed
//! ```
//!
//! Terminal states are immutable and `pending` is never revisited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::{Device, DeviceId, FarmId, RoomId};

/// Unique command identifier (UUIDv4 string).
pub type CommandId = String;

/// Command lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Record created, publish not yet attempted
    Pending,
    /// Published to the broker, awaiting device acknowledgment
    Sent,
    /// Device acknowledged the command
    Acked,
    /// Publish failed, device reported failure, or ack timed out
    Failed,
}

impl CommandStatus {
    /// Check if the status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, CommandStatus::Acked | CommandStatus::Failed)
    }

    /// Check whether `self -> next` is a legal transition.
    pub fn can_transition(self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (CommandStatus::Pending, CommandStatus::Sent)
                | (CommandStatus::Pending, CommandStatus::Failed)
                | (CommandStatus::Sent, CommandStatus::Acked)
                | (CommandStatus::Sent, CommandStatus::Failed)
        )
    }

    /// Get the status name.
    pub fn type_name(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Sent => "sent",
            CommandStatus::Acked => "acked",
            CommandStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A command issued to one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Unique command ID
    pub command_id: CommandId,
    /// Target device
    pub device_id: DeviceId,
    /// Room of the target device
    pub room_id: RoomId,
    /// Farm of the target device
    pub farm_id: FarmId,
    /// Command string (e.g. "fan on")
    pub command: String,
    /// Command parameters
    pub params: serde_json::Value,
    /// User who issued the command; `None` means automation-issued
    pub issued_by: Option<String>,
    /// Current lifecycle status
    pub status: CommandStatus,
    /// Creation time
    pub issued_at: DateTime<Utc>,
}

impl Command {
    /// Create a `pending` command for a resolved device.
    pub fn new(
        device: &Device,
        command: impl Into<String>,
        params: serde_json::Value,
        issued_by: Option<String>,
    ) -> Self {
        Self {
            command_id: Uuid::new_v4().to_string(),
            device_id: device.device_id.clone(),
            room_id: device.room_id.clone(),
            farm_id: device.farm_id.clone(),
            command: command.into(),
            params,
            issued_by,
            status: CommandStatus::Pending,
            issued_at: Utc::now(),
        }
    }

    /// Apply a status transition if it is legal.
    ///
    /// Returns `false` (and leaves the command untouched) for illegal
    /// transitions, which makes racing finalizers naturally idempotent.
    pub fn transition(&mut self, next: CommandStatus) -> bool {
        if self.status.can_transition(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Whether the command was issued by automation rather than a user.
    pub fn is_automated(&self) -> bool {
        self.issued_by.is_none()
    }
}

/// A request to dispatch a command, before device resolution.
///
/// Produced by the rule engine (automation) or by the external API layer
/// (manual commands) and consumed by the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Target device
    pub device_id: DeviceId,
    /// Command string
    pub command: String,
    /// Command parameters
    pub params: serde_json::Value,
    /// Issuing user, `None` for automation
    pub issued_by: Option<String>,
}

impl DispatchRequest {
    /// Create an automation-issued request.
    pub fn automation(
        device_id: impl Into<DeviceId>,
        command: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            command: command.into(),
            params,
            issued_by: None,
        }
    }

    /// Create a user-issued request.
    pub fn manual(
        device_id: impl Into<DeviceId>,
        command: impl Into<String>,
        params: serde_json::Value,
        issued_by: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            command: command.into(),
            params,
            issued_by: Some(issued_by.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device::new("dev-1", "room-1", "farm-1")
    }

    #[test]
    fn test_new_command_is_pending() {
        let cmd = Command::new(&device(), "fan on", serde_json::json!({}), None);

        assert_eq!(cmd.status, CommandStatus::Pending);
        assert_eq!(cmd.device_id, "dev-1");
        assert_eq!(cmd.room_id, "room-1");
        assert_eq!(cmd.farm_id, "farm-1");
        assert!(cmd.is_automated());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(CommandStatus::Pending.can_transition(CommandStatus::Sent));
        assert!(CommandStatus::Pending.can_transition(CommandStatus::Failed));
        assert!(CommandStatus::Sent.can_transition(CommandStatus::Acked));
        assert!(CommandStatus::Sent.can_transition(CommandStatus::Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        // pending is never revisited; terminal states are immutable
        assert!(!CommandStatus::Sent.can_transition(CommandStatus::Pending));
        assert!(!CommandStatus::Acked.can_transition(CommandStatus::Failed));
        assert!(!CommandStatus::Failed.can_transition(CommandStatus::Acked));
        assert!(!CommandStatus::Acked.can_transition(CommandStatus::Sent));
        assert!(!CommandStatus::Pending.can_transition(CommandStatus::Acked));
        assert!(!CommandStatus::Pending.can_transition(CommandStatus::Pending));
    }

    #[test]
    fn test_is_terminal() {
        assert!(CommandStatus::Acked.is_terminal());
        assert!(CommandStatus::Failed.is_terminal());
        assert!(!CommandStatus::Pending.is_terminal());
        assert!(!CommandStatus::Sent.is_terminal());
    }

    #[test]
    fn test_transition_is_idempotent_on_terminal_state() {
        let mut cmd = Command::new(&device(), "fan on", serde_json::json!({}), None);

        assert!(cmd.transition(CommandStatus::Sent));
        assert!(cmd.transition(CommandStatus::Acked));
        // A racing timeout must not demote an acked command.
        assert!(!cmd.transition(CommandStatus::Failed));
        assert_eq!(cmd.status, CommandStatus::Acked);
    }

    #[test]
    fn test_manual_request_carries_issuer() {
        let req = DispatchRequest::manual("dev-1", "fan on", serde_json::json!({}), "user-7");
        assert_eq!(req.issued_by.as_deref(), Some("user-7"));

        let auto = DispatchRequest::automation("dev-1", "fan on", serde_json::json!({}));
        assert!(auto.issued_by.is_none());
    }
}
