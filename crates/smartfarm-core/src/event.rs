//! Domain events.
//!
//! Events are ephemeral: the engine does not persist them. Consumers
//! (dashboards, the notification pipeline, real-time transports) subscribe
//! through the [`EventBus`](crate::eventbus::EventBus).

use serde::{Deserialize, Serialize};

use crate::command::{CommandId, CommandStatus};
use crate::device::{DeviceId, RoomId};
use crate::reading::{Parameter, Reading};
use crate::rule::{Comparator, RuleId};

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Get the state name.
    pub fn type_name(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Domain event fanned out to in-process subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FarmEvent {
    /// A telemetry reading was accepted and persisted.
    Telemetry {
        reading: Reading,
    },
    /// A command changed lifecycle status.
    CommandStatus {
        command_id: CommandId,
        device_id: DeviceId,
        status: CommandStatus,
    },
    /// An automation rule condition held for a new reading.
    AutomationTriggered {
        rule_id: RuleId,
        rule_name: String,
        room_id: RoomId,
        /// Action target device
        device_id: DeviceId,
        parameter: Parameter,
        comparator: Comparator,
        threshold: f64,
        /// The reading value that satisfied the condition
        value: f64,
    },
    /// The broker session changed state.
    ConnectionStatus {
        state: ConnectionState,
    },
}

impl FarmEvent {
    /// Get the event type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            FarmEvent::Telemetry { .. } => "Telemetry",
            FarmEvent::CommandStatus { .. } => "CommandStatus",
            FarmEvent::AutomationTriggered { .. } => "AutomationTriggered",
            FarmEvent::ConnectionStatus { .. } => "ConnectionStatus",
        }
    }

    /// Check if this is a telemetry event.
    pub fn is_telemetry(&self) -> bool {
        matches!(self, FarmEvent::Telemetry { .. })
    }

    /// Check if this is a command status event.
    pub fn is_command_status(&self) -> bool {
        matches!(self, FarmEvent::CommandStatus { .. })
    }

    /// Check if this is an automation trigger event.
    pub fn is_automation(&self) -> bool {
        matches!(self, FarmEvent::AutomationTriggered { .. })
    }

    /// Check if this is a connection status event.
    pub fn is_connection(&self) -> bool {
        matches!(self, FarmEvent::ConnectionStatus { .. })
    }
}
