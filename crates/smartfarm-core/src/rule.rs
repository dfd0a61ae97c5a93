//! Threshold automation rules.
//!
//! Rules are owned by the external rule store; the engine reads a snapshot of
//! the enabled rules for a room on every ingested reading and never persists
//! rule edits itself. Actions are validated into [`RuleAction`] at load time,
//! not re-parsed per evaluation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::{DeviceId, RoomId};
use crate::reading::Parameter;

/// Unique rule identifier.
pub type RuleId = String;

/// Tolerance for `==` comparisons. Sensor jitter makes exact floating-point
/// equality useless in practice.
pub const EQ_TOLERANCE: f64 = 1e-2;

/// Closed comparator set for rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Comparator {
    /// Evaluate the condition `value <comparator> threshold`.
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::LessThan => value < threshold,
            Comparator::GreaterThan => value > threshold,
            Comparator::LessOrEqual => value <= threshold,
            Comparator::GreaterOrEqual => value >= threshold,
            Comparator::Equal => (value - threshold).abs() < EQ_TOLERANCE,
        }
    }

    /// Get the operator token.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::LessThan => "<",
            Comparator::GreaterThan => ">",
            Comparator::LessOrEqual => "<=",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Equal => "==",
        }
    }

    /// Parse an operator token.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "<" => Some(Comparator::LessThan),
            ">" => Some(Comparator::GreaterThan),
            "<=" => Some(Comparator::LessOrEqual),
            ">=" => Some(Comparator::GreaterOrEqual),
            "==" => Some(Comparator::Equal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn empty_params() -> serde_json::Value {
    serde_json::json!({})
}

/// Action to take when a rule fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    /// Device to command
    pub device_id: DeviceId,
    /// Command string (e.g. "fan on")
    pub command: String,
    /// Command parameters
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

impl RuleAction {
    /// Create an action with no parameters.
    pub fn new(device_id: impl Into<DeviceId>, command: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            command: command.into(),
            params: empty_params(),
        }
    }

    /// Set the action parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// A threshold automation rule scoped to one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    /// Unique rule ID
    pub rule_id: RuleId,
    /// Room whose readings this rule watches
    pub room_id: RoomId,
    /// Human-readable name, surfaced in trigger events
    pub name: String,
    /// Parameter the condition reads
    pub parameter: Parameter,
    /// Condition comparator
    pub comparator: Comparator,
    /// Condition threshold
    pub threshold: f64,
    /// Action taken when the condition holds
    pub action: RuleAction,
    /// Disabled rules are never evaluated
    pub enabled: bool,
}

impl AutomationRule {
    /// Create an enabled rule with a fresh ID.
    pub fn new(
        room_id: impl Into<RoomId>,
        name: impl Into<String>,
        parameter: Parameter,
        comparator: Comparator,
        threshold: f64,
        action: RuleAction,
    ) -> Self {
        Self {
            rule_id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            name: name.into(),
            parameter,
            comparator,
            threshold,
            action,
            enabled: true,
        }
    }
}
