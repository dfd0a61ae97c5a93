//! Wire payload schemas for broker messages.
//!
//! Topic grammar (both directions):
//! - Inbound telemetry: `farm/{farm}/room/{room}/device/{device}/telemetry`
//! - Inbound status/ack: `farm/{farm}/room/{room}/device/{device}/status`
//! - Outbound command:  `farm/{farm}/room/{room}/device/{device}/command`
//!
//! All bodies are JSON. Every inbound field is optional; devices report
//! whatever sensors they have.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::CommandId;

/// Telemetry message body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_ppm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_lux: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substrate_moisture: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_v: Option<f64>,
    /// ISO-8601 measurement time; absent means "use ingestion time"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Status/ack message body.
///
/// Pure status reports and command acknowledgments share this topic; a
/// message may be either or both (device firmware piggybacks acks on its
/// periodic status report).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Device-reported status string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Command this message acknowledges, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<CommandId>,
    /// Ack outcome; anything but `"failed"` (including absent) means acked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
}

impl StatusPayload {
    /// Whether a correlated command should be marked failed rather than acked.
    pub fn declares_failure(&self) -> bool {
        self.ack_status.as_deref() == Some("failed")
    }
}

/// Outbound command message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command_id: CommandId,
    pub command: String,
    pub params: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_decodes_partial_fields() {
        let payload: TelemetryPayload =
            serde_json::from_str(r#"{"temperature_c": 24.5, "humidity_pct": 90.0}"#).unwrap();

        assert_eq!(payload.temperature_c, Some(24.5));
        assert_eq!(payload.humidity_pct, Some(90.0));
        assert!(payload.co2_ppm.is_none());
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn test_telemetry_ignores_extra_fields() {
        let payload: TelemetryPayload =
            serde_json::from_str(r#"{"temperature_c": 24.5, "rssi": -70}"#).unwrap();

        assert_eq!(payload.temperature_c, Some(24.5));
    }

    #[test]
    fn test_status_ack_disposition() {
        let acked: StatusPayload =
            serde_json::from_str(r#"{"command_id": "c1", "ack_status": "acked"}"#).unwrap();
        let implicit: StatusPayload = serde_json::from_str(r#"{"command_id": "c1"}"#).unwrap();
        let failed: StatusPayload =
            serde_json::from_str(r#"{"command_id": "c1", "ack_status": "failed"}"#).unwrap();

        assert!(!acked.declares_failure());
        assert!(!implicit.declares_failure());
        assert!(failed.declares_failure());
    }

    #[test]
    fn test_command_payload_roundtrip() {
        let payload = CommandPayload {
            command_id: "cmd-1".to_string(),
            command: "fan on".to_string(),
            params: serde_json::json!({"speed": 2}),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        let decoded: CommandPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.command_id, "cmd-1");
        assert_eq!(decoded.command, "fan on");
        assert_eq!(decoded.params["speed"], 2);
    }
}
