//! Topic grammar.
//!
//! All device traffic lives under a fixed six-segment hierarchy:
//!
//! ```text
//! farm/{farm_id}/room/{room_id}/device/{device_id}/{kind}
//! ```
//!
//! where `kind` is `telemetry` or `status` inbound, `command` outbound.
//! Anything that does not match exactly is rejected, never guessed at.

use smartfarm_core::{EngineError, EngineResult};

/// Subscription filter for all telemetry topics.
pub const TELEMETRY_WILDCARD: &str = "farm/+/room/+/device/+/telemetry";

/// Subscription filter for all status topics.
pub const STATUS_WILDCARD: &str = "farm/+/room/+/device/+/status";

/// Kind of an inbound message, from the topic's last segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Telemetry,
    Status,
}

/// The device addressed by a parsed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAddress {
    pub farm_id: String,
    pub room_id: String,
    pub device_id: String,
    pub kind: MessageKind,
}

/// Parse an inbound topic into its address.
///
/// Rejects wrong segment counts, misplaced literals, empty IDs, and
/// unknown kinds as [`EngineError::MalformedTopic`].
pub fn parse_topic(topic: &str) -> EngineResult<TopicAddress> {
    let malformed = || EngineError::MalformedTopic(topic.to_string());

    let segments: Vec<&str> = topic.split('/').collect();
    let [lit_farm, farm_id, lit_room, room_id, lit_device, device_id, kind] = segments[..] else {
        return Err(malformed());
    };

    if lit_farm != "farm" || lit_room != "room" || lit_device != "device" {
        return Err(malformed());
    }
    if farm_id.is_empty() || room_id.is_empty() || device_id.is_empty() {
        return Err(malformed());
    }

    let kind = match kind {
        "telemetry" => MessageKind::Telemetry,
        "status" => MessageKind::Status,
        _ => return Err(malformed()),
    };

    Ok(TopicAddress {
        farm_id: farm_id.to_string(),
        room_id: room_id.to_string(),
        device_id: device_id.to_string(),
        kind,
    })
}

/// Build the command topic for a device.
pub fn command_topic(farm_id: &str, room_id: &str, device_id: &str) -> String {
    format!("farm/{farm_id}/room/{room_id}/device/{device_id}/command")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_telemetry_topic() {
        let address = parse_topic("farm/f1/room/r2/device/d3/telemetry").unwrap();

        assert_eq!(address.farm_id, "f1");
        assert_eq!(address.room_id, "r2");
        assert_eq!(address.device_id, "d3");
        assert_eq!(address.kind, MessageKind::Telemetry);
    }

    #[test]
    fn test_parse_status_topic() {
        let address = parse_topic("farm/f1/room/r2/device/d3/status").unwrap();
        assert_eq!(address.kind, MessageKind::Status);
    }

    #[test]
    fn test_reject_wrong_segment_count() {
        assert!(parse_topic("farm/f1/room/r2/device/d3").is_err());
        assert!(parse_topic("farm/f1/room/r2/device/d3/telemetry/extra").is_err());
        assert!(parse_topic("").is_err());
    }

    #[test]
    fn test_reject_wrong_literals() {
        assert!(parse_topic("barn/f1/room/r2/device/d3/telemetry").is_err());
        assert!(parse_topic("farm/f1/zone/r2/device/d3/telemetry").is_err());
        assert!(parse_topic("farm/f1/room/r2/sensor/d3/telemetry").is_err());
    }

    #[test]
    fn test_reject_empty_ids() {
        assert!(parse_topic("farm/abc/room//device/xyz/telemetry").is_err());
        assert!(parse_topic("farm//room/r2/device/d3/status").is_err());
        assert!(parse_topic("farm/f1/room/r2/device//status").is_err());
    }

    #[test]
    fn test_reject_unknown_kind() {
        assert!(parse_topic("farm/f1/room/r2/device/d3/command").is_err());
        assert!(parse_topic("farm/f1/room/r2/device/d3/heartbeat").is_err());
    }

    #[test]
    fn test_command_topic_format() {
        assert_eq!(
            command_topic("f1", "r2", "d3"),
            "farm/f1/room/r2/device/d3/command"
        );
    }
}
