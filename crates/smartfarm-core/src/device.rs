//! Device identity and liveness.
//!
//! Devices are owned by the external device registry; the engine only
//! refreshes their liveness fields when telemetry or status messages arrive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device identifier (opaque topic segment).
pub type DeviceId = String;

/// Room identifier.
pub type RoomId = String;

/// Farm identifier.
pub type FarmId = String;

/// Reported device status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device is reachable and reporting.
    Online,
    /// Device has not been heard from.
    Offline,
    /// Actuator is currently running.
    Active,
    /// Actuator is connected but not running.
    Idle,
}

impl DeviceStatus {
    /// Parse a device-reported status string.
    ///
    /// Devices in the field report free-form strings; anything unrecognized
    /// is treated as `Online` since the device evidently just spoke to us.
    pub fn parse(s: &str) -> Self {
        match s {
            "offline" => DeviceStatus::Offline,
            "active" => DeviceStatus::Active,
            "idle" => DeviceStatus::Idle,
            _ => DeviceStatus::Online,
        }
    }

    /// Get the status name.
    pub fn type_name(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Active => "active",
            DeviceStatus::Idle => "idle",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A registered device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Device ID
    pub device_id: DeviceId,
    /// Room the device is installed in
    pub room_id: RoomId,
    /// Farm the room belongs to
    pub farm_id: FarmId,
    /// Last reported status
    pub status: DeviceStatus,
    /// When the device was last heard from
    pub last_seen: Option<DateTime<Utc>>,
    /// Firmware version, if the device has reported one
    pub firmware_version: Option<String>,
}

impl Device {
    /// Create a device record that has never been heard from.
    pub fn new(
        device_id: impl Into<DeviceId>,
        room_id: impl Into<RoomId>,
        farm_id: impl Into<FarmId>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            room_id: room_id.into(),
            farm_id: farm_id.into(),
            status: DeviceStatus::Offline,
            last_seen: None,
            firmware_version: None,
        }
    }

    /// Record that the device was just heard from.
    pub fn mark_seen(&mut self, status: DeviceStatus, at: DateTime<Utc>) {
        self.status = status;
        self.last_seen = Some(at);
    }
}
