//! Sensor readings.
//!
//! A [`Reading`] is the immutable record created for every accepted telemetry
//! message. Fields that the device did not report stay `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, FarmId, RoomId};
use crate::error::EngineError;
use crate::payload::TelemetryPayload;

/// Sensor parameters an automation rule can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Humidity,
    Co2,
    Light,
    SubstrateMoisture,
    Battery,
}

impl Parameter {
    /// Get the parameter name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Humidity => "humidity",
            Parameter::Co2 => "co2",
            Parameter::Light => "light",
            Parameter::SubstrateMoisture => "substrate_moisture",
            Parameter::Battery => "battery",
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A single telemetry reading from one device.
///
/// Created once per ingested telemetry message and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Device the reading came from
    pub device_id: DeviceId,
    /// Room the device belongs to
    pub room_id: RoomId,
    /// Farm the room belongs to
    pub farm_id: FarmId,
    /// Measurement time: the payload timestamp when present, else ingestion time
    pub recorded_at: DateTime<Utc>,
    /// Air temperature in °C
    pub temperature_c: Option<f64>,
    /// Relative humidity in %
    pub humidity_pct: Option<f64>,
    /// CO₂ concentration in ppm
    pub co2_ppm: Option<f64>,
    /// Illuminance in lux
    pub light_lux: Option<f64>,
    /// Substrate moisture fraction
    pub substrate_moisture: Option<f64>,
    /// Battery voltage
    pub battery_v: Option<f64>,
}

impl Reading {
    /// Build a reading from a decoded telemetry payload.
    ///
    /// A missing payload timestamp defaults to `ingested_at`; a present but
    /// unparsable one rejects the whole message as malformed.
    pub fn from_telemetry(
        device_id: impl Into<DeviceId>,
        room_id: impl Into<RoomId>,
        farm_id: impl Into<FarmId>,
        payload: &TelemetryPayload,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let recorded_at = match &payload.timestamp {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|e| EngineError::MalformedPayload(format!("bad timestamp {raw:?}: {e}")))?
                .with_timezone(&Utc),
            None => ingested_at,
        };

        Ok(Self {
            device_id: device_id.into(),
            room_id: room_id.into(),
            farm_id: farm_id.into(),
            recorded_at,
            temperature_c: payload.temperature_c,
            humidity_pct: payload.humidity_pct,
            co2_ppm: payload.co2_ppm,
            light_lux: payload.light_lux,
            substrate_moisture: payload.substrate_moisture,
            battery_v: payload.battery_v,
        })
    }

    /// Get the value of one parameter, if the device reported it.
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Temperature => self.temperature_c,
            Parameter::Humidity => self.humidity_pct,
            Parameter::Co2 => self.co2_ppm,
            Parameter::Light => self.light_lux,
            Parameter::SubstrateMoisture => self.substrate_moisture,
            Parameter::Battery => self.battery_v,
        }
    }
}
