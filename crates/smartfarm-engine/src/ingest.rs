//! Telemetry ingestion.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use smartfarm_core::{
    DeviceStatus, EngineError, EngineResult, EventBus, FarmEvent, Reading, TelemetryPayload,
};
use smartfarm_storage::FarmStore;

use smartfarm_broker::TopicAddress;

/// Turns decoded telemetry payloads into persisted readings.
///
/// Messages from devices the registry does not know are rejected; the
/// engine never auto-registers hardware.
pub struct TelemetryIngestor {
    store: Arc<dyn FarmStore>,
    events: EventBus,
}

impl TelemetryIngestor {
    pub fn new(store: Arc<dyn FarmStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Ingest one telemetry message.
    ///
    /// Persists the reading, refreshes the device's liveness, and emits a
    /// telemetry event. The reading is saved before anything reacts to it,
    /// so an automation consequence can never exist without its cause.
    pub async fn ingest(
        &self,
        address: &TopicAddress,
        payload: &TelemetryPayload,
    ) -> EngineResult<Reading> {
        let ingested_at = Utc::now();

        let Some(_device) = self.store.device(&address.device_id).await? else {
            debug!(device_id = %address.device_id, "telemetry from unregistered device");
            return Err(EngineError::UnknownDevice(address.device_id.clone()));
        };

        let reading = Reading::from_telemetry(
            address.device_id.clone(),
            address.room_id.clone(),
            address.farm_id.clone(),
            payload,
            ingested_at,
        )?;

        self.store.save_reading(&reading).await?;
        self.store
            .upsert_device_liveness(&address.device_id, DeviceStatus::Online, ingested_at, None)
            .await?;

        self.events.publish(FarmEvent::Telemetry {
            reading: reading.clone(),
        });

        Ok(reading)
    }
}
