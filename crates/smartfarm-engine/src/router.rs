//! Inbound message routing.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use smartfarm_broker::{parse_topic, MessageKind};
use smartfarm_commands::AckTracker;
use smartfarm_core::{
    DeviceStatus, EngineError, EngineResult, StatusPayload, TelemetryPayload,
};
use smartfarm_rules::RuleEngine;
use smartfarm_storage::FarmStore;

use crate::ingest::TelemetryIngestor;

/// Routes raw broker messages to the right handler by topic kind.
///
/// A malformed message is rejected whole; no partial effects are applied
/// for it.
pub struct MessageRouter {
    ingestor: TelemetryIngestor,
    rules: RuleEngine,
    acks: Arc<AckTracker>,
    store: Arc<dyn FarmStore>,
}

impl MessageRouter {
    pub fn new(
        ingestor: TelemetryIngestor,
        rules: RuleEngine,
        acks: Arc<AckTracker>,
        store: Arc<dyn FarmStore>,
    ) -> Self {
        Self {
            ingestor,
            rules,
            acks,
            store,
        }
    }

    /// Handle one inbound message.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> EngineResult<()> {
        let address = parse_topic(topic)?;

        match address.kind {
            MessageKind::Telemetry => {
                let payload: TelemetryPayload = serde_json::from_slice(payload)?;
                let reading = self.ingestor.ingest(&address, &payload).await?;
                self.rules.evaluate(&reading).await?;
            }
            MessageKind::Status => {
                let payload: StatusPayload = serde_json::from_slice(payload)?;
                self.handle_status(&address.device_id, &payload).await?;
            }
        }

        Ok(())
    }

    async fn handle_status(&self, device_id: &str, payload: &StatusPayload) -> EngineResult<()> {
        if self.store.device(device_id).await?.is_none() {
            debug!(device_id, "status from unregistered device");
            return Err(EngineError::UnknownDevice(device_id.to_string()));
        }

        let status = payload
            .status
            .as_deref()
            .map(DeviceStatus::parse)
            .unwrap_or(DeviceStatus::Online);
        self.store
            .upsert_device_liveness(device_id, status, Utc::now(), payload.firmware_version.clone())
            .await?;

        if let Some(command_id) = &payload.command_id {
            self.acks
                .handle_status(command_id, payload.declares_failure())
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use smartfarm_core::{Command, CommandStatus, Device, EventBus};
    use smartfarm_storage::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        acks: Arc<AckTracker>,
        router: MessageRouter,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new();
        let (dispatch_tx, _dispatch_rx) = mpsc::channel(8);
        let acks = Arc::new(AckTracker::new(
            store.clone(),
            events.clone(),
            Duration::from_secs(60),
        ));
        let router = MessageRouter::new(
            TelemetryIngestor::new(store.clone(), events.clone()),
            RuleEngine::new(store.clone(), events, dispatch_tx),
            acks.clone(),
            store.clone(),
        );
        Fixture {
            store,
            acks,
            router,
        }
    }

    #[tokio::test]
    async fn test_telemetry_message_is_ingested() {
        let f = fixture();
        f.store.add_device(Device::new("sensor-1", "room-1", "farm-1"));

        f.router
            .route(
                "farm/farm-1/room/room-1/device/sensor-1/telemetry",
                br#"{"temperature_c": 21.0}"#,
            )
            .await
            .unwrap();

        assert_eq!(f.store.readings().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_topic_is_rejected() {
        let f = fixture();

        let err = f
            .router
            .route("farm/abc/room//device/xyz/telemetry", b"{}")
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::MalformedTopic(_)));
        assert!(f.store.readings().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let f = fixture();
        f.store.add_device(Device::new("sensor-1", "room-1", "farm-1"));

        let err = f
            .router
            .route(
                "farm/farm-1/room/room-1/device/sensor-1/telemetry",
                b"not json",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::MalformedPayload(_)));
        assert!(f.store.readings().is_empty());
    }

    #[tokio::test]
    async fn test_status_refreshes_liveness_and_firmware() {
        let f = fixture();
        f.store.add_device(Device::new("fan-1", "room-1", "farm-1"));

        f.router
            .route(
                "farm/farm-1/room/room-1/device/fan-1/status",
                br#"{"status": "active", "firmware_version": "1.4.2"}"#,
            )
            .await
            .unwrap();

        let device = f.store.device("fan-1").await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Active);
        assert_eq!(device.firmware_version.as_deref(), Some("1.4.2"));
    }

    #[tokio::test]
    async fn test_status_ack_resolves_pending_command() {
        let f = fixture();
        let device = Device::new("fan-1", "room-1", "farm-1");
        f.store.add_device(device.clone());
        let mut command = Command::new(&device, "fan on", serde_json::json!({}), None);
        command.transition(CommandStatus::Sent);
        f.store.save_command(&command).await.unwrap();
        f.acks.track(&command);

        let body = format!(r#"{{"status": "idle", "command_id": "{}"}}"#, command.command_id);
        f.router
            .route("farm/farm-1/room/room-1/device/fan-1/status", body.as_bytes())
            .await
            .unwrap();

        assert_eq!(
            f.store.command(&command.command_id).unwrap().status,
            CommandStatus::Acked
        );
        assert_eq!(f.acks.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_status_failure_ack_fails_command() {
        let f = fixture();
        let device = Device::new("fan-1", "room-1", "farm-1");
        f.store.add_device(device.clone());
        let mut command = Command::new(&device, "fan on", serde_json::json!({}), None);
        command.transition(CommandStatus::Sent);
        f.store.save_command(&command).await.unwrap();
        f.acks.track(&command);

        let body = format!(
            r#"{{"command_id": "{}", "ack_status": "failed"}}"#,
            command.command_id
        );
        f.router
            .route("farm/farm-1/room/room-1/device/fan-1/status", body.as_bytes())
            .await
            .unwrap();

        assert_eq!(
            f.store.command(&command.command_id).unwrap().status,
            CommandStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_status_from_unknown_device_is_rejected() {
        let f = fixture();

        let err = f
            .router
            .route(
                "farm/farm-1/room/room-1/device/ghost/status",
                br#"{"status": "online"}"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::UnknownDevice(_)));
    }
}
