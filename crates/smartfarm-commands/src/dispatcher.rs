//! Command dispatch.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use smartfarm_broker::{command_topic, BrokerConnection};
use smartfarm_core::{
    Command, CommandPayload, CommandStatus, DispatchRequest, EngineError, EngineResult, EventBus,
    FarmEvent,
};
use smartfarm_storage::FarmStore;

use crate::ack::AckTracker;

/// Publishes commands to devices and records their lifecycle.
///
/// Automation and manual requests funnel through the same path: resolve the
/// device, persist a `pending` record, mark `sent` and register with the ack
/// tracker, then publish. A refused publish rolls the command back to
/// `failed` and removes it from the tracker.
pub struct CommandDispatcher {
    store: Arc<dyn FarmStore>,
    broker: Arc<BrokerConnection>,
    acks: Arc<AckTracker>,
    events: EventBus,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<dyn FarmStore>,
        broker: Arc<BrokerConnection>,
        acks: Arc<AckTracker>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            broker,
            acks,
            events,
        }
    }

    /// Dispatch one command request.
    ///
    /// An unknown target device fails the request before any record is
    /// created. A failed publish leaves a `failed` command record behind
    /// and returns the publish error.
    pub async fn dispatch(&self, request: DispatchRequest) -> EngineResult<Command> {
        let device = self
            .store
            .device(&request.device_id)
            .await?
            .ok_or_else(|| EngineError::DeviceNotFound(request.device_id.clone()))?;

        let mut command = Command::new(&device, request.command, request.params, request.issued_by);
        self.store.save_command(&command).await?;
        self.publish_status(&command);

        let payload = CommandPayload {
            command_id: command.command_id.clone(),
            command: command.command.clone(),
            params: command.params.clone(),
            timestamp: Utc::now(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| EngineError::MalformedPayload(e.to_string()))?;
        let topic = command_topic(&device.farm_id, &device.room_id, &device.device_id);

        // The pending entry must exist before the transport can deliver the
        // message; a device ack can race the publish call's return.
        command.transition(CommandStatus::Sent);
        self.store
            .update_command_status(&command.command_id, CommandStatus::Sent)
            .await?;
        self.acks.track(&command);

        match self.broker.publish(&topic, body).await {
            Ok(()) => {
                self.publish_status(&command);
                info!(
                    command_id = %command.command_id,
                    device_id = %command.device_id,
                    command = %command.command,
                    automated = command.is_automated(),
                    "command sent"
                );
                Ok(command)
            }
            Err(e) => {
                warn!(
                    command_id = %command.command_id,
                    device_id = %command.device_id,
                    error = %e,
                    "command publish failed"
                );
                self.acks.untrack(&command.command_id);
                command.transition(CommandStatus::Failed);
                self.store
                    .update_command_status(&command.command_id, CommandStatus::Failed)
                    .await?;
                self.publish_status(&command);
                Err(e)
            }
        }
    }

    /// Consume dispatch requests from the automation queue until it closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<DispatchRequest>) {
        while let Some(request) = rx.recv().await {
            if let Err(e) = self.dispatch(request).await {
                warn!(error = %e, "automation dispatch failed");
            }
        }
    }

    fn publish_status(&self, command: &Command) {
        self.events.publish(FarmEvent::CommandStatus {
            command_id: command.command_id.clone(),
            device_id: command.device_id.clone(),
            status: command.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use smartfarm_broker::testing::MockTransport;
    use smartfarm_broker::{InboundMessage, Transport, TransportError};
    use smartfarm_core::Device;
    use smartfarm_storage::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        transport: Arc<MockTransport>,
        broker: Arc<BrokerConnection>,
        acks: Arc<AckTracker>,
        dispatcher: CommandDispatcher,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::new());
        let events = EventBus::new();
        let broker = Arc::new(BrokerConnection::new(
            transport.clone(),
            5,
            300,
            events.clone(),
        ));
        let acks = Arc::new(AckTracker::new(
            store.clone(),
            events.clone(),
            Duration::from_secs(60),
        ));
        let dispatcher =
            CommandDispatcher::new(store.clone(), broker.clone(), acks.clone(), events);
        Fixture {
            store,
            transport,
            broker,
            acks,
            dispatcher,
        }
    }

    /// Transport whose device acks the command inside the publish call
    /// itself, before the dispatcher regains control.
    struct InstantAckTransport {
        acks: Arc<AckTracker>,
    }

    #[async_trait]
    impl Transport for InstantAckTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn subscribe(&self, _filter: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn publish(&self, _topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
            let payload: CommandPayload = serde_json::from_slice(&payload).unwrap();
            self.acks
                .handle_status(&payload.command_id, false)
                .await
                .unwrap();
            Ok(())
        }

        async fn next_message(&self) -> Result<InboundMessage, TransportError> {
            Err(TransportError::Closed)
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn fan_request() -> DispatchRequest {
        DispatchRequest::automation("fan-1", "fan on", serde_json::json!({"speed": 2}))
    }

    #[tokio::test]
    async fn test_dispatch_publishes_and_marks_sent() {
        let f = fixture();
        f.store.add_device(Device::new("fan-1", "room-1", "farm-1"));
        f.broker.connect().await.unwrap();

        let command = f.dispatcher.dispatch(fan_request()).await.unwrap();

        assert_eq!(command.status, CommandStatus::Sent);
        assert_eq!(
            f.store.command(&command.command_id).unwrap().status,
            CommandStatus::Sent
        );

        let published = f.transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "farm/farm-1/room/room-1/device/fan-1/command");

        let payload: CommandPayload = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(payload.command_id, command.command_id);
        assert_eq!(payload.command, "fan on");
        assert_eq!(payload.params["speed"], 2);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_device_creates_no_record() {
        let f = fixture();
        f.broker.connect().await.unwrap();

        let err = f.dispatcher.dispatch(fan_request()).await.unwrap_err();

        assert!(matches!(err, EngineError::DeviceNotFound(_)));
        assert!(f.transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_while_disconnected_fails_command() {
        let f = fixture();
        f.store.add_device(Device::new("fan-1", "room-1", "farm-1"));

        let err = f.dispatcher.dispatch(fan_request()).await.unwrap_err();

        assert!(matches!(err, EngineError::BrokerUnavailable));
        assert!(f.transport.published().is_empty());

        // The record exists and is failed, so the attempt is auditable.
        let commands = f.store.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].status, CommandStatus::Failed);
    }

    #[tokio::test]
    async fn test_publish_error_marks_command_failed() {
        let f = fixture();
        f.store.add_device(Device::new("fan-1", "room-1", "farm-1"));
        f.broker.connect().await.unwrap();
        f.transport.set_fail_publish(true);

        let err = f.dispatcher.dispatch(fan_request()).await.unwrap_err();

        assert!(matches!(err, EngineError::PublishFailed(_)));
        let commands = f.store.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].status, CommandStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_publish_leaves_nothing_pending() {
        let f = fixture();
        f.store.add_device(Device::new("fan-1", "room-1", "farm-1"));
        f.broker.connect().await.unwrap();
        f.transport.set_fail_publish(true);

        let _ = f.dispatcher.dispatch(fan_request()).await;

        assert_eq!(f.acks.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ack_racing_the_publish_is_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.add_device(Device::new("fan-1", "room-1", "farm-1"));
        let events = EventBus::new();
        let acks = Arc::new(AckTracker::new(
            store.clone(),
            events.clone(),
            Duration::from_secs(60),
        ));
        let transport = Arc::new(InstantAckTransport { acks: acks.clone() });
        let broker = Arc::new(BrokerConnection::new(transport, 5, 300, events.clone()));
        broker.connect().await.unwrap();
        let dispatcher = CommandDispatcher::new(store.clone(), broker, acks.clone(), events);

        let command = dispatcher.dispatch(fan_request()).await.unwrap();

        assert_eq!(
            store.command(&command.command_id).unwrap().status,
            CommandStatus::Acked
        );
        assert_eq!(acks.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_emits_lifecycle_events() {
        let store = Arc::new(MemoryStore::new());
        store.add_device(Device::new("fan-1", "room-1", "farm-1"));
        let transport = Arc::new(MockTransport::new());
        let events = EventBus::new();
        let broker = Arc::new(BrokerConnection::new(
            transport,
            5,
            300,
            events.clone(),
        ));
        let acks = Arc::new(AckTracker::new(
            store.clone(),
            events.clone(),
            Duration::from_secs(60),
        ));
        let dispatcher = CommandDispatcher::new(store, broker.clone(), acks, events.clone());
        broker.connect().await.unwrap();

        let mut rx = events.subscribe_filtered(FarmEvent::is_command_status);
        dispatcher.dispatch(fan_request()).await.unwrap();

        let statuses: Vec<CommandStatus> = std::iter::from_fn(|| {
            rx.try_recv().map(|event| match event {
                FarmEvent::CommandStatus { status, .. } => status,
                _ => unreachable!(),
            })
        })
        .collect();
        assert_eq!(statuses, vec![CommandStatus::Pending, CommandStatus::Sent]);
    }
}
