//! Broker connection state and reconnect pacing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{info, warn};

use smartfarm_core::{ConnectionState, EngineError, EngineResult, EventBus, FarmEvent};

use crate::topic::{STATUS_WILDCARD, TELEMETRY_WILDCARD};
use crate::transport::{InboundMessage, Transport};

/// Exponent cap for the backoff shift. With any realistic base the delay
/// hits the time cap long before this.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// A supervised session with the broker.
///
/// Tracks an explicit [`ConnectionState`], publishes state changes to the
/// event bus, and gates outbound traffic: nothing is published and nothing
/// is queued unless the session is `Connected`.
pub struct BrokerConnection {
    transport: Arc<dyn Transport>,
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    base_secs: u64,
    cap_secs: u64,
    events: EventBus,
}

impl BrokerConnection {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_secs: u64,
        cap_secs: u64,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            state: RwLock::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            base_secs,
            cap_secs,
            events,
        }
    }

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        *self.state.read().expect("state lock poisoned")
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.write().expect("state lock poisoned");
            let changed = *state != next;
            *state = next;
            changed
        };
        if changed {
            info!(state = ?next, "connection state changed");
            self.events.publish(FarmEvent::ConnectionStatus { state: next });
        }
    }

    /// Establish the session and subscribe to the device topics.
    ///
    /// On success the reconnect backoff resets to its base delay.
    pub async fn connect(&self) -> EngineResult<()> {
        self.set_state(ConnectionState::Connecting);

        if let Err(e) = self.transport.connect().await {
            warn!(error = %e, "broker connect failed");
            self.set_state(ConnectionState::Disconnected);
            return Err(EngineError::BrokerUnavailable);
        }

        for filter in [TELEMETRY_WILDCARD, STATUS_WILDCARD] {
            if let Err(e) = self.transport.subscribe(filter).await {
                warn!(error = %e, filter, "broker subscribe failed");
                self.set_state(ConnectionState::Disconnected);
                return Err(EngineError::BrokerUnavailable);
            }
        }

        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Publish a message, refusing unless the session is `Connected`.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> EngineResult<()> {
        if self.current_state() != ConnectionState::Connected {
            return Err(EngineError::BrokerUnavailable);
        }

        self.transport.publish(topic, payload).await.map_err(|e| {
            warn!(error = %e, topic, "publish failed");
            EngineError::PublishFailed(e.to_string())
        })
    }

    /// Wait for the next inbound message.
    ///
    /// A transport error here means the session broke; the state drops to
    /// `Disconnected` and the caller is expected to reconnect.
    pub async fn next_message(&self) -> EngineResult<InboundMessage> {
        match self.transport.next_message().await {
            Ok(message) => Ok(message),
            Err(e) => {
                warn!(error = %e, "broker session lost");
                self.set_state(ConnectionState::Disconnected);
                Err(EngineError::BrokerUnavailable)
            }
        }
    }

    /// Tear the session down cleanly.
    pub async fn disconnect(&self) -> EngineResult<()> {
        let result = self.transport.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        result.map_err(|e| EngineError::PublishFailed(e.to_string()))
    }

    /// Delay before the next reconnect attempt.
    ///
    /// Doubles per consecutive failure from the base delay up to the cap,
    /// and resets when a connect succeeds.
    pub fn next_backoff(&self) -> Duration {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let delay = self.base_secs.saturating_mul(1u64 << exponent);
        Duration::from_secs(delay.min(self.cap_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn connection(transport: Arc<MockTransport>) -> BrokerConnection {
        BrokerConnection::new(transport, 5, 300, EventBus::new())
    }

    #[tokio::test]
    async fn test_connect_subscribes_and_reaches_connected() {
        let transport = Arc::new(MockTransport::new());
        let conn = connection(transport.clone());

        conn.connect().await.unwrap();

        assert_eq!(conn.current_state(), ConnectionState::Connected);
        assert_eq!(
            transport.subscriptions(),
            vec![TELEMETRY_WILDCARD.to_string(), STATUS_WILDCARD.to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_disconnected() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fail_connect(true);
        let conn = connection(transport);

        assert!(conn.connect().await.is_err());
        assert_eq!(conn.current_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_publish_refused_while_disconnected() {
        let transport = Arc::new(MockTransport::new());
        let conn = connection(transport.clone());

        let err = conn.publish("t", b"x".to_vec()).await.unwrap_err();

        assert!(matches!(err, EngineError::BrokerUnavailable));
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_error_surfaces_as_publish_failed() {
        let transport = Arc::new(MockTransport::new());
        let conn = connection(transport.clone());
        conn.connect().await.unwrap();
        transport.set_fail_publish(true);

        let err = conn.publish("t", b"x".to_vec()).await.unwrap_err();

        assert!(matches!(err, EngineError::PublishFailed(_)));
    }

    #[tokio::test]
    async fn test_backoff_doubles_and_caps() {
        let conn = connection(Arc::new(MockTransport::new()));

        let delays: Vec<u64> = (0..8).map(|_| conn.next_backoff().as_secs()).collect();

        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);
    }

    #[tokio::test]
    async fn test_backoff_resets_after_successful_connect() {
        let conn = connection(Arc::new(MockTransport::new()));

        for _ in 0..4 {
            conn.next_backoff();
        }
        conn.connect().await.unwrap();

        assert_eq!(conn.next_backoff().as_secs(), 5);
    }

    #[tokio::test]
    async fn test_state_changes_are_published() {
        let transport = Arc::new(MockTransport::new());
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let conn = BrokerConnection::new(transport, 5, 300, events);

        conn.connect().await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            FarmEvent::ConnectionStatus { state: ConnectionState::Connecting }
        ));
        assert!(matches!(
            second,
            FarmEvent::ConnectionStatus { state: ConnectionState::Connected }
        ));
    }

    #[tokio::test]
    async fn test_session_loss_marks_disconnected() {
        let transport = Arc::new(MockTransport::new());
        let conn = connection(transport.clone());
        conn.connect().await.unwrap();

        transport.inject("farm/f/room/r/device/d/telemetry", "{}");
        conn.next_message().await.unwrap();

        transport.close_inbound();
        assert!(conn.next_message().await.is_err());
        assert_eq!(conn.current_state(), ConnectionState::Disconnected);
    }
}
