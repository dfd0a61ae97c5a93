//! Engine assembly and supervision.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use smartfarm_broker::{BrokerConnection, Transport};
use smartfarm_commands::{AckTracker, CommandDispatcher};
use smartfarm_core::{Command, DispatchRequest, EngineConfig, EngineResult, EventBus};
use smartfarm_rules::RuleEngine;
use smartfarm_storage::FarmStore;

use crate::ingest::TelemetryIngestor;
use crate::router::MessageRouter;

/// The assembled engine.
///
/// Wires the broker connection, router, rule engine, dispatcher, and ack
/// tracker together and supervises the connect-consume-reconnect cycle.
pub struct Engine {
    config: EngineConfig,
    events: EventBus,
    broker: Arc<BrokerConnection>,
    router: MessageRouter,
    acks: Arc<AckTracker>,
    dispatcher: Arc<CommandDispatcher>,
    dispatch_rx: Mutex<Option<mpsc::Receiver<DispatchRequest>>>,
}

impl Engine {
    /// Assemble an engine over the given store and transport.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn FarmStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let events = EventBus::with_capacity(config.event_capacity);
        let broker = Arc::new(BrokerConnection::new(
            transport,
            config.reconnect_base_secs,
            config.reconnect_cap_secs,
            events.clone(),
        ));
        let acks = Arc::new(AckTracker::new(
            store.clone(),
            events.clone(),
            Duration::from_secs(config.ack_timeout_secs),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            store.clone(),
            broker.clone(),
            acks.clone(),
            events.clone(),
        ));

        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_queue);
        let rules = RuleEngine::new(store.clone(), events.clone(), dispatch_tx);
        let ingestor = TelemetryIngestor::new(store.clone(), events.clone());
        let router = MessageRouter::new(ingestor, rules, acks.clone(), store);

        Self {
            config,
            events,
            broker,
            router,
            acks,
            dispatcher,
            dispatch_rx: Mutex::new(Some(dispatch_rx)),
        }
    }

    /// The engine's event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The supervised broker connection.
    pub fn broker(&self) -> &Arc<BrokerConnection> {
        &self.broker
    }

    /// Dispatch a command outside the automation path (a user action).
    pub async fn dispatch(&self, request: DispatchRequest) -> EngineResult<Command> {
        self.dispatcher.dispatch(request).await
    }

    /// Run until the shutdown signal flips to `true`.
    ///
    /// Connect failures and dropped sessions are retried with exponential
    /// backoff; malformed or unroutable messages are logged and skipped
    /// without disturbing the session.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let sweep_interval = Duration::from_millis(self.config.ack_sweep_interval_ms);
        let sweeper = tokio::spawn(self.acks.clone().run(sweep_interval));

        let dispatch_rx = self
            .dispatch_rx
            .lock()
            .await
            .take()
            .expect("engine already running");
        let consumer = tokio::spawn(self.dispatcher.clone().run(dispatch_rx));

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.broker.connect().await.is_ok() {
                self.consume_session(&mut shutdown).await;
            }

            if *shutdown.borrow() {
                break;
            }

            let delay = self.broker.next_backoff();
            info!(delay_secs = delay.as_secs(), "waiting before reconnect");
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("engine shutting down");
        self.acks.stop();
        sweeper.abort();
        consumer.abort();
        if let Err(e) = self.broker.disconnect().await {
            warn!(error = %e, "disconnect during shutdown failed");
        }
    }

    /// Consume messages until the session breaks or shutdown is requested.
    async fn consume_session(&self, shutdown: &mut watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                message = self.broker.next_message() => {
                    let Ok(message) = message else {
                        return;
                    };
                    if let Err(e) = self.router.route(&message.topic, &message.payload).await {
                        warn!(topic = %message.topic, error = %e, "message rejected");
                    }
                }
            }
        }
    }
}
