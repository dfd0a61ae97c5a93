//! MQTT transport backed by `rumqttc`.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use smartfarm_core::BrokerConfig;

use crate::transport::{InboundMessage, Transport, TransportError};

/// Capacity of the client's outbound request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// [`Transport`] over a real MQTT session.
///
/// The event loop must be polled to make any progress, including flushing
/// outbound publishes; the engine drives it through
/// [`next_message`](Transport::next_message).
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: Mutex<EventLoop>,
}

impl MqttTransport {
    /// Build the transport from broker configuration.
    ///
    /// Reads the PEM files up front so a bad path fails here, not on the
    /// first reconnect attempt.
    pub fn new(config: &BrokerConfig) -> Result<Self, TransportError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        if let Some(tls) = &config.tls {
            let read = |path: &std::path::Path| {
                std::fs::read(path).map_err(|e| {
                    TransportError::Connect(format!("failed to read {}: {e}", path.display()))
                })
            };
            let ca = read(&tls.ca_path)?;
            let cert = read(&tls.cert_path)?;
            let key = read(&tls.key_path)?;
            options.set_transport(rumqttc::Transport::tls(ca, Some((cert, key)), None));
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        Ok(Self {
            client,
            event_loop: Mutex::new(event_loop),
        })
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut event_loop = self.event_loop.lock().await;
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!(code = ?ack.code, "broker accepted session");
                    return Ok(());
                }
                Ok(event) => {
                    debug!(?event, "event before connack");
                }
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    }

    async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn next_message(&self) -> Result<InboundMessage, TransportError> {
        let mut event_loop = self.event_loop.lock().await;
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(_) => {
                    // Pings, acks for our own publishes, and so on.
                }
                Err(e) => {
                    warn!(error = %e, "mqtt event loop error");
                    return Err(TransportError::Io(e.to_string()));
                }
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
