//! Broker connectivity for the SmartFarm engine.
//!
//! Owns the topic grammar, the MQTT transport, and the supervised
//! [`BrokerConnection`] with its reconnect backoff. Everything above this
//! crate deals in parsed topics and typed payloads, never raw MQTT.

pub mod connection;
pub mod mqtt;
pub mod testing;
pub mod topic;
pub mod transport;

pub use connection::BrokerConnection;
pub use mqtt::MqttTransport;
pub use topic::{command_topic, parse_topic, MessageKind, TopicAddress};
pub use topic::{STATUS_WILDCARD, TELEMETRY_WILDCARD};
pub use transport::{InboundMessage, Transport, TransportError};
