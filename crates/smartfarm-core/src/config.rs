//! Engine configuration.
//!
//! The engine is configured from the environment, not a CLI. Every value has
//! a default suitable for a local development broker; TLS is enabled only
//! when all three PEM paths are provided.

use std::path::PathBuf;

use uuid::Uuid;

/// Environment variable names.
pub mod env_vars {
    pub const MQTT_HOST: &str = "SMARTFARM_MQTT_HOST";
    pub const MQTT_PORT: &str = "SMARTFARM_MQTT_PORT";
    pub const CA_PATH: &str = "SMARTFARM_CA_PATH";
    pub const CERT_PATH: &str = "SMARTFARM_CERT_PATH";
    pub const KEY_PATH: &str = "SMARTFARM_KEY_PATH";
    pub const RECONNECT_BASE_SECS: &str = "SMARTFARM_RECONNECT_BASE_SECS";
    pub const RECONNECT_CAP_SECS: &str = "SMARTFARM_RECONNECT_CAP_SECS";
    pub const ACK_TIMEOUT_SECS: &str = "SMARTFARM_ACK_TIMEOUT_SECS";
    pub const ACK_SWEEP_INTERVAL_MS: &str = "SMARTFARM_ACK_SWEEP_INTERVAL_MS";
    pub const DISPATCH_QUEUE: &str = "SMARTFARM_DISPATCH_QUEUE";
    pub const EVENT_CAPACITY: &str = "SMARTFARM_EVENT_CAPACITY";
}

/// Default configuration values.
pub mod defaults {
    pub const MQTT_HOST: &str = "localhost";
    pub const MQTT_PORT: u16 = 8883;
    pub const KEEP_ALIVE_SECS: u64 = 60;
    pub const RECONNECT_BASE_SECS: u64 = 5;
    pub const RECONNECT_CAP_SECS: u64 = 300;
    pub const ACK_TIMEOUT_SECS: u64 = 60;
    pub const ACK_SWEEP_INTERVAL_MS: u64 = 1000;
    pub const DISPATCH_QUEUE: usize = 64;
    pub const EVENT_CAPACITY: usize = 256;
}

/// TLS material for the broker session.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// CA certificate (PEM)
    pub ca_path: PathBuf,
    /// Client certificate (PEM)
    pub cert_path: PathBuf,
    /// Client private key (PEM)
    pub key_path: PathBuf,
}

/// Broker session configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// MQTT client id; randomized per process so restarts don't steal a
    /// still-live session
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// TLS material; `None` means plain TCP
    pub tls: Option<TlsConfig>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: defaults::MQTT_HOST.to_string(),
            port: defaults::MQTT_PORT,
            client_id: random_client_id(),
            keep_alive_secs: defaults::KEEP_ALIVE_SECS,
            tls: None,
        }
    }
}

fn random_client_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("smartfarm-engine-{}", &suffix[..8])
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Broker session settings
    pub broker: BrokerConfig,
    /// Reconnect backoff base delay in seconds
    pub reconnect_base_secs: u64,
    /// Reconnect backoff cap in seconds
    pub reconnect_cap_secs: u64,
    /// Hard deadline for command acknowledgment in seconds
    pub ack_timeout_secs: u64,
    /// Period of the ack timeout sweep in milliseconds
    pub ack_sweep_interval_ms: u64,
    /// Bound of the automation dispatch work queue
    pub dispatch_queue: usize,
    /// Event bus channel capacity
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            reconnect_base_secs: defaults::RECONNECT_BASE_SECS,
            reconnect_cap_secs: defaults::RECONNECT_CAP_SECS,
            ack_timeout_secs: defaults::ACK_TIMEOUT_SECS,
            ack_sweep_interval_ms: defaults::ACK_SWEEP_INTERVAL_MS,
            dispatch_queue: defaults::DISPATCH_QUEUE,
            event_capacity: defaults::EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let tls = match (
            std::env::var(env_vars::CA_PATH).ok(),
            std::env::var(env_vars::CERT_PATH).ok(),
            std::env::var(env_vars::KEY_PATH).ok(),
        ) {
            (Some(ca), Some(cert), Some(key)) => Some(TlsConfig {
                ca_path: PathBuf::from(ca),
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => None,
        };

        Self {
            broker: BrokerConfig {
                host: std::env::var(env_vars::MQTT_HOST)
                    .unwrap_or_else(|_| defaults::MQTT_HOST.to_string()),
                port: var_or(env_vars::MQTT_PORT, defaults::MQTT_PORT),
                client_id: random_client_id(),
                keep_alive_secs: defaults::KEEP_ALIVE_SECS,
                tls,
            },
            reconnect_base_secs: var_or(env_vars::RECONNECT_BASE_SECS, defaults::RECONNECT_BASE_SECS),
            reconnect_cap_secs: var_or(env_vars::RECONNECT_CAP_SECS, defaults::RECONNECT_CAP_SECS),
            ack_timeout_secs: var_or(env_vars::ACK_TIMEOUT_SECS, defaults::ACK_TIMEOUT_SECS),
            ack_sweep_interval_ms: var_or(
                env_vars::ACK_SWEEP_INTERVAL_MS,
                defaults::ACK_SWEEP_INTERVAL_MS,
            ),
            dispatch_queue: var_or(env_vars::DISPATCH_QUEUE, defaults::DISPATCH_QUEUE),
            event_capacity: var_or(env_vars::EVENT_CAPACITY, defaults::EVENT_CAPACITY),
        }
    }
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = EngineConfig::default();
        assert_eq!(config.reconnect_base_secs, 5);
        assert_eq!(config.reconnect_cap_secs, 300);
        assert_eq!(config.ack_timeout_secs, 60);
        assert_eq!(config.broker.port, 8883);
        assert!(config.broker.tls.is_none());
    }

    #[test]
    fn test_client_ids_are_unique_per_process() {
        let a = BrokerConfig::default();
        let b = BrokerConfig::default();
        assert_ne!(a.client_id, b.client_id);
        assert!(a.client_id.starts_with("smartfarm-engine-"));
    }

    #[test]
    fn test_var_or_falls_back_on_garbage() {
        // Unset variable
        assert_eq!(var_or::<u64>("SMARTFARM_TEST_UNSET_VAR", 42), 42);
    }
}
