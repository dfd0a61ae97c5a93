//! Core types for the SmartFarm device communication engine.
//!
//! Provides:
//! - Domain model: devices, sensor readings, automation rules, commands
//! - Wire payload schemas for broker messages
//! - The in-process event bus and the `FarmEvent` union
//! - The engine-wide error taxonomy
//! - Environment-driven configuration

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod payload;
pub mod reading;
pub mod rule;

// Re-exports
pub use command::{Command, CommandId, CommandStatus, DispatchRequest};
pub use config::{BrokerConfig, EngineConfig, TlsConfig};
pub use device::{Device, DeviceId, DeviceStatus, FarmId, RoomId};
pub use error::{EngineError, EngineResult};
pub use event::{ConnectionState, FarmEvent};
pub use eventbus::{EventBus, EventBusReceiver, FilteredReceiver};
pub use payload::{CommandPayload, StatusPayload, TelemetryPayload};
pub use reading::{Parameter, Reading};
pub use rule::{AutomationRule, Comparator, RuleAction, RuleId};
