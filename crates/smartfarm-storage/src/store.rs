//! The [`FarmStore`] trait, the engine's read/write interface to durable state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use smartfarm_core::{
    AutomationRule, Command, CommandStatus, Device, DeviceStatus, EngineError, Reading,
};

/// Storage error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e.to_string())
    }
}

/// Storage result alias.
pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow read/write interface to the durable store.
///
/// The engine never deletes devices or edits rules; it only records readings
/// and commands and refreshes device liveness.
#[async_trait]
pub trait FarmStore: Send + Sync + 'static {
    /// Look up a device by ID.
    async fn device(&self, device_id: &str) -> StoreResult<Option<Device>>;

    /// Persist a new telemetry reading.
    async fn save_reading(&self, reading: &Reading) -> StoreResult<()>;

    /// Refresh a device's liveness fields.
    ///
    /// `firmware_version` is only written when `Some`; devices report it
    /// sporadically and an absent value must not clear the stored one.
    async fn upsert_device_liveness(
        &self,
        device_id: &str,
        status: DeviceStatus,
        last_seen: DateTime<Utc>,
        firmware_version: Option<String>,
    ) -> StoreResult<()>;

    /// Load the enabled automation rules for a room.
    async fn load_enabled_rules(&self, room_id: &str) -> StoreResult<Vec<AutomationRule>>;

    /// Persist a newly created command record.
    async fn save_command(&self, command: &Command) -> StoreResult<()>;

    /// Record a command lifecycle transition.
    async fn update_command_status(
        &self,
        command_id: &str,
        status: CommandStatus,
    ) -> StoreResult<()>;
}
