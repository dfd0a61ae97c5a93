//! In-memory store.
//!
//! Concurrent maps backed by `DashMap`, suitable for the standalone daemon
//! and for tests. Nothing survives a restart.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use smartfarm_core::{
    AutomationRule, Command, CommandId, CommandStatus, Device, DeviceId, DeviceStatus, Reading,
    RoomId,
};

use crate::store::{FarmStore, StoreError, StoreResult};

/// In-memory implementation of [`FarmStore`].
pub struct MemoryStore {
    devices: DashMap<DeviceId, Device>,
    rules: DashMap<RoomId, Vec<AutomationRule>>,
    commands: DashMap<CommandId, Command>,
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            rules: DashMap::new(),
            commands: DashMap::new(),
            readings: RwLock::new(Vec::new()),
        }
    }

    /// Register a device.
    pub fn add_device(&self, device: Device) {
        self.devices.insert(device.device_id.clone(), device);
    }

    /// Register an automation rule under its room.
    pub fn add_rule(&self, rule: AutomationRule) {
        self.rules
            .entry(rule.room_id.clone())
            .or_default()
            .push(rule);
    }

    /// Snapshot of all saved readings, oldest first.
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.read().expect("readings lock poisoned").clone()
    }

    /// Look up a command record by ID.
    pub fn command(&self, command_id: &str) -> Option<Command> {
        self.commands.get(command_id).map(|c| c.clone())
    }

    /// Snapshot of all command records.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.iter().map(|c| c.clone()).collect()
    }

    /// Number of registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FarmStore for MemoryStore {
    async fn device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        Ok(self.devices.get(device_id).map(|d| d.clone()))
    }

    async fn save_reading(&self, reading: &Reading) -> StoreResult<()> {
        self.readings
            .write()
            .map_err(|_| StoreError::Backend("readings lock poisoned".to_string()))?
            .push(reading.clone());
        Ok(())
    }

    async fn upsert_device_liveness(
        &self,
        device_id: &str,
        status: DeviceStatus,
        last_seen: DateTime<Utc>,
        firmware_version: Option<String>,
    ) -> StoreResult<()> {
        let mut device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::NotFound(device_id.to_string()))?;
        device.mark_seen(status, last_seen);
        if firmware_version.is_some() {
            device.firmware_version = firmware_version;
        }
        Ok(())
    }

    async fn load_enabled_rules(&self, room_id: &str) -> StoreResult<Vec<AutomationRule>> {
        Ok(self
            .rules
            .get(room_id)
            .map(|rules| rules.iter().filter(|r| r.enabled).cloned().collect())
            .unwrap_or_default())
    }

    async fn save_command(&self, command: &Command) -> StoreResult<()> {
        self.commands
            .insert(command.command_id.clone(), command.clone());
        Ok(())
    }

    async fn update_command_status(
        &self,
        command_id: &str,
        status: CommandStatus,
    ) -> StoreResult<()> {
        let mut command = self
            .commands
            .get_mut(command_id)
            .ok_or_else(|| StoreError::NotFound(command_id.to_string()))?;
        command.transition(status);
        Ok(())
    }
}
