//! Acknowledgment tracking for in-flight commands.
//!
//! Every `sent` command is watched until the device acknowledges it or the
//! timeout sweep fails it. An ack and a timeout can race; whichever removes
//! the pending entry first wins and the loser becomes a no-op, so a command
//! is finalized exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use smartfarm_core::{
    Command, CommandId, CommandStatus, DeviceId, EngineResult, EventBus, FarmEvent,
};
use smartfarm_storage::FarmStore;

/// One command awaiting acknowledgment.
#[derive(Debug, Clone)]
struct PendingAck {
    device_id: DeviceId,
    sent_at: DateTime<Utc>,
}

/// Tracks in-flight commands and enforces the ack deadline.
pub struct AckTracker {
    pending: RwLock<HashMap<CommandId, PendingAck>>,
    store: Arc<dyn FarmStore>,
    events: EventBus,
    timeout: chrono::Duration,
    running: AtomicBool,
}

impl AckTracker {
    pub fn new(store: Arc<dyn FarmStore>, events: EventBus, timeout: Duration) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            store,
            events,
            timeout: chrono::Duration::from_std(timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            running: AtomicBool::new(false),
        }
    }

    /// Start watching a command that was just sent.
    pub fn track(&self, command: &Command) {
        self.track_at(command, Utc::now());
    }

    /// Start watching a command with an explicit send time.
    pub fn track_at(&self, command: &Command, sent_at: DateTime<Utc>) {
        self.pending.write().expect("pending lock poisoned").insert(
            command.command_id.clone(),
            PendingAck {
                device_id: command.device_id.clone(),
                sent_at,
            },
        );
    }

    /// Stop watching a command without finalizing it.
    ///
    /// Used when a publish is rolled back; a no-op if an ack already
    /// removed the entry.
    pub fn untrack(&self, command_id: &str) {
        self.pending
            .write()
            .expect("pending lock poisoned")
            .remove(command_id);
    }

    /// Resolve a pending command from a device acknowledgment.
    ///
    /// Returns `true` if this call finalized the command. An unknown or
    /// already-finalized `command_id` is ignored; duplicate acks and
    /// acks arriving after the timeout sweep are normal, not errors.
    pub async fn handle_status(
        &self,
        command_id: &str,
        declares_failure: bool,
    ) -> EngineResult<bool> {
        let removed = self
            .pending
            .write()
            .expect("pending lock poisoned")
            .remove(command_id);

        let Some(entry) = removed else {
            debug!(command_id, "ack for unknown or finalized command ignored");
            return Ok(false);
        };

        let status = if declares_failure {
            CommandStatus::Failed
        } else {
            CommandStatus::Acked
        };
        info!(command_id, device_id = %entry.device_id, %status, "command acknowledged");

        self.store.update_command_status(command_id, status).await?;
        self.events.publish(FarmEvent::CommandStatus {
            command_id: command_id.to_string(),
            device_id: entry.device_id,
            status,
        });
        Ok(true)
    }

    /// Fail every pending command whose deadline has passed, as of `now`.
    ///
    /// Returns the number of commands timed out.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let expired: Vec<(CommandId, PendingAck)> = {
            let mut pending = self.pending.write().expect("pending lock poisoned");
            let ids: Vec<CommandId> = pending
                .iter()
                .filter(|(_, entry)| now - entry.sent_at >= self.timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (command_id, entry) in &expired {
            warn!(
                command_id = %command_id,
                device_id = %entry.device_id,
                sent_at = %entry.sent_at,
                "command ack deadline passed"
            );
            self.store
                .update_command_status(command_id, CommandStatus::Failed)
                .await?;
            self.events.publish(FarmEvent::CommandStatus {
                command_id: command_id.clone(),
                device_id: entry.device_id.clone(),
                status: CommandStatus::Failed,
            });
        }

        Ok(expired.len())
    }

    /// Fail every pending command whose deadline has passed.
    pub async fn sweep(&self) -> EngineResult<usize> {
        self.sweep_at(Utc::now()).await
    }

    /// Run the periodic timeout sweep until [`stop`](Self::stop) is called.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        self.running.store(true, Ordering::SeqCst);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "ack timeout sweep failed");
            }
        }
    }

    /// Stop the periodic sweep after its current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Number of commands currently awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.pending.read().expect("pending lock poisoned").len()
    }
}
