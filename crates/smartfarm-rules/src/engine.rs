//! The rule engine.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use smartfarm_core::{DispatchRequest, EngineResult, EventBus, FarmEvent, Reading};
use smartfarm_storage::FarmStore;

/// Evaluates room rules against incoming readings.
///
/// Rules are re-read from the store on every evaluation, so edits made
/// through the management layer take effect on the next reading without
/// any cache invalidation.
pub struct RuleEngine {
    store: Arc<dyn FarmStore>,
    events: EventBus,
    dispatch_tx: mpsc::Sender<DispatchRequest>,
}

impl RuleEngine {
    pub fn new(
        store: Arc<dyn FarmStore>,
        events: EventBus,
        dispatch_tx: mpsc::Sender<DispatchRequest>,
    ) -> Self {
        Self {
            store,
            events,
            dispatch_tx,
        }
    }

    /// Evaluate all enabled rules of the reading's room.
    ///
    /// Returns the number of rules that fired. A rule whose parameter the
    /// reading does not carry is skipped, not treated as zero.
    pub async fn evaluate(&self, reading: &Reading) -> EngineResult<usize> {
        let rules = self.store.load_enabled_rules(&reading.room_id).await?;
        let mut fired = 0;

        for rule in rules {
            let Some(value) = reading.value(rule.parameter) else {
                continue;
            };
            if !rule.comparator.holds(value, rule.threshold) {
                continue;
            }

            info!(
                rule_id = %rule.rule_id,
                rule_name = %rule.name,
                room_id = %reading.room_id,
                device_id = %rule.action.device_id,
                parameter = %rule.parameter,
                value,
                threshold = rule.threshold,
                "automation rule fired"
            );

            self.events.publish(FarmEvent::AutomationTriggered {
                rule_id: rule.rule_id.clone(),
                rule_name: rule.name.clone(),
                room_id: reading.room_id.clone(),
                device_id: rule.action.device_id.clone(),
                parameter: rule.parameter,
                comparator: rule.comparator,
                threshold: rule.threshold,
                value,
            });

            let request = DispatchRequest::automation(
                rule.action.device_id.clone(),
                rule.action.command.clone(),
                rule.action.params.clone(),
            );
            match self.dispatch_tx.try_send(request) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Backpressure: shedding the action beats stalling
                    // telemetry ingestion behind a slow broker.
                    warn!(rule_id = %rule.rule_id, "dispatch queue full, action dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(rule_id = %rule.rule_id, "dispatcher gone, action dropped");
                }
            }

            fired += 1;
        }

        Ok(fired)
    }
}
