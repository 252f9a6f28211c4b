use std::collections::HashSet;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use operator_events::Envelope;

/// What this service knows about a purchase. The package is kept as opaque
/// JSON; only the core service owns its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseNotification {
    pub id: String,
    pub purchase_date: DateTime<Utc>,
    pub sub_package: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("undecodable purchase notification {message_id}: {reason}")]
    Decode { message_id: String, reason: String },

    #[error("notification projection lock poisoned")]
    Poisoned,
}

/// Confirmed purchases in arrival order. A purchase id seen twice is kept once.
#[derive(Debug, Default)]
pub struct NotificationProjection {
    state: RwLock<ProjectionState>,
}

#[derive(Debug, Default)]
struct ProjectionState {
    items: Vec<PurchaseNotification>,
    seen: HashSet<String>,
}

impl NotificationProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, envelope: &Envelope) -> Result<(), ProjectionError> {
        let notification: PurchaseNotification =
            envelope.decode().map_err(|e| ProjectionError::Decode {
                message_id: envelope.message_id().to_string(),
                reason: e.to_string(),
            })?;

        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        if !state.seen.insert(notification.id.clone()) {
            debug!(purchase_id = %notification.id, "duplicate purchase notification ignored");
            return Ok(());
        }

        info!(
            purchase_id = %notification.id,
            purchase_date = %notification.purchase_date,
            sub_package = %notification.sub_package,
            "Purchase Confirmed"
        );
        state.items.push(notification);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<PurchaseNotification>, ProjectionError> {
        Ok(self
            .state
            .read()
            .map_err(|_| ProjectionError::Poisoned)?
            .items
            .clone())
    }
}
