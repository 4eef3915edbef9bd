use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{RoleId, SubscriptionId};

/// Lifecycle events published by roles and the subscription runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeEvent {
    // ── Subscription lifecycle ─────────────────────────────────
    SubscriptionStarted {
        subscription_id: SubscriptionId,
        role_id: RoleId,
        role: String,
        trigger: String,
    },
    SubscriptionCycle {
        subscription_id: SubscriptionId,
        role_id: RoleId,
        cycle: u64,
        /// Id of the produced message, `None` when the role had nothing to do.
        message_id: Option<Uuid>,
    },
    SubscriptionFailed {
        subscription_id: SubscriptionId,
        role_id: RoleId,
        stage: String,
        error: String,
        /// Whether the subscription stays alive after this failure.
        restarting: bool,
    },
    SubscriptionStopped {
        subscription_id: SubscriptionId,
        role_id: RoleId,
        reason: String,
        at: DateTime<Utc>,
    },

    // ── Role lifecycle ─────────────────────────────────────────
    RoleStateChanged {
        role_id: RoleId,
        role: String,
        from: Option<usize>,
        to: usize,
    },
}

/// A broadcast-based event bus for runtime observers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RuntimeEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: RuntimeEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
