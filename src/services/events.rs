//! Event system for menu changes
//!
//! Services emit a [`MenuEvent`] after each committed write. Delivery to
//! clients (websockets, notifications) belongs to whoever subscribes.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::menu::{ContentCategory, NodeKind};

/// Menu events emitted by services
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MenuEvent {
    NodeCreated {
        id: String,
        group_id: String,
        kind: NodeKind,
        position: Option<u32>,
    },
    NodeUpdated {
        id: String,
        group_id: String,
    },
    NodeReordered {
        id: String,
        group_id: String,
        parent_id: Option<String>,
        position: Option<u32>,
    },
    NodeRemovedFromMenu {
        id: String,
        group_id: String,
    },
    NodeDeleted {
        id: String,
        group_id: String,
    },
    HomeReferenceChanged {
        group_id: String,
        node_id: String,
    },
    MenuBootstrapped {
        group_id: String,
        node_count: usize,
    },
    CategorySurfaced {
        group_id: String,
        category: ContentCategory,
        node_id: String,
    },
}

impl MenuEvent {
    pub fn group_id(&self) -> &str {
        match self {
            MenuEvent::NodeCreated { group_id, .. }
            | MenuEvent::NodeUpdated { group_id, .. }
            | MenuEvent::NodeReordered { group_id, .. }
            | MenuEvent::NodeRemovedFromMenu { group_id, .. }
            | MenuEvent::NodeDeleted { group_id, .. }
            | MenuEvent::HomeReferenceChanged { group_id, .. }
            | MenuEvent::MenuBootstrapped { group_id, .. }
            | MenuEvent::CategorySurfaced { group_id, .. } => group_id,
        }
    }
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &MenuEvent);
}

/// Event bus for broadcasting menu events
pub struct EventBus {
    sender: broadcast::Sender<MenuEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: MenuEvent) {
        trace!(event = ?event, "Emitting menu event");
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MenuEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &MenuEvent) {
        match event {
            MenuEvent::NodeCreated { id, group_id, kind, .. } => {
                debug!(id = %id, group = %group_id, kind = %kind, "Menu node created");
            }
            MenuEvent::NodeDeleted { id, group_id } => {
                debug!(id = %id, group = %group_id, "Menu node deleted");
            }
            MenuEvent::MenuBootstrapped { group_id, node_count } => {
                info!(group = %group_id, nodes = node_count, "Menu bootstrapped");
            }
            _ => {
                trace!(event = ?event, "Menu event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
