//! Service layer for group-menu
//!
//! Services sit between callers (CLI, API handlers) and the ordering engine.
//! They own the permission check, the transaction boundary, conflict retries
//! and event emission.
//!
//! ## Architecture
//!
//! ```text
//! Callers (thin)
//!     ↓
//! MenuService (gate, transaction, retries, events)
//!     ↓
//! OrderingEngine / bootstrap (ordering rules)
//!     ↓
//! db/*.rs (row access)
//!     ↓
//! SQLite Database
//! ```

pub mod events;
pub mod permissions;
pub mod menu_service;

pub use events::{spawn_logging_listener, EventBus, EventListener, MenuEvent};
pub use menu_service::{MenuService, MenuTree, MenuTreeEntry};
pub use permissions::{AdminTableGate, PermissionGate, StaticPermissionGate};

use std::sync::Arc;

use crate::config::Config;
use crate::db::MenuDb;

/// Service container for dependency injection
pub struct Services {
    pub menu: Arc<MenuService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create services over a shared database, using `group_admins` for permissions
    pub fn new(db: Arc<MenuDb>, config: &Config) -> Self {
        let gate = Arc::new(AdminTableGate::new(db.clone()));
        Self::with_gate(db, gate, config)
    }

    pub fn with_gate(db: Arc<MenuDb>, gate: Arc<dyn PermissionGate>, config: &Config) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));
        let menu = MenuService::new(db, gate, events.clone())
            .with_max_conflict_retries(config.max_conflict_retries);

        Self {
            menu: Arc::new(menu),
            events,
        }
    }
}
