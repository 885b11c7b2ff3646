//! Group Menu - navigation menu ordering for community groups
//!
//! Each group owns a small forest of menu nodes. This crate keeps that
//! forest consistent: positional inserts and moves, reparenting, detaching
//! with compaction, a home node pinned to the top, and a one-time bootstrap
//! that derives a whole menu from a group's existing content.
//!
//! ## Architecture
//!
//! - **menu**: node types, view references and the kind registry
//! - **db**: SQLite storage for nodes and the legacy content read model
//! - **ordering**: the ordering engine, bound to one transaction per call
//! - **bootstrap**: first-time menu synthesis through the engine
//! - **services**: permission checks, transactions, retries and events
//!
//! ## Ordering rules
//!
//! | Rule | Meaning |
//! |------|---------|
//! | Contiguity | ordered siblings hold positions `1..N` |
//! | Home precedence | the home node sits at root position 1 |
//! | One reference | a node links to at most one piece of content |
//! | System protection | platform nodes can be moved but never deleted |
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/group-menu/
//! ├── menu.db        # SQLite database (WAL mode)
//! └── config.toml    # Configuration
//! ```

pub mod config;
pub mod error;
pub mod menu;
pub mod db;
pub mod ordering;
pub mod bootstrap;
pub mod services;

// Re-exports
pub use bootstrap::BootstrapReport;
pub use config::Config;
pub use db::MenuDb;
pub use error::{MenuError, Result};
pub use menu::{
    ContentCategory, CreateMenuNodeInput, DeleteResult, DisplayType, MenuNode, NodeKind, Placement,
    ReferenceFields, ReorderRequest, UpdateMenuNodeInput, ViewReference, Visibility,
};
pub use ordering::OrderingEngine;
pub use services::{EventBus, MenuEvent, MenuService, MenuTree, PermissionGate, Services};
