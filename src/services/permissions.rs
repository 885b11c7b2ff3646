//! Who may change a group's menu
//!
//! The platform's authorization lives elsewhere; the service only asks a
//! [`PermissionGate`]. Two gates ship here: one backed by the `group_admins`
//! table and a fixed one for embedding and tests.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{legacy_content, MenuDb};
use crate::error::Result;

pub trait PermissionGate: Send + Sync {
    /// Whether `actor_id` may administer the menu of `group_id`
    fn can_administer_menu(&self, actor_id: &str, group_id: &str) -> Result<bool>;
}

/// Gate backed by the `group_admins` table
pub struct AdminTableGate {
    db: Arc<MenuDb>,
}

impl AdminTableGate {
    pub fn new(db: Arc<MenuDb>) -> Self {
        Self { db }
    }
}

impl PermissionGate for AdminTableGate {
    fn can_administer_menu(&self, actor_id: &str, group_id: &str) -> Result<bool> {
        self.db
            .with_conn(|conn| legacy_content::is_group_admin(conn, group_id, actor_id))
    }
}

/// Gate with a fixed answer set
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionGate {
    allow_all: bool,
    admins: HashSet<(String, String)>,
}

impl StaticPermissionGate {
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            admins: HashSet::new(),
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Allow `actor_id` on `group_id`
    pub fn with_admin(mut self, actor_id: &str, group_id: &str) -> Self {
        self.admins.insert((actor_id.to_string(), group_id.to_string()));
        self
    }
}

impl PermissionGate for StaticPermissionGate {
    fn can_administer_menu(&self, actor_id: &str, group_id: &str) -> Result<bool> {
        Ok(self.allow_all
            || self
                .admins
                .contains(&(actor_id.to_string(), group_id.to_string())))
    }
}
