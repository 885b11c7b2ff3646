//! Menu service - the mutation and read surface for group menus
//!
//! Every write follows the same steps: ask the permission gate, run the
//! ordering engine inside one IMMEDIATE transaction, verify the touched
//! scopes, commit, then emit events. Store conflicts are retried a bounded
//! number of times.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::bootstrap::{bootstrap, BootstrapReport};
use crate::db::legacy_content::{self, LegacyContent, SqliteLegacyContent};
use crate::db::{menu_nodes, MenuDb};
use crate::error::{MenuError, Result};
use crate::menu::{
    registry, ContentCategory, CreateMenuNodeInput, DeleteResult, DisplayType, MenuNode,
    ReorderRequest, UpdateMenuNodeInput, ViewReference,
};
use crate::ordering::OrderingEngine;

use super::events::{EventBus, MenuEvent};
use super::permissions::PermissionGate;

/// Default number of retries for a conflicting write
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// A group's menu as a nested tree
#[derive(Debug, Clone, Serialize)]
pub struct MenuTree {
    pub group_id: String,
    pub roots: Vec<MenuTreeEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuTreeEntry {
    #[serde(flatten)]
    pub node: MenuNode,
    pub display_type: DisplayType,
    pub deletable: bool,
    pub children: Vec<MenuTreeEntry>,
}

impl MenuTree {
    fn build(group_id: &str, nodes: Vec<MenuNode>) -> Self {
        let mut by_parent: HashMap<Option<String>, Vec<MenuNode>> = HashMap::new();
        for node in nodes {
            by_parent.entry(node.parent_id.clone()).or_default().push(node);
        }

        let roots = Self::entries(&mut by_parent, None);
        Self {
            group_id: group_id.to_string(),
            roots,
        }
    }

    fn entries(
        by_parent: &mut HashMap<Option<String>, Vec<MenuNode>>,
        parent_id: Option<String>,
    ) -> Vec<MenuTreeEntry> {
        let Some(nodes) = by_parent.remove(&parent_id) else {
            return Vec::new();
        };

        nodes
            .into_iter()
            .map(|node| {
                let children = Self::entries(by_parent, Some(node.id.clone()));
                MenuTreeEntry {
                    display_type: registry().display_type(&node),
                    deletable: !node.is_system_node && !node.is_home(),
                    node,
                    children,
                }
            })
            .collect()
    }

    /// Indented text rendering, one node per line
    pub fn outline(&self) -> String {
        fn walk(entries: &[MenuTreeEntry], depth: usize, out: &mut String) {
            for entry in entries {
                let position = entry
                    .node
                    .position
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let label = entry.node.title.as_deref().unwrap_or(entry.node.kind.tag());
                out.push_str(&format!(
                    "{}{} {} [{}] {}\n",
                    "  ".repeat(depth),
                    position,
                    label,
                    entry.node.kind,
                    entry.node.id
                ));
                walk(&entry.children, depth + 1, out);
            }
        }

        let mut out = String::new();
        walk(&self.roots, 0, &mut out);
        out
    }
}

/// Menu service for business logic
pub struct MenuService {
    db: Arc<MenuDb>,
    gate: Arc<dyn PermissionGate>,
    events: Arc<EventBus>,
    max_conflict_retries: u32,
}

impl MenuService {
    pub fn new(db: Arc<MenuDb>, gate: Arc<dyn PermissionGate>, events: Arc<EventBus>) -> Self {
        Self {
            db,
            gate,
            events,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn get_node(&self, id: &str) -> Result<Option<MenuNode>> {
        self.db.with_conn(|conn| menu_nodes::get_node(conn, id))
    }

    /// All nodes of a group, ordered nodes first within each scope
    pub fn list_nodes(&self, group_id: &str) -> Result<Vec<MenuNode>> {
        self.db.with_conn(|conn| menu_nodes::list_group_nodes(conn, group_id))
    }

    pub fn menu_tree(&self, group_id: &str) -> Result<MenuTree> {
        let nodes = self.list_nodes(group_id)?;
        Ok(MenuTree::build(group_id, nodes))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a user node. System nodes only come from bootstrap.
    pub fn create_menu_node(
        &self,
        actor_id: &str,
        group_id: &str,
        input: CreateMenuNodeInput,
    ) -> Result<MenuNode> {
        self.authorize(actor_id, group_id)?;

        let node = self.write("create", |engine| {
            require_group(engine, group_id)?;
            let input = CreateMenuNodeInput {
                is_system_node: false,
                ..input.clone()
            };
            engine.create(group_id, input)
        })?;

        self.events.emit(MenuEvent::NodeCreated {
            id: node.id.clone(),
            group_id: node.group_id.clone(),
            kind: node.kind,
            position: node.position,
        });
        Ok(node)
    }

    pub fn update_menu_node(
        &self,
        actor_id: &str,
        node_id: &str,
        patch: UpdateMenuNodeInput,
    ) -> Result<MenuNode> {
        let group_id = self.group_of(node_id)?;
        self.authorize(actor_id, &group_id)?;

        let moved = patch.reorder.is_some();
        let node = self.write("update", |engine| engine.update(node_id, patch.clone()))?;

        self.events.emit(MenuEvent::NodeUpdated {
            id: node.id.clone(),
            group_id: node.group_id.clone(),
        });
        if moved {
            self.emit_reordered(&node);
        }
        Ok(node)
    }

    pub fn reorder_menu_node(&self, actor_id: &str, node_id: &str, request: ReorderRequest) -> Result<()> {
        let group_id = self.group_of(node_id)?;
        self.authorize(actor_id, &group_id)?;

        let node = self.write("reorder", |engine| engine.reorder(node_id, &request))?;
        self.emit_reordered(&node);
        Ok(())
    }

    /// Detach a node from the visible menu. Detaching twice is a no-op.
    pub fn remove_menu_node_from_menu(&self, actor_id: &str, node_id: &str) -> Result<()> {
        let group_id = self.group_of(node_id)?;
        self.authorize(actor_id, &group_id)?;

        self.write("remove", |engine| engine.remove_from_menu(node_id))?;
        self.events.emit(MenuEvent::NodeRemovedFromMenu {
            id: node_id.to_string(),
            group_id,
        });
        Ok(())
    }

    pub fn delete_menu_node(&self, actor_id: &str, node_id: &str) -> Result<DeleteResult> {
        let group_id = self.group_of(node_id)?;
        self.authorize(actor_id, &group_id)?;

        self.write("delete", |engine| engine.delete(node_id))?;
        self.events.emit(MenuEvent::NodeDeleted {
            id: node_id.to_string(),
            group_id,
        });
        Ok(DeleteResult { success: true })
    }

    pub fn set_home_reference(
        &self,
        actor_id: &str,
        group_id: &str,
        target: ViewReference,
    ) -> Result<MenuNode> {
        self.authorize(actor_id, group_id)?;

        let home = self.write("set_home", |engine| engine.set_home_reference(group_id, target.clone()))?;
        self.events.emit(MenuEvent::HomeReferenceChanged {
            group_id: group_id.to_string(),
            node_id: home.id.clone(),
        });
        Ok(home)
    }

    /// Build the group's menu from its existing content
    pub fn bootstrap_menu(&self, actor_id: &str, group_id: &str) -> Result<BootstrapReport> {
        self.authorize(actor_id, group_id)?;

        let report = self.write("bootstrap", |engine| {
            require_group(engine, group_id)?;
            let content = SqliteLegacyContent::new(engine.conn());
            bootstrap(engine, &content, group_id)
        })?;

        self.events.emit(MenuEvent::MenuBootstrapped {
            group_id: group_id.to_string(),
            node_count: report.total_nodes(),
        });
        Ok(report)
    }

    /// Show a content category once content of it exists.
    ///
    /// Called by the platform when content is posted, not by an actor.
    pub fn surface_category(&self, group_id: &str, category: ContentCategory) -> Result<Option<MenuNode>> {
        let surfaced = self.write("surface_category", |engine| engine.surface_category(group_id, category))?;

        if let Some(node) = &surfaced {
            self.events.emit(MenuEvent::CategorySurfaced {
                group_id: group_id.to_string(),
                category,
                node_id: node.id.clone(),
            });
        }
        Ok(surfaced)
    }

    /// Link a newly saved view under custom-views.
    ///
    /// Called by the platform when a saved view is created. The node takes
    /// the view's name as its title.
    pub fn surface_saved_view(&self, group_id: &str, saved_view_id: &str) -> Result<Option<MenuNode>> {
        let surfaced = self.write("surface_saved_view", |engine| {
            let view = SqliteLegacyContent::new(engine.conn())
                .saved_views(group_id)?
                .into_iter()
                .find(|view| view.id == saved_view_id)
                .ok_or_else(|| {
                    MenuError::NotFound(format!("saved view {} of group {}", saved_view_id, group_id))
                })?;
            engine.surface_saved_view(group_id, &view.id, Some(view.name))
        })?;

        if let Some(node) = &surfaced {
            self.events.emit(MenuEvent::NodeCreated {
                id: node.id.clone(),
                group_id: node.group_id.clone(),
                kind: node.kind,
                position: node.position,
            });
        }
        Ok(surfaced)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn authorize(&self, actor_id: &str, group_id: &str) -> Result<()> {
        if self.gate.can_administer_menu(actor_id, group_id)? {
            Ok(())
        } else {
            warn!(actor = %actor_id, group = %group_id, "Menu change denied");
            Err(MenuError::PermissionDenied {
                actor_id: actor_id.to_string(),
                group_id: group_id.to_string(),
            })
        }
    }

    /// Owning group of a node; the only read made before the gate
    fn group_of(&self, node_id: &str) -> Result<String> {
        self.db
            .with_conn(|conn| menu_nodes::node_group_id(conn, node_id))?
            .ok_or_else(|| MenuError::NotFound(format!("menu node {}", node_id)))
    }

    /// Run `op` in a verified transaction, retrying conflicts
    fn write<T, F>(&self, name: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut OrderingEngine<'_>) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let result = self.db.with_tx(|tx| {
                let mut engine = OrderingEngine::new(tx);
                let value = op(&mut engine)?;
                engine.verify()?;
                Ok(value)
            });

            match result {
                Err(e) if e.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(op = name, attempt, error = %e, "Menu write conflicted, retrying");
                }
                Err(e) if e.is_retryable() => {
                    info!(op = name, attempts = attempt + 1, "Giving up on conflicting menu write");
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    fn emit_reordered(&self, node: &MenuNode) {
        self.events.emit(MenuEvent::NodeReordered {
            id: node.id.clone(),
            group_id: node.group_id.clone(),
            parent_id: node.parent_id.clone(),
            position: node.position,
        });
    }
}

fn require_group(engine: &OrderingEngine<'_>, group_id: &str) -> Result<()> {
    if legacy_content::group_exists(engine.conn(), group_id)? {
        Ok(())
    } else {
        Err(MenuError::NotFound(format!("group {}", group_id)))
    }
}
