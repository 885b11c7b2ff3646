//! Ordering engine
//!
//! Every insert, move, detach and delete of a menu node goes through
//! [`OrderingEngine`]. The engine works on scopes, the `(group_id, parent_id)`
//! pairs whose ordered nodes must always hold positions `1..N`, and on a
//! single caller-owned transaction. It keeps no state between calls.
//!
//! Position writes are planned first and applied in an order that never puts
//! two nodes on the same position of a scope: shifts toward the end of a scope
//! are written last-first, shifts toward the front first-first. The unique
//! scope position index rejects anything else.

use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::db::menu_nodes::{self, PlacementWrite};
use crate::error::{MenuError, Result};
use crate::menu::{
    merge_reference_update, registry, validate_reference, ContentCategory, CreateMenuNodeInput,
    MenuNode, NodeKind, Placement, ReferenceFields, ReorderRequest, UpdateMenuNodeInput, ViewReference,
};

/// One ordering scope: the children of `parent_id` within a group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope {
    pub group_id: String,
    /// `None` is the group's root
    pub parent_id: Option<String>,
}

impl Scope {
    pub fn new(group_id: &str, parent_id: Option<&str>) -> Self {
        Self {
            group_id: group_id.to_string(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    pub fn of(node: &MenuNode) -> Self {
        Self::new(&node.group_id, node.parent_id.as_deref())
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Plan moving every ordered node at or after `from` by `delta` positions.
///
/// `ordered` is the scope's ordered nodes by position. The writes come back
/// in an order that is safe to apply one by one.
pub fn plan_shift(ordered: &[MenuNode], from: u32, delta: i64) -> Vec<PlacementWrite> {
    if delta == 0 {
        return Vec::new();
    }

    let mut writes: Vec<PlacementWrite> = ordered
        .iter()
        .filter_map(|node| {
            let position = node.position?;
            (position >= from).then(|| PlacementWrite {
                id: node.id.clone(),
                parent_id: node.parent_id.clone(),
                position: Some((i64::from(position) + delta).max(1) as u32),
            })
        })
        .collect();

    // moving down the list frees the tail first, moving up frees the head first
    if delta > 0 {
        writes.sort_by(|a, b| b.position.cmp(&a.position));
    } else {
        writes.sort_by(|a, b| a.position.cmp(&b.position));
    }
    writes
}

/// Next append position of a scope
pub fn next_position(ordered: &[MenuNode]) -> u32 {
    ordered.iter().filter_map(|n| n.position).max().unwrap_or(0) + 1
}

/// Check that a scope's ordered nodes hold exactly `1..N`
pub fn is_contiguous(ordered: &[MenuNode]) -> bool {
    let mut positions: Vec<u32> = ordered.iter().filter_map(|n| n.position).collect();
    positions.sort_unstable();
    positions.iter().zip(1u32..).all(|(&actual, expected)| actual == expected)
}

/// Ordering operations bound to one transaction
pub struct OrderingEngine<'a> {
    conn: &'a Connection,
    touched: BTreeSet<Scope>,
    now: String,
}

impl<'a> OrderingEngine<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            touched: BTreeSet::new(),
            now: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    /// Scopes written by this engine so far
    pub fn touched(&self) -> impl Iterator<Item = &Scope> {
        self.touched.iter()
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Create a node in `group_id`
    pub fn create(&mut self, group_id: &str, input: CreateMenuNodeInput) -> Result<MenuNode> {
        let view_reference = validate_reference(&input.reference)?;

        let mut node = MenuNode {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            parent_id: input.parent_id,
            position: None,
            kind: input.kind,
            view_reference,
            is_system_node: input.is_system_node,
            placed_by_admin: false,
            title: input.title,
            icon: input.icon,
            visibility: input.visibility,
            created_at: self.now.clone(),
            updated_at: self.now.clone(),
        };

        if node.is_home() {
            return self.create_home(node);
        }

        if let Some(parent_id) = node.parent_id.as_deref() {
            self.require_parent(group_id, parent_id, node.kind)?;
        }
        let scope = Scope::of(&node);

        let ordered = self.ordered(&scope)?;
        let (position, opens_gap) = match input.placement {
            Placement::Unordered => (None, false),
            Placement::Append => (Some(next_position(&ordered)), false),
            Placement::Before { sibling_id } => {
                let sibling = self.require_sibling(group_id, &sibling_id)?;
                if sibling.parent_id != node.parent_id {
                    return Err(MenuError::InvalidInput(format!(
                        "sibling {} is not in the requested parent scope",
                        sibling_id
                    )));
                }
                (sibling.position, true)
            }
        };

        if let Some(at) = position {
            self.guard_home_slot(&scope, at, &node)?;
            if opens_gap {
                self.apply(&plan_shift(&ordered, at, 1))?;
            }
        }
        node.position = position;

        menu_nodes::insert_node(self.conn, &node)?;
        self.touched.insert(scope);

        debug!(id = %node.id, kind = %node.kind, position = ?node.position, "Created menu node");
        Ok(node)
    }

    fn create_home(&mut self, mut node: MenuNode) -> Result<MenuNode> {
        if node.parent_id.is_some() {
            return Err(MenuError::InvariantViolation(
                "the home node must sit at the root of the menu".into(),
            ));
        }
        if menu_nodes::find_home(self.conn, &node.group_id)?.is_some() {
            return Err(MenuError::InvariantViolation(format!(
                "group {} already has a home node",
                node.group_id
            )));
        }

        let scope = Scope::of(&node);
        let ordered = self.ordered(&scope)?;
        self.apply(&plan_shift(&ordered, 1, 1))?;

        node.position = Some(1);
        menu_nodes::insert_node(self.conn, &node)?;
        self.touched.insert(scope);

        debug!(id = %node.id, group = %node.group_id, "Created home node");
        Ok(node)
    }

    // =========================================================================
    // Move
    // =========================================================================

    /// Move a node to a new place, possibly under a new parent.
    ///
    /// The node is marked as placed by an administrator, so platform hooks
    /// no longer move it.
    pub fn reorder(&mut self, node_id: &str, request: &ReorderRequest) -> Result<MenuNode> {
        self.move_node(node_id, request)?;
        menu_nodes::mark_placed_by_admin(self.conn, node_id, &self.now)?;
        menu_nodes::require_node(self.conn, node_id)
    }

    fn move_node(&mut self, node_id: &str, request: &ReorderRequest) -> Result<MenuNode> {
        let node = menu_nodes::require_node(self.conn, node_id)?;
        if node.is_home() {
            return Err(MenuError::InvariantViolation("the home node cannot be moved".into()));
        }
        if request.insert_before_id.is_some() && request.append_to_end {
            return Err(MenuError::InvalidInput(
                "insert_before_id and append_to_end are mutually exclusive".into(),
            ));
        }

        // the sibling decides the target scope when there is one
        let sibling = match request.insert_before_id.as_deref() {
            Some(sibling_id) if sibling_id == node_id => {
                return Err(MenuError::InvalidInput("a node cannot be placed before itself".into()));
            }
            Some(sibling_id) => {
                let sibling = self.require_sibling(&node.group_id, sibling_id)?;
                if request.parent_id.is_some() && request.parent_id != sibling.parent_id {
                    return Err(MenuError::InvalidInput(format!(
                        "sibling {} is not under parent {}",
                        sibling_id,
                        request.parent_id.as_deref().unwrap_or("root")
                    )));
                }
                Some(sibling)
            }
            None => None,
        };
        let target_parent = match &sibling {
            Some(sibling) => sibling.parent_id.clone(),
            None => request.parent_id.clone(),
        };

        if let Some(parent_id) = target_parent.as_deref() {
            self.require_parent(&node.group_id, parent_id, node.kind)?;
            self.check_cycle(&node, parent_id)?;
        }
        let target = Scope::new(&node.group_id, target_parent.as_deref());

        if let Some(sibling) = &sibling {
            // home holds root 1, so the only way onto it is in front of home
            if sibling.is_home() {
                return Err(MenuError::InvariantViolation(
                    "no node may be placed before the home node".into(),
                ));
            }
        }

        self.vacate(&node)?;

        let ordered = self.ordered(&target)?;
        let at = match &sibling {
            Some(sibling) => menu_nodes::require_node(self.conn, &sibling.id)?
                .position
                .ok_or_else(|| MenuError::Internal(format!("sibling {} lost its position", sibling.id)))?,
            None => next_position(&ordered),
        };
        self.guard_home_slot(&target, at, &node)?;

        let mut writes = plan_shift(&ordered, at, 1);
        writes.push(PlacementWrite {
            id: node.id.clone(),
            parent_id: target_parent,
            position: Some(at),
        });
        self.apply(&writes)?;
        self.touched.insert(target);

        debug!(id = %node.id, position = at, "Reordered menu node");
        menu_nodes::require_node(self.conn, node_id)
    }

    /// Take a node out of the visible menu, keeping its parent
    pub fn remove_from_menu(&mut self, node_id: &str) -> Result<MenuNode> {
        let node = menu_nodes::require_node(self.conn, node_id)?;
        if node.is_home() {
            return Err(MenuError::InvariantViolation("the home node cannot be removed from the menu".into()));
        }
        if node.is_ordered() {
            self.vacate(&node)?;
            debug!(id = %node.id, "Removed menu node from menu");
        }

        if !node.placed_by_admin {
            menu_nodes::mark_placed_by_admin(self.conn, node_id, &self.now)?;
        }
        menu_nodes::require_node(self.conn, node_id)
    }

    /// Delete a node. Its children move up to its parent, ordered children
    /// taking over its place in their own order.
    pub fn delete(&mut self, node_id: &str) -> Result<()> {
        let node = menu_nodes::require_node(self.conn, node_id)?;
        if node.is_system_node {
            return Err(MenuError::SystemNodeProtected(node.id));
        }
        if node.is_home() {
            return Err(MenuError::InvariantViolation("the home node cannot be deleted".into()));
        }

        let children = menu_nodes::list_children(self.conn, node_id)?;
        let (ordered_children, loose_children): (Vec<_>, Vec<_>) =
            children.into_iter().partition(|child| child.is_ordered());

        // every child leaves its slot first, so nothing can collide below
        let lifted: Vec<PlacementWrite> = ordered_children
            .iter()
            .chain(loose_children.iter())
            .map(|child| PlacementWrite {
                id: child.id.clone(),
                parent_id: node.parent_id.clone(),
                position: None,
            })
            .collect();
        self.apply(&lifted)?;
        self.touched.insert(Scope::new(&node.group_id, Some(node_id)));

        let scope = Scope::of(&node);
        let k = ordered_children.len() as u32;
        let start = match node.position {
            Some(vacated) => {
                self.apply(&[PlacementWrite {
                    id: node.id.clone(),
                    parent_id: node.parent_id.clone(),
                    position: None,
                }])?;
                let ordered = self.ordered(&scope)?;
                self.apply(&plan_shift(&ordered, vacated + 1, i64::from(k) - 1))?;
                vacated
            }
            None => next_position(&self.ordered(&scope)?),
        };

        let spliced: Vec<PlacementWrite> = ordered_children
            .iter()
            .zip(start..)
            .map(|(child, position)| PlacementWrite {
                id: child.id.clone(),
                parent_id: node.parent_id.clone(),
                position: Some(position),
            })
            .collect();
        self.apply(&spliced)?;
        self.touched.insert(scope);

        if !menu_nodes::delete_node(self.conn, node_id)? {
            return Err(MenuError::NotFound(format!("menu node {}", node_id)));
        }

        debug!(id = %node_id, reparented = lifted.len(), "Deleted menu node");
        Ok(())
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Apply a content patch, then the optional reorder it carries
    pub fn update(&mut self, node_id: &str, patch: UpdateMenuNodeInput) -> Result<MenuNode> {
        let mut node = menu_nodes::require_node(self.conn, node_id)?;

        let candidate = merge_reference_update(&node.view_reference, &patch.reference);
        node.view_reference = validate_reference(&candidate)?;

        if let Some(title) = patch.title {
            node.title = Some(title);
        }
        if let Some(icon) = patch.icon {
            node.icon = Some(icon);
        }
        if let Some(visibility) = patch.visibility {
            node.visibility = visibility;
        }
        node.updated_at = self.now.clone();
        menu_nodes::update_content(self.conn, &node)?;

        match patch.reorder {
            Some(request) => self.reorder(node_id, &request),
            None => Ok(node),
        }
    }

    /// Point the group's home node at new content
    pub fn set_home_reference(&mut self, group_id: &str, target: ViewReference) -> Result<MenuNode> {
        if target.is_none() {
            return Err(MenuError::InvalidReference { fields: Vec::new() });
        }
        let home = menu_nodes::find_home(self.conn, group_id)?
            .ok_or_else(|| MenuError::NotFound(format!("home node of group {}", group_id)))?;

        menu_nodes::set_reference(self.conn, &home.id, &target, &self.now)?;
        menu_nodes::require_node(self.conn, &home.id)
    }

    /// Append a content category under auto-view unless it is already in
    /// the menu.
    ///
    /// The category node is looked up anywhere in the group. One that is
    /// placed, or that an administrator moved or detached, is left alone.
    /// Returns the node when something changed.
    pub fn surface_category(&mut self, group_id: &str, category: ContentCategory) -> Result<Option<MenuNode>> {
        let existing = menu_nodes::list_group_nodes(self.conn, group_id)?
            .into_iter()
            .find(|n| n.kind == category.kind());
        if let Some(node) = &existing {
            if node.is_ordered() || node.placed_by_admin {
                return Ok(None);
            }
        }

        let auto_view = self.root_of_kind(group_id, NodeKind::AutoView)?;
        match existing {
            Some(node) => self
                .move_node(&node.id, &ReorderRequest::append_to(Some(&auto_view.id)))
                .map(Some),
            None => self
                .create(
                    group_id,
                    CreateMenuNodeInput {
                        kind: category.kind(),
                        parent_id: Some(auto_view.id),
                        placement: Placement::Append,
                        is_system_node: true,
                        ..Default::default()
                    },
                )
                .map(Some),
        }
    }

    /// Link a newly saved view under custom-views, once per saved view
    pub fn surface_saved_view(
        &mut self,
        group_id: &str,
        saved_view_id: &str,
        title: Option<String>,
    ) -> Result<Option<MenuNode>> {
        let linked = menu_nodes::list_group_nodes(self.conn, group_id)?
            .iter()
            .any(|n| matches!(&n.view_reference, ViewReference::SavedView(id) if id == saved_view_id));
        if linked {
            return Ok(None);
        }

        let custom_views = self.root_of_kind(group_id, NodeKind::CustomViews)?;
        self.create(
            group_id,
            CreateMenuNodeInput {
                kind: NodeKind::CustomView,
                parent_id: Some(custom_views.id),
                reference: ReferenceFields {
                    saved_view_id: Some(saved_view_id.to_string()),
                    ..Default::default()
                },
                placement: Placement::Append,
                title,
                ..Default::default()
            },
        )
        .map(Some)
    }

    fn root_of_kind(&self, group_id: &str, kind: NodeKind) -> Result<MenuNode> {
        menu_nodes::list_scope(self.conn, group_id, None)?
            .into_iter()
            .find(|n| n.kind == kind)
            .ok_or_else(|| MenuError::NotFound(format!("{} node of group {}", kind, group_id)))
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Re-check contiguity and home precedence on every touched scope.
    ///
    /// Called right before commit; a failure means the transaction must be
    /// rolled back.
    pub fn verify(&self) -> Result<()> {
        for scope in &self.touched {
            let ordered = self.ordered(scope)?;
            if !is_contiguous(&ordered) {
                let positions: Vec<_> = ordered.iter().filter_map(|n| n.position).collect();
                return Err(MenuError::Conflict(format!(
                    "scope {:?} of group {} is not contiguous: {:?}",
                    scope.parent_id, scope.group_id, positions
                )));
            }

            if scope.is_root() {
                if let Some(home) = menu_nodes::find_home(self.conn, &scope.group_id)? {
                    if home.parent_id.is_some() || home.position != Some(1) {
                        return Err(MenuError::Conflict(format!(
                            "home node of group {} is not at root position 1",
                            scope.group_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ordered(&self, scope: &Scope) -> Result<Vec<MenuNode>> {
        menu_nodes::list_ordered_scope(self.conn, &scope.group_id, scope.parent_id.as_deref())
    }

    fn apply(&self, writes: &[PlacementWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        menu_nodes::write_placements(self.conn, writes, &self.now)
    }

    /// Null out a node's position and close the gap it leaves
    fn vacate(&mut self, node: &MenuNode) -> Result<()> {
        let Some(vacated) = node.position else {
            return Ok(());
        };

        self.apply(&[PlacementWrite {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            position: None,
        }])?;

        let scope = Scope::of(node);
        let ordered = self.ordered(&scope)?;
        self.apply(&plan_shift(&ordered, vacated + 1, -1))?;
        self.touched.insert(scope);
        Ok(())
    }

    fn require_parent(&self, group_id: &str, parent_id: &str, child: NodeKind) -> Result<MenuNode> {
        let parent = menu_nodes::get_node(self.conn, parent_id)?
            .filter(|p| p.group_id == group_id)
            .ok_or_else(|| {
                MenuError::ScopeNotFound(format!("parent {} is not a node of group {}", parent_id, group_id))
            })?;

        if !registry().accepts_child(parent.kind, child) {
            return Err(MenuError::InvalidInput(format!(
                "a {} node cannot hold a {} node",
                parent.kind, child
            )));
        }
        Ok(parent)
    }

    fn require_sibling(&self, group_id: &str, sibling_id: &str) -> Result<MenuNode> {
        let sibling = menu_nodes::get_node(self.conn, sibling_id)?
            .ok_or_else(|| MenuError::NotFound(format!("sibling node {}", sibling_id)))?;

        if sibling.group_id != group_id {
            return Err(MenuError::InvalidInput(format!(
                "sibling {} belongs to another group",
                sibling_id
            )));
        }
        if !sibling.is_ordered() {
            return Err(MenuError::InvalidInput(format!(
                "sibling {} is not placed in the menu",
                sibling_id
            )));
        }
        Ok(sibling)
    }

    /// Walk up from `target_parent`; meeting `node` means the move would
    /// put the node inside its own subtree
    fn check_cycle(&self, node: &MenuNode, target_parent: &str) -> Result<()> {
        let limit = menu_nodes::count_group_nodes(self.conn, &node.group_id)? + 1;
        let mut current = Some(target_parent.to_string());
        let mut steps = 0u64;

        while let Some(id) = current {
            if id == node.id {
                return Err(MenuError::CycleDetected(format!(
                    "{} cannot be moved under its own descendant {}",
                    node.id, target_parent
                )));
            }
            steps += 1;
            if steps > limit {
                return Err(MenuError::Internal(format!(
                    "parent chain of {} does not terminate",
                    target_parent
                )));
            }
            current = menu_nodes::parent_of(self.conn, &id)?;
        }
        Ok(())
    }

    /// Root position 1 belongs to home while a home node exists
    fn guard_home_slot(&self, scope: &Scope, position: u32, node: &MenuNode) -> Result<()> {
        if !scope.is_root() || position != 1 || node.is_home() {
            return Ok(());
        }
        if menu_nodes::find_home(self.conn, &scope.group_id)?.is_some() {
            return Err(MenuError::InvariantViolation(
                "root position 1 is reserved for the home node".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::menu::Visibility;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn root(engine: &mut OrderingEngine, kind: NodeKind) -> MenuNode {
        engine
            .create(
                "g1",
                CreateMenuNodeInput {
                    kind,
                    placement: Placement::Append,
                    is_system_node: true,
                    ..Default::default()
                },
            )
            .unwrap()
    }

    fn child(engine: &mut OrderingEngine, parent: &MenuNode, title: &str, placement: Placement) -> MenuNode {
        engine
            .create(
                "g1",
                CreateMenuNodeInput {
                    kind: NodeKind::Container,
                    parent_id: Some(parent.id.clone()),
                    placement,
                    title: Some(title.into()),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    /// Root menu as (kind, position) after home
    fn root_layout(conn: &Connection) -> Vec<(NodeKind, Option<u32>)> {
        menu_nodes::list_scope(conn, "g1", None)
            .unwrap()
            .into_iter()
            .map(|n| (n.kind, n.position))
            .collect()
    }

    fn standard_root(engine: &mut OrderingEngine) -> Vec<MenuNode> {
        [
            NodeKind::Home,
            NodeKind::Chats,
            NodeKind::AutoView,
            NodeKind::Members,
            NodeKind::Setup,
            NodeKind::CustomViews,
        ]
        .into_iter()
        .map(|kind| root(engine, kind))
        .collect()
    }

    #[test]
    fn test_plan_shift_orders_writes() {
        let nodes: Vec<MenuNode> = (1..=4)
            .map(|p| MenuNode {
                id: format!("n{}", p),
                group_id: "g1".into(),
                parent_id: None,
                position: Some(p),
                kind: NodeKind::Container,
                view_reference: ViewReference::None,
                is_system_node: false,
                placed_by_admin: false,
                title: None,
                icon: None,
                visibility: Visibility::All,
                created_at: String::new(),
                updated_at: String::new(),
            })
            .collect();

        let down: Vec<_> = plan_shift(&nodes, 2, 1).into_iter().map(|w| w.position).collect();
        assert_eq!(down, vec![Some(5), Some(4), Some(3)]);

        let up: Vec<_> = plan_shift(&nodes, 3, -1).into_iter().map(|w| w.position).collect();
        assert_eq!(up, vec![Some(2), Some(3)]);

        assert!(plan_shift(&nodes, 1, 0).is_empty());
        assert_eq!(next_position(&nodes), 5);
        assert_eq!(next_position(&[]), 1);
        assert!(is_contiguous(&nodes));
        assert!(!is_contiguous(&nodes[1..]));
    }

    #[test]
    fn test_move_before_shifts_siblings() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let (chats, setup) = (&roots[1], &roots[4]);

        engine.reorder(&setup.id, &ReorderRequest::before(&chats.id)).unwrap();
        engine.verify().unwrap();

        assert_eq!(
            root_layout(&conn),
            vec![
                (NodeKind::Home, Some(1)),
                (NodeKind::Setup, Some(2)),
                (NodeKind::Chats, Some(3)),
                (NodeKind::AutoView, Some(4)),
                (NodeKind::Members, Some(5)),
                (NodeKind::CustomViews, Some(6)),
            ]
        );
    }

    #[test]
    fn test_remove_compacts_and_is_idempotent() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let members = &roots[3];

        let removed = engine.remove_from_menu(&members.id).unwrap();
        assert_eq!(removed.position, None);
        assert_eq!(removed.parent_id, None);
        let again = engine.remove_from_menu(&members.id).unwrap();
        assert_eq!(again.position, None);
        engine.verify().unwrap();

        let ordered = menu_nodes::list_ordered_scope(&conn, "g1", None).unwrap();
        assert_eq!(ordered.len(), 5);
        assert!(is_contiguous(&ordered));
    }

    #[test]
    fn test_reparent_into_empty_parent() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let auto_view = &roots[2];
        let first = child(&mut engine, auto_view, "first", Placement::Append);
        let second = child(&mut engine, auto_view, "second", Placement::Append);
        let target = child(&mut engine, auto_view, "target", Placement::Append);

        let moved = engine
            .reorder(&first.id, &ReorderRequest::append_to(Some(&target.id)))
            .unwrap();
        engine.verify().unwrap();

        assert_eq!(moved.parent_id.as_deref(), Some(target.id.as_str()));
        assert_eq!(moved.position, Some(1));
        let left = menu_nodes::list_ordered_scope(&conn, "g1", Some(&auto_view.id)).unwrap();
        assert_eq!(left.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec![second.id.as_str(), target.id.as_str()]);
        assert_eq!(left[0].position, Some(1));
    }

    #[test]
    fn test_home_guards() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let (home, setup) = (&roots[0], &roots[4]);

        assert!(matches!(
            engine.reorder(&setup.id, &ReorderRequest::before(&home.id)),
            Err(MenuError::InvariantViolation(_))
        ));
        assert!(matches!(
            engine.reorder(&home.id, &ReorderRequest::append_to(None)),
            Err(MenuError::InvariantViolation(_))
        ));
        assert!(matches!(engine.remove_from_menu(&home.id), Err(MenuError::InvariantViolation(_))));
        assert!(matches!(
            engine.create("g1", CreateMenuNodeInput { kind: NodeKind::Home, ..Default::default() }),
            Err(MenuError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_home_created_late_takes_root_one() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        root(&mut engine, NodeKind::Chats);
        root(&mut engine, NodeKind::Members);
        root(&mut engine, NodeKind::Home);
        engine.verify().unwrap();

        assert_eq!(
            root_layout(&conn),
            vec![
                (NodeKind::Home, Some(1)),
                (NodeKind::Chats, Some(2)),
                (NodeKind::Members, Some(3)),
            ]
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let outer = child(&mut engine, &roots[2], "outer", Placement::Append);
        let inner = child(&mut engine, &outer, "inner", Placement::Append);

        assert!(matches!(
            engine.reorder(&outer.id, &ReorderRequest::append_to(Some(&inner.id))),
            Err(MenuError::CycleDetected(_))
        ));
        assert!(matches!(
            engine.reorder(&outer.id, &ReorderRequest::append_to(Some(&outer.id))),
            Err(MenuError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_parent_must_exist_in_group() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let result = engine.create(
            "g1",
            CreateMenuNodeInput {
                parent_id: Some("nowhere".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(MenuError::ScopeNotFound(_))));
    }

    #[test]
    fn test_child_kind_rules() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let result = engine.create(
            "g1",
            CreateMenuNodeInput {
                kind: NodeKind::Post,
                parent_id: Some(roots[1].id.clone()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(MenuError::InvalidInput(_))));
    }

    #[test]
    fn test_delete_splices_children() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let auto_view = &roots[2];
        let a = child(&mut engine, auto_view, "a", Placement::Append);
        let doomed = child(&mut engine, auto_view, "doomed", Placement::Append);
        let c = child(&mut engine, auto_view, "c", Placement::Append);
        let x = child(&mut engine, &doomed, "x", Placement::Append);
        let y = child(&mut engine, &doomed, "y", Placement::Append);
        let loose = child(&mut engine, &doomed, "loose", Placement::Unordered);

        engine.delete(&doomed.id).unwrap();
        engine.verify().unwrap();

        let scope = menu_nodes::list_scope(&conn, "g1", Some(&auto_view.id)).unwrap();
        let layout: Vec<_> = scope.iter().map(|n| (n.id.as_str(), n.position)).collect();
        assert_eq!(
            layout,
            vec![
                (a.id.as_str(), Some(1)),
                (x.id.as_str(), Some(2)),
                (y.id.as_str(), Some(3)),
                (c.id.as_str(), Some(4)),
                (loose.id.as_str(), None),
            ]
        );
        assert!(menu_nodes::get_node(&conn, &doomed.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_system_node_refused() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        assert!(matches!(engine.delete(&roots[4].id), Err(MenuError::SystemNodeProtected(_))));
    }

    #[test]
    fn test_update_switches_reference_and_moves() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);
        let node = engine
            .create(
                "g1",
                CreateMenuNodeInput {
                    kind: NodeKind::Post,
                    reference: ReferenceFields { post_id: Some("p1".into()), ..Default::default() },
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(node.position, None);

        let updated = engine
            .update(
                &node.id,
                UpdateMenuNodeInput {
                    title: Some("Renamed".into()),
                    reference: ReferenceFields { chat_topic_id: Some("c1".into()), ..Default::default() },
                    reorder: Some(ReorderRequest::before(&roots[1].id)),
                    ..Default::default()
                },
            )
            .unwrap();
        engine.verify().unwrap();

        assert_eq!(updated.view_reference, ViewReference::ChatTopic("c1".into()));
        assert_eq!(updated.title.as_deref(), Some("Renamed"));
        assert_eq!(updated.position, Some(2));
    }

    #[test]
    fn test_surface_category_once() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        standard_root(&mut engine);

        let first = engine.surface_category("g1", ContentCategory::Events).unwrap();
        assert_eq!(first.as_ref().and_then(|n| n.position), Some(1));
        assert!(engine.surface_category("g1", ContentCategory::Events).unwrap().is_none());

        // an administrator's detach sticks
        let events = first.unwrap();
        let removed = engine.remove_from_menu(&events.id).unwrap();
        assert!(removed.placed_by_admin);
        assert!(engine.surface_category("g1", ContentCategory::Events).unwrap().is_none());
        assert_eq!(menu_nodes::require_node(&conn, &events.id).unwrap().position, None);
    }

    #[test]
    fn test_surface_category_respects_admin_moves() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        standard_root(&mut engine);

        let events = engine.surface_category("g1", ContentCategory::Events).unwrap().unwrap();
        let moved = engine.reorder(&events.id, &ReorderRequest::append_to(None)).unwrap();
        assert!(moved.placed_by_admin);
        assert_eq!(moved.parent_id, None);

        assert!(engine.surface_category("g1", ContentCategory::Events).unwrap().is_none());
        let count = menu_nodes::list_group_nodes(&conn, "g1")
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NodeKind::Events)
            .count();
        assert_eq!(count, 1);

        // detached after the move, still left alone
        engine.remove_from_menu(&events.id).unwrap();
        assert!(engine.surface_category("g1", ContentCategory::Events).unwrap().is_none());
        engine.verify().unwrap();
    }

    #[test]
    fn test_surface_category_places_loose_platform_node() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);

        let loose = engine
            .create(
                "g1",
                CreateMenuNodeInput {
                    kind: NodeKind::Map,
                    is_system_node: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(loose.position, None);

        let placed = engine.surface_category("g1", ContentCategory::Map).unwrap().unwrap();
        assert_eq!(placed.id, loose.id);
        assert_eq!(placed.parent_id.as_deref(), Some(roots[2].id.as_str()));
        assert_eq!(placed.position, Some(1));
        assert!(!placed.placed_by_admin);
    }

    #[test]
    fn test_surface_saved_view_once() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        let roots = standard_root(&mut engine);

        let first = engine
            .surface_saved_view("g1", "v1", Some("Reading list".into()))
            .unwrap()
            .unwrap();
        assert_eq!(first.kind, NodeKind::CustomView);
        assert_eq!(first.parent_id.as_deref(), Some(roots[5].id.as_str()));
        assert_eq!(first.view_reference, ViewReference::SavedView("v1".into()));
        assert_eq!(first.position, Some(1));
        assert!(!first.is_system_node);

        let second = engine.surface_saved_view("g1", "v2", None).unwrap().unwrap();
        assert_eq!(second.position, Some(2));

        // already linked, even once detached
        engine.remove_from_menu(&first.id).unwrap();
        assert!(engine.surface_saved_view("g1", "v1", None).unwrap().is_none());
        engine.verify().unwrap();
    }

    #[test]
    fn test_surface_needs_root_section() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        root(&mut engine, NodeKind::Home);

        assert!(matches!(
            engine.surface_category("g1", ContentCategory::Events),
            Err(MenuError::NotFound(_))
        ));
        assert!(matches!(
            engine.surface_saved_view("g1", "v1", None),
            Err(MenuError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_home_reference() {
        let conn = conn();
        let mut engine = OrderingEngine::new(&conn);
        assert!(matches!(
            engine.set_home_reference("g1", ViewReference::Post("p1".into())),
            Err(MenuError::NotFound(_))
        ));

        standard_root(&mut engine);
        assert!(matches!(
            engine.set_home_reference("g1", ViewReference::None),
            Err(MenuError::InvalidReference { .. })
        ));
        let home = engine.set_home_reference("g1", ViewReference::Post("p1".into())).unwrap();
        assert_eq!(home.position, Some(1));
        assert_eq!(home.view_reference, ViewReference::Post("p1".into()));
    }
}
