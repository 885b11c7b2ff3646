//! Menu node CRUD operations
//!
//! Plain row access. Ordering decisions live in [`crate::ordering`]; these
//! functions only read scopes and write what they are told to.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{MenuError, Result};
use crate::menu::{registry, validate_reference, MenuNode, ReferenceFields, ViewReference, Visibility};

const NODE_COLUMNS: &str = "id, group_id, parent_id, position, kind, is_system_node, placed_by_admin, title, icon, \
     visibility, view_group_id, view_post_id, view_saved_view_id, view_member_id, \
     view_chat_topic_id, view_track_id, view_funding_round_id, created_at, updated_at";

/// Menu node row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuNodeRow {
    pub id: String,
    pub group_id: String,
    pub parent_id: Option<String>,
    pub position: Option<u32>,
    pub kind: String,
    pub is_system_node: bool,
    pub placed_by_admin: bool,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub visibility: String,
    pub reference: ReferenceFields,
    pub created_at: String,
    pub updated_at: String,
}

impl MenuNodeRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            group_id: row.get("group_id")?,
            parent_id: row.get("parent_id")?,
            position: row.get("position")?,
            kind: row.get("kind")?,
            is_system_node: row.get("is_system_node")?,
            placed_by_admin: row.get("placed_by_admin")?,
            title: row.get("title")?,
            icon: row.get("icon")?,
            visibility: row.get("visibility")?,
            reference: ReferenceFields {
                group_id: row.get("view_group_id")?,
                post_id: row.get("view_post_id")?,
                saved_view_id: row.get("view_saved_view_id")?,
                member_id: row.get("view_member_id")?,
                chat_topic_id: row.get("view_chat_topic_id")?,
                track_id: row.get("view_track_id")?,
                funding_round_id: row.get("view_funding_round_id")?,
            },
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Convert into the domain type, re-checking the stored reference
    pub fn into_node(self) -> Result<MenuNode> {
        let kind = registry().resolve(&self.kind)?.kind;
        let view_reference = validate_reference(&self.reference)?;
        let visibility = Visibility::parse(&self.visibility).ok_or_else(|| {
            MenuError::Internal(format!("Unknown visibility '{}' on node {}", self.visibility, self.id))
        })?;

        Ok(MenuNode {
            id: self.id,
            group_id: self.group_id,
            parent_id: self.parent_id,
            position: self.position,
            kind,
            view_reference,
            is_system_node: self.is_system_node,
            placed_by_admin: self.placed_by_admin,
            title: self.title,
            icon: self.icon,
            visibility,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A position write for one node: where it lives after the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementWrite {
    pub id: String,
    pub parent_id: Option<String>,
    pub position: Option<u32>,
}

fn query_nodes(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<MenuNode>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| MenuError::db("Prepare failed", e))?;

    let rows: Vec<MenuNodeRow> = stmt
        .query_map(args, |row| MenuNodeRow::from_row(row))
        .map_err(|e| MenuError::db("Query failed", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MenuError::db("Row parse failed", e))?;

    rows.into_iter().map(MenuNodeRow::into_node).collect()
}

/// Get node by ID
pub fn get_node(conn: &Connection, id: &str) -> Result<Option<MenuNode>> {
    let sql = format!("SELECT {} FROM menu_nodes WHERE id = ?", NODE_COLUMNS);

    let row = conn
        .query_row(&sql, params![id], |row| MenuNodeRow::from_row(row))
        .optional()
        .map_err(|e| MenuError::db("Failed to get menu node", e))?;

    row.map(MenuNodeRow::into_node).transpose()
}

/// Get node by ID or fail with `NotFound`
pub fn require_node(conn: &Connection, id: &str) -> Result<MenuNode> {
    get_node(conn, id)?.ok_or_else(|| MenuError::NotFound(format!("menu node {}", id)))
}

/// Owning group of a node, without loading the rest of it
pub fn node_group_id(conn: &Connection, id: &str) -> Result<Option<String>> {
    conn.query_row("SELECT group_id FROM menu_nodes WHERE id = ?", params![id], |row| row.get(0))
        .optional()
        .map_err(|e| MenuError::db("Failed to get node group", e))
}

/// Parent of a node; `None` when the node is missing or at the root
pub fn parent_of(conn: &Connection, id: &str) -> Result<Option<String>> {
    let parent: Option<Option<String>> = conn
        .query_row("SELECT parent_id FROM menu_nodes WHERE id = ?", params![id], |row| row.get(0))
        .optional()
        .map_err(|e| MenuError::db("Failed to get node parent", e))?;
    Ok(parent.flatten())
}

/// All nodes of a group, ordered nodes first within each scope
pub fn list_group_nodes(conn: &Connection, group_id: &str) -> Result<Vec<MenuNode>> {
    let sql = format!(
        "SELECT {} FROM menu_nodes WHERE group_id = ? \
         ORDER BY position IS NULL, position, created_at, id",
        NODE_COLUMNS
    );
    query_nodes(conn, &sql, &[&group_id])
}

/// Every node of one scope: ordered by position, then the unordered ones
pub fn list_scope(conn: &Connection, group_id: &str, parent_id: Option<&str>) -> Result<Vec<MenuNode>> {
    let sql = format!(
        "SELECT {} FROM menu_nodes WHERE group_id = ? AND parent_id IS ? \
         ORDER BY position IS NULL, position, created_at, id",
        NODE_COLUMNS
    );
    query_nodes(conn, &sql, &[&group_id, &parent_id])
}

/// Ordered nodes of one scope, by position
pub fn list_ordered_scope(conn: &Connection, group_id: &str, parent_id: Option<&str>) -> Result<Vec<MenuNode>> {
    let sql = format!(
        "SELECT {} FROM menu_nodes WHERE group_id = ? AND parent_id IS ? AND position IS NOT NULL \
         ORDER BY position",
        NODE_COLUMNS
    );
    query_nodes(conn, &sql, &[&group_id, &parent_id])
}

/// Direct children of a node, ordered first
pub fn list_children(conn: &Connection, parent_id: &str) -> Result<Vec<MenuNode>> {
    let sql = format!(
        "SELECT {} FROM menu_nodes WHERE parent_id = ? \
         ORDER BY position IS NULL, position, created_at, id",
        NODE_COLUMNS
    );
    query_nodes(conn, &sql, &[&parent_id])
}

/// The group's home node, if it has one
pub fn find_home(conn: &Connection, group_id: &str) -> Result<Option<MenuNode>> {
    let sql = format!(
        "SELECT {} FROM menu_nodes WHERE group_id = ? AND kind = 'home' LIMIT 1",
        NODE_COLUMNS
    );
    Ok(query_nodes(conn, &sql, &[&group_id])?.into_iter().next())
}

/// Number of nodes in a group
pub fn count_group_nodes(conn: &Connection, group_id: &str) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM menu_nodes WHERE group_id = ?", params![group_id], |row| row.get(0))
        .map_err(|e| MenuError::db("Query failed", e))?;
    Ok(count as u64)
}

/// Insert a new node
pub fn insert_node(conn: &Connection, node: &MenuNode) -> Result<()> {
    let reference = ReferenceFields::from(&node.view_reference);
    conn.execute(
        r#"
        INSERT INTO menu_nodes (
            id, group_id, parent_id, position, kind, is_system_node, placed_by_admin, title, icon,
            visibility, view_group_id, view_post_id, view_saved_view_id, view_member_id,
            view_chat_topic_id, view_track_id, view_funding_round_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            node.id,
            node.group_id,
            node.parent_id,
            node.position,
            node.kind.tag(),
            node.is_system_node,
            node.placed_by_admin,
            node.title,
            node.icon,
            node.visibility.as_str(),
            reference.group_id,
            reference.post_id,
            reference.saved_view_id,
            reference.member_id,
            reference.chat_topic_id,
            reference.track_id,
            reference.funding_round_id,
            node.created_at,
            node.updated_at,
        ],
    )
    .map_err(|e| MenuError::db("Menu node insert failed", e))?;

    Ok(())
}

/// Apply placement writes in the given order.
///
/// The order matters: each write must land on a position that is free at
/// that moment, or the scope position index rejects it.
pub fn write_placements(conn: &Connection, batch: &[PlacementWrite], updated_at: &str) -> Result<()> {
    let mut stmt = conn
        .prepare("UPDATE menu_nodes SET parent_id = ?, position = ?, updated_at = ? WHERE id = ?")
        .map_err(|e| MenuError::db("Prepare failed", e))?;

    for write in batch {
        let changed = stmt
            .execute(params![write.parent_id, write.position, updated_at, write.id])
            .map_err(|e| match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => MenuError::Conflict(format!(
                    "position {:?} already taken while placing node {}",
                    write.position, write.id
                )),
                _ => MenuError::db("Placement write failed", e),
            })?;

        if changed == 0 {
            return Err(MenuError::NotFound(format!("menu node {}", write.id)));
        }
    }

    Ok(())
}

/// Record that an administrator placed or detached a node
pub fn mark_placed_by_admin(conn: &Connection, id: &str, updated_at: &str) -> Result<()> {
    conn.execute(
        "UPDATE menu_nodes SET placed_by_admin = 1, updated_at = ? WHERE id = ?",
        params![updated_at, id],
    )
    .map_err(|e| MenuError::db("Admin placement flag update failed", e))?;

    Ok(())
}

/// Write a node's descriptive fields and reference
pub fn update_content(conn: &Connection, node: &MenuNode) -> Result<()> {
    let reference = ReferenceFields::from(&node.view_reference);
    conn.execute(
        r#"
        UPDATE menu_nodes SET
            title = ?, icon = ?, visibility = ?,
            view_group_id = ?, view_post_id = ?, view_saved_view_id = ?, view_member_id = ?,
            view_chat_topic_id = ?, view_track_id = ?, view_funding_round_id = ?,
            updated_at = ?
        WHERE id = ?
        "#,
        params![
            node.title,
            node.icon,
            node.visibility.as_str(),
            reference.group_id,
            reference.post_id,
            reference.saved_view_id,
            reference.member_id,
            reference.chat_topic_id,
            reference.track_id,
            reference.funding_round_id,
            node.updated_at,
            node.id,
        ],
    )
    .map_err(|e| MenuError::db("Menu node update failed", e))?;

    Ok(())
}

/// Replace only a node's reference
pub fn set_reference(conn: &Connection, id: &str, reference: &ViewReference, updated_at: &str) -> Result<()> {
    let mut node = require_node(conn, id)?;
    node.view_reference = reference.clone();
    node.updated_at = updated_at.to_string();
    update_content(conn, &node)
}

/// Delete a node row
pub fn delete_node(conn: &Connection, id: &str) -> Result<bool> {
    let changes = conn
        .execute("DELETE FROM menu_nodes WHERE id = ?", params![id])
        .map_err(|e| MenuError::db("Delete failed", e))?;

    Ok(changes > 0)
}
