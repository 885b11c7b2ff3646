//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::{MenuError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(MENU_SCHEMA)
            .map_err(|e| MenuError::db("Failed to create menu tables", e))?;
        conn.execute_batch(CONTENT_SCHEMA)
            .map_err(|e| MenuError::db("Failed to create content tables", e))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating database schema v{} -> v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(MenuError::Database(format!(
            "Database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| MenuError::db("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| MenuError::db("Failed to read schema_version", e))?;

    Ok(version.unwrap_or(0))
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    if from_version < 2 {
        conn.execute_batch(
            "ALTER TABLE menu_nodes ADD COLUMN placed_by_admin INTEGER NOT NULL DEFAULT 0",
        )
        .map_err(|e| MenuError::db("Failed to add placed_by_admin", e))?;
    }

    set_schema_version(conn, SCHEMA_VERSION)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| MenuError::db("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| MenuError::db("Failed to set schema_version", e))?;
    Ok(())
}

/// Menu nodes.
///
/// The view reference is stored as one nullable column per reference type;
/// at most one is ever non-null. `placed_by_admin` marks nodes an
/// administrator has moved or detached. The partial unique index rejects two ordered
/// nodes sharing a position in the same scope.
const MENU_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS menu_nodes (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    parent_id TEXT,
    position INTEGER CHECK (position IS NULL OR position >= 1),
    kind TEXT NOT NULL,
    is_system_node INTEGER NOT NULL DEFAULT 0,
    placed_by_admin INTEGER NOT NULL DEFAULT 0,
    title TEXT,
    icon TEXT,
    visibility TEXT NOT NULL DEFAULT 'all',
    view_group_id TEXT,
    view_post_id TEXT,
    view_saved_view_id TEXT,
    view_member_id TEXT,
    view_chat_topic_id TEXT,
    view_track_id TEXT,
    view_funding_round_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_menu_nodes_group ON menu_nodes(group_id);
CREATE INDEX IF NOT EXISTS idx_menu_nodes_parent ON menu_nodes(parent_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_menu_nodes_scope_position
    ON menu_nodes(group_id, COALESCE(parent_id, ''), position)
    WHERE position IS NOT NULL;
"#;

/// Groups, administrators and the legacy content the bootstrapper reads
const CONTENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS group_admins (
    group_id TEXT NOT NULL,
    actor_id TEXT NOT NULL,
    PRIMARY KEY (group_id, actor_id)
);

CREATE TABLE IF NOT EXISTS group_topics (
    group_id TEXT NOT NULL,
    topic_id TEXT NOT NULL,
    name TEXT NOT NULL,
    visibility INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (group_id, topic_id)
);

CREATE TABLE IF NOT EXISTS group_posts (
    group_id TEXT NOT NULL,
    post_id TEXT NOT NULL,
    post_type TEXT NOT NULL,
    has_location INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_id, post_id)
);

CREATE TABLE IF NOT EXISTS group_relationships (
    parent_group_id TEXT NOT NULL,
    child_group_id TEXT NOT NULL,
    PRIMARY KEY (parent_group_id, child_group_id)
);

CREATE TABLE IF NOT EXISTS custom_views (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_group_posts_type ON group_posts(group_id, post_type);
CREATE INDEX IF NOT EXISTS idx_custom_views_group ON custom_views(group_id, sort_order);
"#;
