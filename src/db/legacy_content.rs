//! Legacy group content read model
//!
//! Groups that predate the menu already have chat topics, posts, related
//! groups and saved views. The bootstrapper reads them through the
//! [`LegacyContent`] trait; [`SqliteLegacyContent`] serves it from the local
//! tables, which `import_legacy` fills.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MenuError, Result};
use crate::menu::ContentCategory;

/// Topic visibility value marking a pinned topic
pub const TOPIC_VISIBILITY_PINNED: i64 = 2;

/// A chat topic attached to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRow {
    pub group_id: String,
    pub topic_id: String,
    pub name: String,
    #[serde(default = "default_topic_visibility")]
    pub visibility: i64,
}

fn default_topic_visibility() -> i64 { 1 }

impl TopicRow {
    pub fn is_pinned(&self) -> bool {
        self.visibility == TOPIC_VISIBILITY_PINNED
    }
}

/// A saved custom view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedViewRow {
    pub id: String,
    pub group_id: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
}

/// A post, reduced to what the menu cares about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRow {
    pub group_id: String,
    pub post_id: String,
    pub post_type: String,
    #[serde(default)]
    pub has_location: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub parent_group_id: String,
    pub child_group_id: String,
}

/// Read model consumed by the bootstrapper
pub trait LegacyContent {
    /// Chat topics of the group, oldest first
    fn topics(&self, group_id: &str) -> Result<Vec<TopicRow>>;

    /// Whether the group has any content of the category
    fn has_category(&self, group_id: &str, category: ContentCategory) -> Result<bool>;

    /// Saved views of the group in their own order
    fn saved_views(&self, group_id: &str) -> Result<Vec<SavedViewRow>>;
}

/// [`LegacyContent`] served from the local tables
pub struct SqliteLegacyContent<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLegacyContent<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn post_types(&self, group_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT post_type FROM group_posts WHERE group_id = ?")
            .map_err(|e| MenuError::db("Prepare failed", e))?;

        let types = stmt
            .query_map(params![group_id], |row| row.get(0))
            .map_err(|e| MenuError::db("Query failed", e))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| MenuError::db("Row parse failed", e))?;

        Ok(types)
    }

    fn exists(&self, sql: &str, group_id: &str) -> Result<bool> {
        self.conn
            .query_row(&format!("SELECT EXISTS ({})", sql), params![group_id], |row| row.get(0))
            .map_err(|e| MenuError::db("Content query failed", e))
    }
}

impl LegacyContent for SqliteLegacyContent<'_> {
    fn topics(&self, group_id: &str) -> Result<Vec<TopicRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT group_id, topic_id, name, visibility FROM group_topics \
                 WHERE group_id = ? ORDER BY created_at, rowid",
            )
            .map_err(|e| MenuError::db("Prepare failed", e))?;

        let topics = stmt
            .query_map(params![group_id], |row| {
                Ok(TopicRow {
                    group_id: row.get(0)?,
                    topic_id: row.get(1)?,
                    name: row.get(2)?,
                    visibility: row.get(3)?,
                })
            })
            .map_err(|e| MenuError::db("Query failed", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MenuError::db("Row parse failed", e))?;

        Ok(topics)
    }

    fn has_category(&self, group_id: &str, category: ContentCategory) -> Result<bool> {
        match category {
            ContentCategory::Map => self.exists(
                "SELECT 1 FROM group_posts WHERE group_id = ?1 AND has_location = 1",
                group_id,
            ),
            ContentCategory::Groups => self.exists(
                "SELECT 1 FROM group_relationships WHERE parent_group_id = ?1 OR child_group_id = ?1",
                group_id,
            ),
            _ => Ok(self
                .post_types(group_id)?
                .iter()
                .any(|post_type| ContentCategory::from_post_type(post_type) == Some(category))),
        }
    }

    fn saved_views(&self, group_id: &str) -> Result<Vec<SavedViewRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, group_id, name, sort_order FROM custom_views \
                 WHERE group_id = ? ORDER BY sort_order, rowid",
            )
            .map_err(|e| MenuError::db("Prepare failed", e))?;

        let views = stmt
            .query_map(params![group_id], |row| {
                Ok(SavedViewRow {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    name: row.get(2)?,
                    sort_order: row.get(3)?,
                })
            })
            .map_err(|e| MenuError::db("Query failed", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MenuError::db("Row parse failed", e))?;

        Ok(views)
    }
}

/// Whether a group exists
pub fn group_exists(conn: &Connection, group_id: &str) -> Result<bool> {
    conn.query_row("SELECT EXISTS (SELECT 1 FROM groups WHERE id = ?)", params![group_id], |row| row.get(0))
        .map_err(|e| MenuError::db("Group lookup failed", e))
}

/// Whether an actor is recorded as administrator of a group
pub fn is_group_admin(conn: &Connection, group_id: &str, actor_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM group_admins WHERE group_id = ? AND actor_id = ?)",
        params![group_id, actor_id],
        |row| row.get(0),
    )
    .map_err(|e| MenuError::db("Admin lookup failed", e))
}

pub fn grant_admin(conn: &Connection, group_id: &str, actor_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO group_admins (group_id, actor_id) VALUES (?, ?)",
        params![group_id, actor_id],
    )
    .map_err(|e| MenuError::db("Admin insert failed", e))?;
    Ok(())
}

/// A batch of legacy content, as read from an export file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyImport {
    #[serde(default)]
    pub groups: Vec<GroupRow>,
    #[serde(default)]
    pub topics: Vec<TopicRow>,
    #[serde(default)]
    pub posts: Vec<PostRow>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRow>,
    #[serde(default)]
    pub saved_views: Vec<SavedViewRow>,
}

/// Counts of rows written by an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub groups: u64,
    pub topics: u64,
    pub posts: u64,
    pub relationships: u64,
    pub saved_views: u64,
}

/// Write a legacy export. Rows already present are skipped.
pub fn import_legacy(conn: &Connection, import: &LegacyImport) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for group in &import.groups {
        summary.groups += conn
            .execute(
                "INSERT OR IGNORE INTO groups (id, name) VALUES (?, ?)",
                params![group.id, group.name],
            )
            .map_err(|e| MenuError::db("Group insert failed", e))? as u64;
    }

    for topic in &import.topics {
        summary.topics += conn
            .execute(
                "INSERT OR IGNORE INTO group_topics (group_id, topic_id, name, visibility) VALUES (?, ?, ?, ?)",
                params![topic.group_id, topic.topic_id, topic.name, topic.visibility],
            )
            .map_err(|e| MenuError::db("Topic insert failed", e))? as u64;
    }

    for post in &import.posts {
        summary.posts += conn
            .execute(
                "INSERT OR IGNORE INTO group_posts (group_id, post_id, post_type, has_location) VALUES (?, ?, ?, ?)",
                params![post.group_id, post.post_id, post.post_type, post.has_location],
            )
            .map_err(|e| MenuError::db("Post insert failed", e))? as u64;
    }

    for rel in &import.relationships {
        summary.relationships += conn
            .execute(
                "INSERT OR IGNORE INTO group_relationships (parent_group_id, child_group_id) VALUES (?, ?)",
                params![rel.parent_group_id, rel.child_group_id],
            )
            .map_err(|e| MenuError::db("Relationship insert failed", e))? as u64;
    }

    for view in &import.saved_views {
        summary.saved_views += conn
            .execute(
                "INSERT OR IGNORE INTO custom_views (id, group_id, name, sort_order) VALUES (?, ?, ?, ?)",
                params![view.id, view.group_id, view.name, view.sort_order],
            )
            .map_err(|e| MenuError::db("Saved view insert failed", e))? as u64;
    }

    debug!(?summary, "Imported legacy content");
    Ok(summary)
}
