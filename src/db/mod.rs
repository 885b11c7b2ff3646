//! SQLite storage for menu nodes and the legacy content read model
//!
//! ## Tables
//!
//! - `menu_nodes` - the menu forest, one row per node
//! - `groups`, `group_admins` - groups and who may administer their menus
//! - `group_topics`, `group_posts`, `group_relationships`, `custom_views` -
//!   pre-existing group content the bootstrapper derives menus from

pub mod schema;
pub mod menu_nodes;
pub mod legacy_content;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{MenuError, Result};

/// SQLite database holding all menu state
pub struct MenuDb {
    conn: Mutex<Connection>,
}

impl MenuDb {
    /// Open or create the database file
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        info!("Opening SQLite database at {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| MenuError::db("Failed to open SQLite", e))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| MenuError::db("Failed to set PRAGMA", e))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| MenuError::db("Failed to set busy timeout", e))?;

        Self::with_schema(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| MenuError::db("Failed to open in-memory SQLite", e))?;

        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        schema::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MenuError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction.
    ///
    /// The write lock is taken at BEGIN, so the read-compute-write cycle of a
    /// call never interleaves with another writer. Commits when `f` returns
    /// `Ok`; any error rolls everything back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| MenuError::Internal(format!("Lock poisoned: {}", e)))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| MenuError::db("Transaction failed", e))?;

        let value = f(&tx)?;

        tx.commit().map_err(|e| MenuError::db("Commit failed", e))?;
        Ok(value)
    }
}
