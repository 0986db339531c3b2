//! SQLite-backed portal store handle.

use crate::db::ensure_tables;
use crate::repo::RepoResult;
use rusqlite::Connection;

const REQUIRED_TABLES: &[&str] = &["roster", "parts", "admins"];

/// SQLite-backed store implementing every repository contract.
pub struct SqliteStore<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Constructs a store from a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::Db(DbError::SchemaNotReady)` when the connection was not
    ///   opened through `open_db`/`open_db_in_memory`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    /// Row-level read rule: participants of the pair and admins.
    pub(crate) fn can_read_pair(&self, viewer: &str, pair_id: &str) -> RepoResult<bool> {
        let viewer = viewer.trim().to_lowercase();
        if viewer.is_empty() {
            return Ok(false);
        }
        let visible: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM roster
                WHERE pair_id = ?1
                  AND (educator_email = ?2 OR evaluator_email = ?2 OR resolution_email = ?2)
             ) OR EXISTS(
                SELECT 1 FROM admins WHERE email = ?2
             );",
            [pair_id, viewer.as_str()],
            |row| row.get(0),
        )?;
        Ok(visible == 1)
    }
}
