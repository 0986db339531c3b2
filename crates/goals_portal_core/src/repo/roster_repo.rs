//! Roster and admin repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - List roster pairs visible to a viewer.
//! - Provision pairs and admin grants (administrative paths only).
//!
//! # Invariants
//! - Stored role emails are trimmed and lowercase; blank means unassigned.
//! - Admins see every pair; other viewers only pairs where they hold a role.

use crate::email::normalize_email;
use crate::model::roster::RosterPair;
use crate::repo::{RepoError, RepoResult, SqliteStore};
use log::info;
use rusqlite::{params, OptionalExtension, Row};

const ROSTER_SELECT_SQL: &str = "SELECT
    pair_id,
    school_name,
    educator_email,
    educator_name,
    evaluator_email,
    evaluator_name,
    resolution_email,
    resolution_name
FROM roster";

/// Repository interface for roster pairs and admin membership.
pub trait RosterRepository {
    /// Pairs the viewer may see, ordered by `pair_id`.
    fn list_visible_pairs(&self, viewer: &str) -> RepoResult<Vec<RosterPair>>;
    /// Unfiltered lookup used by store-side rules and provisioning.
    fn get_pair(&self, pair_id: &str) -> RepoResult<Option<RosterPair>>;
    /// Provisions one pair. Fails on duplicate ids.
    fn insert_pair(&self, pair: &RosterPair) -> RepoResult<()>;
    /// Returns whether `email` is an admin.
    fn is_admin(&self, email: &str) -> RepoResult<bool>;
    /// Grants admin membership. Idempotent.
    fn grant_admin(&self, email: &str) -> RepoResult<()>;
}

impl RosterRepository for SqliteStore<'_> {
    fn list_visible_pairs(&self, viewer: &str) -> RepoResult<Vec<RosterPair>> {
        let viewer = viewer.trim().to_lowercase();
        if viewer.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "{ROSTER_SELECT_SQL}
             WHERE educator_email = ?1
                OR evaluator_email = ?1
                OR resolution_email = ?1
                OR EXISTS(SELECT 1 FROM admins WHERE email = ?1)
             ORDER BY pair_id ASC;"
        ))?;
        let mut rows = stmt.query([viewer.as_str()])?;
        let mut pairs = Vec::new();
        while let Some(row) = rows.next()? {
            pairs.push(parse_roster_row(row)?);
        }
        Ok(pairs)
    }

    fn get_pair(&self, pair_id: &str) -> RepoResult<Option<RosterPair>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROSTER_SELECT_SQL} WHERE pair_id = ?1;"))?;
        let mut rows = stmt.query([pair_id.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_roster_row(row)?));
        }
        Ok(None)
    }

    fn insert_pair(&self, pair: &RosterPair) -> RepoResult<()> {
        let pair_id = pair.pair_id.trim();
        if pair_id.is_empty() {
            return Err(RepoError::InvalidData("pair_id must not be blank".to_string()));
        }
        if self.get_pair(pair_id)?.is_some() {
            return Err(RepoError::DuplicatePair(pair_id.to_string()));
        }

        let educator_email = normalize_role_email("educator_email", &pair.educator_email)?;
        let evaluator_email = normalize_role_email("evaluator_email", &pair.evaluator_email)?;
        let resolution_email = normalize_role_email("resolution_email", &pair.resolution_email)?;

        self.conn.execute(
            "INSERT INTO roster (
                pair_id,
                school_name,
                educator_email,
                educator_name,
                evaluator_email,
                evaluator_name,
                resolution_email,
                resolution_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                pair_id,
                pair.school_name.trim(),
                educator_email,
                pair.educator_name.trim(),
                evaluator_email,
                pair.evaluator_name.trim(),
                resolution_email,
                pair.resolution_name.trim(),
            ],
        )?;

        info!("event=roster_insert module=repo status=ok pair_id={pair_id}");
        Ok(())
    }

    fn is_admin(&self, email: &str) -> RepoResult<bool> {
        let email = email.trim().to_lowercase();
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM admins WHERE email = ?1;",
                [email.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn grant_admin(&self, email: &str) -> RepoResult<()> {
        let normalized = normalize_email(email)
            .ok_or_else(|| RepoError::InvalidData(format!("invalid admin email `{email}`")))?;
        self.conn.execute(
            "INSERT OR IGNORE INTO admins (email) VALUES (?1);",
            [normalized.as_str()],
        )?;
        info!("event=admin_grant module=repo status=ok");
        Ok(())
    }
}

fn normalize_role_email(column: &str, raw: &str) -> RepoResult<String> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    normalize_email(raw)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid {column} `{}`", raw.trim())))
}

fn parse_roster_row(row: &Row<'_>) -> RepoResult<RosterPair> {
    Ok(RosterPair {
        pair_id: row.get("pair_id")?,
        school_name: row.get("school_name")?,
        educator_email: row.get("educator_email")?,
        educator_name: row.get("educator_name")?,
        evaluator_email: row.get("evaluator_email")?,
        evaluator_name: row.get("evaluator_name")?,
        resolution_email: row.get("resolution_email")?,
        resolution_name: row.get("resolution_name")?,
    })
}
