//! Part record repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Read and upsert part rows keyed on `(pair_id, part_name)`.
//! - Apply store-side normalization before persistence.
//!
//! # Invariants
//! - Write paths validate and normalize fields before SQL mutations.
//! - Only the part's role may write; other callers get `PermissionDenied`.
//! - Rows of pairs the viewer may not read are reported as absent.

use crate::access::is_part_editor;
use crate::db::now_epoch_ms;
use crate::model::part::{PartFields, PartName, PartRecord};
use crate::repo::roster_repo::RosterRepository;
use crate::repo::{RepoError, RepoResult, SqliteStore};
use log::{debug, warn};
use rusqlite::{params, Row};

/// Repository interface for part records.
pub trait PartRepository {
    /// Fetches one part row, or `None` when absent or not visible.
    fn get_part(
        &self,
        viewer: &str,
        pair_id: &str,
        part_name: PartName,
    ) -> RepoResult<Option<PartRecord>>;

    /// Inserts or replaces the row keyed on `(pair_id, part_name)`.
    ///
    /// Returns the normalized record as written.
    fn upsert_part(&self, viewer: &str, record: &PartRecord) -> RepoResult<PartRecord>;
}

impl PartRepository for SqliteStore<'_> {
    fn get_part(
        &self,
        viewer: &str,
        pair_id: &str,
        part_name: PartName,
    ) -> RepoResult<Option<PartRecord>> {
        if !self.can_read_pair(viewer, pair_id)? {
            debug!(
                "event=part_get module=repo status=hidden pair_id={pair_id} part={part_name}"
            );
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT
                pair_id,
                part_name,
                fields,
                updated_by,
                updated_at
             FROM parts
             WHERE pair_id = ?1
               AND part_name = ?2;",
        )?;
        let mut rows = stmt.query(params![pair_id, part_name.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_part_row(row)?));
        }
        Ok(None)
    }

    fn upsert_part(&self, viewer: &str, record: &PartRecord) -> RepoResult<PartRecord> {
        record.validate()?;

        let pair = self
            .get_pair(&record.pair_id)?
            .ok_or_else(|| RepoError::PairNotFound(record.pair_id.clone()))?;
        if !is_part_editor(&pair, record.part_name, viewer) {
            warn!(
                "event=part_upsert module=repo status=denied pair_id={} part={}",
                record.pair_id, record.part_name
            );
            return Err(RepoError::PermissionDenied {
                email: viewer.trim().to_lowercase(),
                action: "write this part",
            });
        }

        let mut fields = record.fields.clone();
        fields.normalize();
        let payload = serde_json::to_string(&fields).map_err(|err| {
            RepoError::InvalidData(format!("failed to encode part fields: {err}"))
        })?;
        let updated_by = viewer.trim().to_lowercase();
        let updated_at = now_epoch_ms();

        self.conn.execute(
            "INSERT INTO parts (pair_id, part_name, fields, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (pair_id, part_name) DO UPDATE SET
                fields = excluded.fields,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at;",
            params![
                pair.pair_id,
                record.part_name.as_str(),
                payload,
                updated_by,
                updated_at,
            ],
        )?;

        debug!(
            "event=part_upsert module=repo status=ok pair_id={} part={}",
            pair.pair_id, record.part_name
        );
        Ok(PartRecord {
            pair_id: pair.pair_id,
            part_name: record.part_name,
            fields,
            updated_at: Some(updated_at),
            updated_by: Some(updated_by),
        })
    }
}

fn parse_part_row(row: &Row<'_>) -> RepoResult<PartRecord> {
    let part_text: String = row.get("part_name")?;
    let part_name = PartName::parse(&part_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid part name `{part_text}` in parts.part_name"))
    })?;

    let payload: String = row.get("fields")?;
    let fields: PartFields = serde_json::from_str(&payload).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in parts.fields: {err}"))
    })?;

    let record = PartRecord {
        pair_id: row.get("pair_id")?,
        part_name,
        fields,
        updated_at: Some(row.get("updated_at")?),
        updated_by: row.get("updated_by")?,
    };
    record.validate()?;
    Ok(record)
}
