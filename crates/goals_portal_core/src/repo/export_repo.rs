//! Admin export queries.
//!
//! # Invariants
//! - Only admins may export; others get `PermissionDenied`.
//! - Every row of one export carries the same columns in the same order.

use crate::export::ExportRow;
use crate::model::part::{PartFields, PartName};
use crate::repo::roster_repo::RosterRepository;
use crate::repo::{RepoError, RepoResult, SqliteStore};
use log::info;
use rusqlite::Row;

/// Repository interface for admin-only bulk reads.
pub trait ExportRepository {
    /// One row per stored part, joined with its roster pair.
    fn admin_export(&self, viewer: &str) -> RepoResult<Vec<ExportRow>>;
    /// One row per roster pair.
    fn admin_export_roster(&self, viewer: &str) -> RepoResult<Vec<ExportRow>>;
}

impl ExportRepository for SqliteStore<'_> {
    fn admin_export(&self, viewer: &str) -> RepoResult<Vec<ExportRow>> {
        self.require_admin(viewer)?;

        let mut stmt = self.conn.prepare(
            "SELECT
                r.pair_id,
                r.school_name,
                r.educator_name,
                r.educator_email,
                r.evaluator_name,
                r.evaluator_email,
                r.resolution_name,
                r.resolution_email,
                p.part_name,
                p.fields,
                p.updated_by,
                p.updated_at
             FROM parts p
             INNER JOIN roster r ON r.pair_id = p.pair_id
             ORDER BY r.pair_id ASC, p.part_name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut export = Vec::new();
        while let Some(row) = rows.next()? {
            export.push(parse_part_export_row(row)?);
        }

        info!(
            "event=admin_export module=repo status=ok kind=parts rows={}",
            export.len()
        );
        Ok(export)
    }

    fn admin_export_roster(&self, viewer: &str) -> RepoResult<Vec<ExportRow>> {
        self.require_admin(viewer)?;

        let mut stmt = self.conn.prepare(
            "SELECT
                pair_id,
                school_name,
                educator_name,
                educator_email,
                evaluator_name,
                evaluator_email,
                resolution_name,
                resolution_email
             FROM roster
             ORDER BY pair_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut export = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = ExportRow::new();
            push_roster_columns(&mut record, row)?;
            export.push(record);
        }

        info!(
            "event=admin_export module=repo status=ok kind=roster rows={}",
            export.len()
        );
        Ok(export)
    }
}

impl SqliteStore<'_> {
    fn require_admin(&self, viewer: &str) -> RepoResult<()> {
        if self.is_admin(viewer)? {
            return Ok(());
        }
        Err(RepoError::PermissionDenied {
            email: viewer.trim().to_lowercase(),
            action: "export records",
        })
    }
}

const ROSTER_COLUMNS: &[&str] = &[
    "pair_id",
    "school_name",
    "educator_name",
    "educator_email",
    "evaluator_name",
    "evaluator_email",
    "resolution_name",
    "resolution_email",
];

fn push_roster_columns(record: &mut ExportRow, row: &Row<'_>) -> RepoResult<()> {
    for column in ROSTER_COLUMNS {
        let value: Option<String> = row.get(*column)?;
        record.push(*column, value);
    }
    Ok(())
}

fn parse_part_export_row(row: &Row<'_>) -> RepoResult<ExportRow> {
    let mut record = ExportRow::new();
    push_roster_columns(&mut record, row)?;

    let part_text: String = row.get("part_name")?;
    if PartName::parse(&part_text).is_none() {
        return Err(RepoError::InvalidData(format!(
            "invalid part name `{part_text}` in parts.part_name"
        )));
    }
    record.push("part_name", Some(part_text));
    record.push("updated_by", row.get("updated_by")?);
    record.push(
        "updated_at",
        row.get::<_, Option<i64>>("updated_at")?
            .map(|value| value.to_string()),
    );

    let payload: String = row.get("fields")?;
    let fields: PartFields = serde_json::from_str(&payload).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in parts.fields: {err}"))
    })?;
    for entry in fields.entries() {
        record.push(entry.column, entry.value);
    }
    Ok(record)
}
