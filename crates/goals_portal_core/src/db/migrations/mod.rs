//! Schema migrations, tracked through `PRAGMA user_version`.
//!
//! Step `n` in `STEPS` moves the schema from version `n - 1` to `n`. Steps are
//! append-only; all pending steps run in a single transaction.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

const STEPS: &[&str] = &[
    include_str!("0001_roster_parts.sql"),
    include_str!("0002_admins.sql"),
    include_str!("0003_identity.sql"),
];

/// Schema version produced by the last known step.
pub fn latest_version() -> u32 {
    u32::try_from(STEPS.len()).unwrap_or(u32::MAX)
}

/// Brings `conn` up to `latest_version()`.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer
///   build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let to = latest_version();
    if from > to {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: to,
        });
    }
    if from == to {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in (1..=to).zip(STEPS).skip(from as usize) {
        debug!("event=db_migrate_step module=db status=start version={version}");
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from} to_version={to}");
    Ok(())
}
