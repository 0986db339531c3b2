//! Admin export use-case service.
//!
//! # Invariants
//! - Export requires an authenticated session and admin membership.
//! - The service never writes to the store.

use crate::auth::SessionContext;
use crate::export::csv::to_csv;
use crate::repo::export_repo::ExportRepository;
use crate::repo::roster_repo::RosterRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which export to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// All stored parts joined with roster data.
    Parts,
    /// Roster pairs only.
    Roster,
}

impl ExportKind {
    /// Download file name for this export.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Parts => "parts_export.csv",
            Self::Roster => "roster_export.csv",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parts => "parts",
            Self::Roster => "roster",
        }
    }

    /// Parses `parts` or `roster`, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "parts" => Some(Self::Parts),
            "roster" => Some(Self::Roster),
            _ => None,
        }
    }
}

/// Serialized export ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub body: String,
    pub row_count: usize,
}

/// Export failures, mapped to sign-in, permission and store outcomes.
#[derive(Debug)]
pub enum ExportError {
    NotAuthenticated,
    NotAuthorized,
    Repo(RepoError),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "You are not signed in."),
            Self::NotAuthorized => write!(f, "You do not have admin access."),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::NotAuthenticated | Self::NotAuthorized => None,
        }
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::PermissionDenied { .. } => Self::NotAuthorized,
            other => Self::Repo(other),
        }
    }
}

/// Admin export facade over store implementations.
pub struct ExportService<R: RosterRepository + ExportRepository> {
    repo: R,
    session: SessionContext,
}

impl<R: RosterRepository + ExportRepository> ExportService<R> {
    pub fn new(repo: R, session: SessionContext) -> Self {
        Self { repo, session }
    }

    /// Returns whether the current session belongs to an admin.
    pub fn is_admin(&self) -> Result<bool, ExportError> {
        let identity = self
            .session
            .current()
            .ok_or(ExportError::NotAuthenticated)?;
        Ok(self.repo.is_admin(&identity.email)?)
    }

    /// Runs the export for the current session and serializes it to CSV.
    pub fn export_csv(&self, kind: ExportKind) -> Result<ExportFile, ExportError> {
        let identity = self
            .session
            .current()
            .ok_or(ExportError::NotAuthenticated)?;
        if !self.repo.is_admin(&identity.email)? {
            warn!(
                "event=admin_export module=export status=denied kind={}",
                kind.as_str()
            );
            return Err(ExportError::NotAuthorized);
        }

        let rows = match kind {
            ExportKind::Parts => self.repo.admin_export(&identity.email)?,
            ExportKind::Roster => self.repo.admin_export_roster(&identity.email)?,
        };
        info!(
            "event=admin_export module=export status=ok kind={} rows={}",
            kind.as_str(),
            rows.len()
        );
        Ok(ExportFile {
            file_name: kind.file_name(),
            content_type: "text/csv; charset=utf-8",
            body: to_csv(&rows),
            row_count: rows.len(),
        })
    }
}
