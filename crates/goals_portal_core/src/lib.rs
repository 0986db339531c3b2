//! Core domain logic for the goals portal.
//! This crate is the single source of truth for access rules and record
//! invariants.

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::{evaluate_access, role_for_part, PartAccess};
pub use auth::{
    AuthError, AuthResult, CodeDelivery, Identity, IdentityProvider, Session, SessionContext,
    SessionEvent, SqliteIdentityProvider, DEFAULT_SESSION_TTL,
};
pub use config::{ConfigError, PortalConfig};
pub use email::normalize_email;
pub use export::{ExportError, ExportFile, ExportKind, ExportRow, ExportService};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::part::{
    AttainmentStatus, GoalReview, GoalSlot, PartFields, PartName, PartRecord,
    PartValidationError, GOAL_SLOTS,
};
pub use model::roster::{Role, RosterPair};
pub use repo::export_repo::ExportRepository;
pub use repo::part_repo::PartRepository;
pub use repo::roster_repo::RosterRepository;
pub use repo::{RepoError, RepoResult, SqliteStore};
pub use service::record_controller::{
    ControllerError, ControllerResult, Notice, PendingSave, RecordController, SaveOutcome,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
