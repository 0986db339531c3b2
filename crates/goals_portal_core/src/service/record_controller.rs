//! Record Access Controller.
//!
//! # Responsibility
//! - Track the selected pair and part for one signed-in viewer.
//! - Gate editing by role and by in-flight saves.
//! - Run the load -> edit -> save -> reload cycle against the store.
//!
//! # Invariants
//! - After a successful save, local state is the canonical store row, never
//!   the local draft.
//! - A failed save leaves local state untouched.
//! - Every selection change bumps `generation`; a save whose captured
//!   generation is stale is persisted but not applied to the current view.
//! - An in-flight save only blocks editing within its own generation.
//! - Every pair or part load starts from a cleared notice.

use crate::access::{evaluate_access, PartAccess};
use crate::auth::{SessionContext, SessionEvent};
use crate::model::part::{PartFields, PartName, PartRecord, PartValidationError};
use crate::model::roster::RosterPair;
use crate::repo::part_repo::PartRepository;
use crate::repo::roster_repo::RosterRepository;
use crate::repo::RepoError;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Receiver;

pub type ControllerResult<T> = Result<T, ControllerError>;

/// User-visible, dismissible status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No session; the shell should route to sign-in.
    SignInRequired,
    /// Caller lacks the role for the requested action.
    PermissionDenied(String),
    /// Store read failed; the record is unloaded.
    LoadFailed(String),
    /// Store write failed; the local draft is preserved.
    SaveFailed(String),
    Saved,
}

impl Notice {
    /// Whether the notice reports a failure.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Saved | Self::SignInRequired)
    }

    pub fn message(&self) -> String {
        match self {
            Self::SignInRequired => "Please sign in.".to_string(),
            Self::PermissionDenied(message)
            | Self::LoadFailed(message)
            | Self::SaveFailed(message) => message.clone(),
            Self::Saved => "Saved".to_string(),
        }
    }
}

/// Controller errors.
#[derive(Debug)]
pub enum ControllerError {
    SignInRequired,
    NoPairSelected,
    /// Pair is not among the viewer's visible pairs.
    UnknownPair(String),
    /// Viewer is not the part's role.
    ReadOnly(PartName),
    SaveInFlight,
    Validation(PartValidationError),
    Repo(RepoError),
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignInRequired => write!(f, "sign-in required"),
            Self::NoPairSelected => write!(f, "no pair selected"),
            Self::UnknownPair(pair_id) => write!(f, "pair not available: {pair_id}"),
            Self::ReadOnly(part) => write!(f, "You have view-only access to {part}."),
            Self::SaveInFlight => write!(f, "a save is already in progress"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ControllerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<PartValidationError> for ControllerError {
    fn from(value: PartValidationError) -> Self {
        Self::Validation(value)
    }
}

/// A save that has been started but not yet written.
///
/// Captures the key, writer and generation at the time `begin_save` ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    record: PartRecord,
    viewer: String,
    generation: u64,
}

impl PendingSave {
    /// Merged record that will be upserted.
    pub fn record(&self) -> &PartRecord {
        &self.record
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of a completed save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Canonical row replaced local state.
    Applied(PartRecord),
    /// Selection changed mid-save; the canonical row was not applied.
    Detached(PartRecord),
}

impl SaveOutcome {
    /// Canonical row reloaded after the write.
    pub fn record(&self) -> &PartRecord {
        match self {
            Self::Applied(record) | Self::Detached(record) => record,
        }
    }
}

/// Access-controlled view over one pair's part records.
pub struct RecordController<S: RosterRepository + PartRepository> {
    store: S,
    session: SessionContext,
    session_events: Receiver<SessionEvent>,
    pairs: Vec<RosterPair>,
    pair_id: Option<String>,
    part: PartName,
    record: Option<PartRecord>,
    generation: u64,
    /// Generation of the save started by `begin_save`, until it completes
    /// or is aborted.
    saving: Option<u64>,
    notice: Option<Notice>,
}

impl<S: RosterRepository + PartRepository> RecordController<S> {
    /// Creates a controller bound to `session`. Performs no I/O; call
    /// `refresh_roster` to populate pairs.
    pub fn new(store: S, session: SessionContext) -> Self {
        let session_events = session.subscribe();
        Self {
            store,
            session,
            session_events,
            pairs: Vec::new(),
            pair_id: None,
            part: PartName::Part1,
            record: None,
            generation: 0,
            saving: None,
            notice: None,
        }
    }

    /// Email of the signed-in viewer.
    pub fn viewer_email(&self) -> Option<String> {
        self.session.current_email()
    }

    pub fn pairs(&self) -> &[RosterPair] {
        &self.pairs
    }

    pub fn selected_pair_id(&self) -> Option<&str> {
        self.pair_id.as_deref()
    }

    pub fn selected_pair(&self) -> Option<&RosterPair> {
        let pair_id = self.pair_id.as_deref()?;
        self.pairs.iter().find(|pair| pair.pair_id == pair_id)
    }

    pub fn selected_part(&self) -> PartName {
        self.part
    }

    /// Loaded record (canonical or locally edited). `None` when unloaded.
    pub fn record(&self) -> Option<&PartRecord> {
        self.record.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a save started for the current selection is still pending.
    pub fn is_saving(&self) -> bool {
        self.saving == Some(self.generation)
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Access of the current viewer to the selected part.
    pub fn access(&self) -> PartAccess {
        let email = self.session.current_email();
        evaluate_access(email.as_deref(), self.selected_pair(), self.part)
    }

    /// Whether fields should be interactive right now.
    pub fn is_editable(&self) -> bool {
        self.access().can_edit() && !self.is_saving()
    }

    /// Loads the pairs visible to the session and keeps or picks a selection.
    ///
    /// Keeps the current pair when still visible, otherwise selects the first.
    pub fn refresh_roster(&mut self) -> ControllerResult<()> {
        let viewer = self.require_viewer()?;
        let pairs = match self.store.list_visible_pairs(&viewer) {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!("event=roster_load module=controller status=error error={err}");
                self.notice = Some(Notice::LoadFailed(err.to_string()));
                return Err(err.into());
            }
        };
        info!(
            "event=roster_load module=controller status=ok pairs={}",
            pairs.len()
        );

        let keep_current = self
            .pair_id
            .as_deref()
            .is_some_and(|current| pairs.iter().any(|pair| pair.pair_id == current));
        self.pairs = pairs;
        if !keep_current {
            self.pair_id = self.pairs.first().map(|pair| pair.pair_id.clone());
            self.generation += 1;
        }
        self.reload()
    }

    /// Switches the active pair and reloads the current part.
    pub fn select_pair(&mut self, pair_id: &str) -> ControllerResult<()> {
        self.require_viewer()?;
        let pair_id = pair_id.trim();
        if !self.pairs.iter().any(|pair| pair.pair_id == pair_id) {
            return Err(ControllerError::UnknownPair(pair_id.to_string()));
        }
        self.pair_id = Some(pair_id.to_string());
        self.generation += 1;
        debug!(
            "event=select_pair module=controller status=ok pair_id={pair_id} generation={}",
            self.generation
        );
        self.reload()
    }

    /// Switches the active part and reloads it for the active pair.
    pub fn select_part(&mut self, part: PartName) -> ControllerResult<()> {
        self.require_viewer()?;
        self.part = part;
        self.generation += 1;
        debug!(
            "event=select_part module=controller status=ok part={part} generation={}",
            self.generation
        );
        self.reload()
    }

    /// Fetches the record for `(pair_id, part)`, or an empty record when no
    /// row exists yet. Absence is not an error; store failures are.
    pub fn load(&self, pair_id: &str, part: PartName) -> ControllerResult<PartRecord> {
        let viewer = self.require_viewer()?;
        let record = self.store.get_part(&viewer, pair_id, part)?;
        Ok(record.unwrap_or_else(|| PartRecord::empty(pair_id, part)))
    }

    /// Applies local draft edits to the loaded record.
    pub fn edit(&mut self, patch: &PartFields) -> ControllerResult<()> {
        let pair_id = self.ensure_editable()?;
        patch.validate_for(self.part)?;
        let part = self.part;
        self.record
            .get_or_insert_with(|| PartRecord::empty(pair_id, part))
            .fields
            .merge(patch);
        Ok(())
    }

    /// Merges `patch` into the loaded record, upserts it and re-syncs local
    /// state with the canonical row.
    pub fn save(&mut self, patch: &PartFields) -> ControllerResult<SaveOutcome> {
        let pending = self.begin_save(patch)?;
        self.complete_save(pending)
    }

    /// First half of `save`: validates, captures the key and generation, and
    /// marks a save as in flight. Local state is not modified.
    pub fn begin_save(&mut self, patch: &PartFields) -> ControllerResult<PendingSave> {
        let pair_id = self.ensure_editable()?;
        let viewer = self.require_viewer()?;

        let mut record = self
            .record
            .clone()
            .filter(|record| record.pair_id == pair_id && record.part_name == self.part)
            .unwrap_or_else(|| PartRecord::empty(pair_id, self.part));
        record.fields.merge(patch);
        record.validate()?;

        self.saving = Some(self.generation);
        self.notice = None;
        Ok(PendingSave {
            record,
            viewer,
            generation: self.generation,
        })
    }

    /// Second half of `save`: writes, reloads the captured key and applies
    /// the canonical row when the selection has not moved on.
    pub fn complete_save(&mut self, pending: PendingSave) -> ControllerResult<SaveOutcome> {
        self.release_save(pending.generation);
        let PendingSave {
            record,
            viewer,
            generation,
        } = pending;
        let stale = generation != self.generation;

        let written = match self.store.upsert_part(&viewer, &record) {
            Ok(written) => written,
            Err(err) => {
                warn!(
                    "event=part_save module=controller status=error pair_id={} part={} error={err}",
                    record.pair_id, record.part_name
                );
                if !stale {
                    self.notice = Some(match err {
                        RepoError::PermissionDenied { .. } => {
                            Notice::PermissionDenied(err.to_string())
                        }
                        _ => Notice::SaveFailed(err.to_string()),
                    });
                }
                return Err(err.into());
            }
        };

        let canonical = match self
            .store
            .get_part(&viewer, &record.pair_id, record.part_name)
        {
            Ok(Some(canonical)) => canonical,
            Ok(None) => written,
            Err(err) => {
                warn!(
                    "event=part_reload module=controller status=error pair_id={} part={} error={err}",
                    record.pair_id, record.part_name
                );
                if !stale {
                    self.notice = Some(Notice::LoadFailed(err.to_string()));
                }
                return Err(err.into());
            }
        };

        info!(
            "event=part_save module=controller status=ok pair_id={} part={} detached={stale}",
            canonical.pair_id, canonical.part_name
        );
        if stale {
            return Ok(SaveOutcome::Detached(canonical));
        }
        self.record = Some(canonical.clone());
        self.notice = Some(Notice::Saved);
        Ok(SaveOutcome::Applied(canonical))
    }

    /// Abandons a save started by `begin_save` without writing it.
    pub fn abort_save(&mut self, pending: PendingSave) {
        self.release_save(pending.generation);
        debug!(
            "event=part_save module=controller status=aborted pair_id={} part={}",
            pending.record.pair_id, pending.record.part_name
        );
    }

    /// Drains session-change events and re-synchronizes state.
    ///
    /// Returns whether any event was observed.
    pub fn sync_session(&mut self) -> ControllerResult<bool> {
        let changed = self.session_events.try_iter().count() > 0;
        if !changed {
            return Ok(false);
        }

        self.pairs.clear();
        self.pair_id = None;
        self.record = None;
        self.generation += 1;
        if self.session.is_signed_in() {
            self.notice = None;
            self.refresh_roster()?;
        } else {
            info!("event=session_sync module=controller status=signed_out");
            self.notice = Some(Notice::SignInRequired);
        }
        Ok(true)
    }

    fn reload(&mut self) -> ControllerResult<()> {
        let Some(pair_id) = self.pair_id.clone() else {
            self.record = None;
            return Ok(());
        };
        self.notice = None;
        match self.load(&pair_id, self.part) {
            Ok(record) => {
                self.record = Some(record);
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=part_load module=controller status=error pair_id={pair_id} part={} error={err}",
                    self.part
                );
                self.record = None;
                self.notice = Some(Notice::LoadFailed(err.to_string()));
                Err(err)
            }
        }
    }

    fn release_save(&mut self, generation: u64) {
        if self.saving == Some(generation) {
            self.saving = None;
        }
    }

    fn require_viewer(&self) -> ControllerResult<String> {
        self.session
            .current_email()
            .ok_or(ControllerError::SignInRequired)
    }

    fn ensure_editable(&self) -> ControllerResult<String> {
        self.require_viewer()?;
        let pair_id = self
            .pair_id
            .clone()
            .ok_or(ControllerError::NoPairSelected)?;
        if self.is_saving() {
            return Err(ControllerError::SaveInFlight);
        }
        if !self.access().can_edit() {
            return Err(ControllerError::ReadOnly(self.part));
        }
        Ok(pair_id)
    }
}
