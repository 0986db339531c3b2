//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose sign-in, part viewing/saving and admin export to Dart via FRB.
//! - Translate core errors into stable response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every call opens its own connection; sessions are addressed by token.
//! - One-time codes never appear in logs.

use goals_portal_core::db::open_db;
use goals_portal_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AuthError, ControllerError, ExportKind, ExportService, IdentityProvider, Notice, PartAccess,
    PartFields, PartName, PartRecord, PortalConfig, RecordController, RepoError, SessionContext,
    SqliteIdentityProvider, SqliteStore, DEFAULT_SESSION_TTL,
};
use log::{info, warn};
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::OnceLock;

static PORTAL_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts return an error message.
/// - Returns empty string on success.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the SQLite database path for this process.
///
/// # FFI contract
/// - Must run before any DB-backed call to take effect.
/// - Repeating the same path is a no-op; a different path returns an error.
/// - Returns empty string on success.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_db_path(path: String) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "db path must not be empty".to_string();
    }
    let requested = PathBuf::from(trimmed);
    let active = PORTAL_DB_PATH.get_or_init(|| requested.clone());
    if *active == requested {
        String::new()
    } else {
        format!("db path already configured: {}", active.display())
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Response of `auth_send_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCodeResponse {
    pub ok: bool,
    pub message: String,
    /// Issued code, echoed back in debug builds only. No mail transport
    /// exists in this crate.
    pub dev_code: Option<String>,
}

/// Session envelope for sign-in and session checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub ok: bool,
    /// Opaque session token to pass to later calls.
    pub token: Option<String>,
    /// Normalized email of the signed-in user.
    pub email: Option<String>,
    pub message: String,
}

impl SessionResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            token: None,
            email: None,
            message: message.into(),
        }
    }
}

/// Roster pair as shown in the pair picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairItem {
    pub pair_id: String,
    pub school_name: String,
    /// Display label built from role names.
    pub label: String,
    /// Roles the viewer holds on this pair (`educator|evaluator|resolution`).
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairListResponse {
    pub ok: bool,
    pub items: Vec<PairItem>,
    pub message: String,
}

/// Part view envelope returned by open and save calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartViewResponse {
    pub ok: bool,
    /// One of `sign_in_required|read_only|editable`.
    pub access: String,
    /// JSON object shaped like the part field set. `{}`-equivalent when empty.
    pub fields_json: String,
    /// Epoch milliseconds of the last write, `None` before the first save.
    pub updated_at: Option<i64>,
    pub updated_by: Option<String>,
    pub message: String,
}

impl PartViewResponse {
    fn failure(err: CallError) -> Self {
        let access = match err {
            CallError::SignInRequired => PartAccess::SignInRequired,
            CallError::Failed(_) => PartAccess::ReadOnly,
        };
        Self {
            ok: false,
            access: access_label(access).to_string(),
            fields_json: String::new(),
            updated_at: None,
            updated_by: None,
            message: err.message(),
        }
    }
}

/// Admin CSV export envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    pub ok: bool,
    pub file_name: String,
    pub content_type: String,
    /// CSV text; empty on failure or when nothing is stored.
    pub body: String,
    pub row_count: u32,
    pub message: String,
}

impl ExportResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            file_name: String::new(),
            content_type: String::new(),
            body: String::new(),
            row_count: 0,
            message: message.into(),
        }
    }
}

/// Issues a one-time sign-in code for `email`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Replaces any pending code for the same email.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_send_code(email: String) -> SendCodeResponse {
    let failure = |message: String| SendCodeResponse {
        ok: false,
        message,
        dev_code: None,
    };
    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(err) => return failure(format!("auth_send_code failed: {err}")),
    };
    let conn = match open_portal_db() {
        Ok(conn) => conn,
        Err(message) => return failure(message),
    };

    let issued = RefCell::new(None);
    let delivery = |_email: &str, code: &str| -> Result<(), String> {
        *issued.borrow_mut() = Some(code.to_string());
        Ok(())
    };
    let provider = match SqliteIdentityProvider::try_new(&conn, delivery) {
        Ok(provider) => provider.with_code_ttl(config.code_ttl),
        Err(err) => return failure(format!("auth_send_code failed: {err}")),
    };
    if let Err(err) = provider.send_one_time_code(&email) {
        log_failure("auth_send_code");
        return failure(auth_message(&err));
    }

    info!("event=ffi_call module=ffi status=ok call=auth_send_code");
    let dev_code = if cfg!(debug_assertions) {
        issued.borrow().clone()
    } else {
        None
    };
    SendCodeResponse {
        ok: true,
        message: "Check your email for a sign-in code.".to_string(),
        dev_code,
    }
}

/// Exchanges a one-time code for a session token.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_verify_code(email: String, code: String) -> SessionResponse {
    let conn = match open_portal_db() {
        Ok(conn) => conn,
        Err(message) => return SessionResponse::failure(message),
    };
    let mut provider = match SqliteIdentityProvider::try_new(&conn, no_delivery) {
        Ok(provider) => provider,
        Err(err) => return SessionResponse::failure(format!("auth_verify_code failed: {err}")),
    };
    match provider.verify_one_time_code(&email, &code) {
        Ok(session) => SessionResponse {
            ok: true,
            token: Some(session.token),
            email: Some(session.identity.email),
            message: "Signed in.".to_string(),
        },
        Err(err) => {
            log_failure("auth_verify_code");
            SessionResponse::failure(auth_message(&err))
        }
    }
}

/// Resolves the user behind `token`.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_current_user(token: String) -> SessionResponse {
    let conn = match open_portal_db() {
        Ok(conn) => conn,
        Err(message) => return SessionResponse::failure(message),
    };
    match resume_session(&conn, &token) {
        Ok(session) => SessionResponse {
            ok: true,
            token: Some(token.trim().to_string()),
            email: session.current_email(),
            message: String::new(),
        },
        Err(err) => SessionResponse::failure(err.message()),
    }
}

/// Ends the session behind `token`. Unknown tokens count as ended.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_end_session(token: String) -> ActionResponse {
    let conn = match open_portal_db() {
        Ok(conn) => conn,
        Err(message) => return ActionResponse::failure(message),
    };
    let mut provider = match SqliteIdentityProvider::try_new(&conn, no_delivery) {
        Ok(provider) => provider,
        Err(err) => return ActionResponse::failure(format!("auth_end_session failed: {err}")),
    };
    let result = match provider.resume_session(&token) {
        Ok(_) => provider.end_session(),
        Err(AuthError::NoSession) => Ok(()),
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ActionResponse::success("Signed out."),
        Err(err) => ActionResponse::failure(format!("auth_end_session failed: {err}")),
    }
}

/// Lists the roster pairs visible to the session.
#[flutter_rust_bridge::frb(sync)]
pub fn portal_list_pairs(token: String) -> PairListResponse {
    let result = with_controller(&token, |controller| {
        let email = controller.viewer_email().unwrap_or_default();
        Ok(controller
            .pairs()
            .iter()
            .map(|pair| PairItem {
                pair_id: pair.pair_id.clone(),
                school_name: pair.school_name.clone(),
                label: pair.label(),
                roles: pair
                    .roles_of(&email)
                    .into_iter()
                    .map(|role| role.as_str().to_string())
                    .collect(),
            })
            .collect::<Vec<_>>())
    });
    match result {
        Ok(items) => {
            let message = if items.is_empty() {
                "No pairs assigned.".to_string()
            } else {
                format!("Found {} pair(s).", items.len())
            };
            PairListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => PairListResponse {
            ok: false,
            items: Vec::new(),
            message: err.message(),
        },
    }
}

/// Opens one part of one pair.
///
/// # FFI contract
/// - Missing rows open as an empty field set.
/// - Read-only viewers get `ok=true`, `access=read_only` and a notice message.
#[flutter_rust_bridge::frb(sync)]
pub fn portal_open_part(token: String, pair_id: String, part: String) -> PartViewResponse {
    let part = match parse_part(&part) {
        Ok(part) => part,
        Err(err) => return PartViewResponse::failure(err),
    };
    let result = with_controller(&token, |controller| {
        controller.select_pair(&pair_id)?;
        controller.select_part(part)?;
        let record = controller
            .record()
            .cloned()
            .unwrap_or_else(|| PartRecord::empty(pair_id.trim(), part));
        Ok((controller.access(), record))
    });
    match result {
        Ok((access, record)) => {
            let message = match access {
                PartAccess::ReadOnly => ControllerError::ReadOnly(part).to_string(),
                _ => String::new(),
            };
            part_view(access, &record, message)
        }
        Err(err) => PartViewResponse::failure(err),
    }
}

/// Saves a partial field set into one part and returns the canonical row.
///
/// `fields_json` uses the same shape as `PartViewResponse.fields_json`:
/// - Omitted keys leave stored values unchanged.
/// - Goal arrays take up to three slots; missing trailing slots count as
///   omitted.
/// - An empty string clears a text field. `clear_attainment` (up to three
///   booleans) clears Part4 attainment slots.
#[flutter_rust_bridge::frb(sync)]
pub fn portal_save_part(
    token: String,
    pair_id: String,
    part: String,
    fields_json: String,
) -> PartViewResponse {
    let part = match parse_part(&part) {
        Ok(part) => part,
        Err(err) => return PartViewResponse::failure(err),
    };
    let patch: PartFields = match serde_json::from_str(&fields_json) {
        Ok(patch) => patch,
        Err(err) => {
            return PartViewResponse::failure(CallError::Failed(format!(
                "invalid fields_json: {err}"
            )))
        }
    };
    let result = with_controller(&token, |controller| {
        controller.select_pair(&pair_id)?;
        controller.select_part(part)?;
        let outcome = controller.save(&patch)?;
        Ok((controller.access(), outcome.record().clone()))
    });
    match result {
        Ok((access, record)) => part_view(access, &record, Notice::Saved.message()),
        Err(err) => {
            log_failure("portal_save_part");
            PartViewResponse::failure(err)
        }
    }
}

/// Runs an admin CSV export (`kind`: `parts|roster`).
#[flutter_rust_bridge::frb(sync)]
pub fn admin_export_csv(token: String, kind: String) -> ExportResponse {
    let Some(kind) = ExportKind::parse(&kind) else {
        return ExportResponse::failure(format!("unsupported export kind: {}", kind.trim()));
    };
    let conn = match open_portal_db() {
        Ok(conn) => conn,
        Err(message) => return ExportResponse::failure(message),
    };
    let session = match resume_session(&conn, &token) {
        Ok(session) => session,
        Err(err) => return ExportResponse::failure(err.message()),
    };
    let store = match SqliteStore::try_new(&conn) {
        Ok(store) => store,
        Err(err) => return ExportResponse::failure(format!("admin_export_csv failed: {err}")),
    };

    match ExportService::new(store, session).export_csv(kind) {
        Ok(file) => ExportResponse {
            ok: true,
            file_name: file.file_name.to_string(),
            content_type: file.content_type.to_string(),
            row_count: u32::try_from(file.row_count).unwrap_or(u32::MAX),
            body: file.body,
            message: format!("Exported {} row(s).", file.row_count),
        },
        Err(err) => {
            log_failure("admin_export_csv");
            ExportResponse::failure(err.to_string())
        }
    }
}

/// Failure of one bridged call.
enum CallError {
    SignInRequired,
    Failed(String),
}

impl CallError {
    fn message(&self) -> String {
        match self {
            Self::SignInRequired => Notice::SignInRequired.message(),
            Self::Failed(message) => message.clone(),
        }
    }
}

impl From<ControllerError> for CallError {
    fn from(value: ControllerError) -> Self {
        match value {
            ControllerError::SignInRequired => Self::SignInRequired,
            ControllerError::Repo(RepoError::PermissionDenied { .. }) => {
                Self::Failed("You do not have permission to change this part.".to_string())
            }
            other => Self::Failed(other.to_string()),
        }
    }
}

fn resolve_db_path() -> PathBuf {
    PORTAL_DB_PATH
        .get_or_init(|| match PortalConfig::from_env() {
            Ok(config) => config.db_path,
            Err(_) => PortalConfig::default().db_path,
        })
        .clone()
}

fn open_portal_db() -> Result<Connection, String> {
    open_db(resolve_db_path()).map_err(|err| format!("portal DB open failed: {err}"))
}

fn no_delivery(_email: &str, _code: &str) -> Result<(), String> {
    Err("code delivery is not available here".to_string())
}

fn resume_session(conn: &Connection, token: &str) -> Result<SessionContext, CallError> {
    if token.trim().is_empty() {
        return Err(CallError::SignInRequired);
    }
    let session_ttl = PortalConfig::from_env()
        .map(|config| config.session_ttl)
        .unwrap_or(DEFAULT_SESSION_TTL);
    let mut provider = SqliteIdentityProvider::try_new(conn, no_delivery)
        .map_err(|err| CallError::Failed(format!("identity provider init failed: {err}")))?
        .with_session_ttl(session_ttl);
    match provider.resume_session(token) {
        Ok(identity) => Ok(SessionContext::signed_in(identity)),
        Err(AuthError::NoSession) => Err(CallError::SignInRequired),
        Err(err) => Err(CallError::Failed(err.to_string())),
    }
}

fn with_controller<T>(
    token: &str,
    f: impl FnOnce(&mut RecordController<SqliteStore<'_>>) -> Result<T, ControllerError>,
) -> Result<T, CallError> {
    let conn = open_portal_db().map_err(CallError::Failed)?;
    let session = resume_session(&conn, token)?;
    let store = SqliteStore::try_new(&conn)
        .map_err(|err| CallError::Failed(format!("portal store init failed: {err}")))?;
    let mut controller = RecordController::new(store, session);
    controller.refresh_roster()?;
    Ok(f(&mut controller)?)
}

fn parse_part(value: &str) -> Result<PartName, CallError> {
    PartName::parse(value)
        .ok_or_else(|| CallError::Failed(format!("unknown part: {}", value.trim())))
}

fn part_view(access: PartAccess, record: &PartRecord, message: String) -> PartViewResponse {
    match serde_json::to_string(&record.fields) {
        Ok(fields_json) => PartViewResponse {
            ok: true,
            access: access_label(access).to_string(),
            fields_json,
            updated_at: record.updated_at,
            updated_by: record.updated_by.clone(),
            message,
        },
        Err(err) => {
            PartViewResponse::failure(CallError::Failed(format!("fields encode failed: {err}")))
        }
    }
}

fn access_label(access: PartAccess) -> &'static str {
    match access {
        PartAccess::SignInRequired => "sign_in_required",
        PartAccess::ReadOnly => "read_only",
        PartAccess::Editable => "editable",
    }
}

fn auth_message(err: &AuthError) -> String {
    match err {
        AuthError::Db(_) => format!("sign-in failed: {err}"),
        _ => err.to_string(),
    }
}

fn log_failure(call: &'static str) {
    warn!("event=ffi_call module=ffi status=error call={call}");
}

#[cfg(test)]
mod tests {
    use super::{
        admin_export_csv, auth_current_user, auth_end_session, auth_send_code,
        auth_verify_code, configure_db_path, core_version, init_logging, ping,
        portal_list_pairs, portal_open_part, portal_save_part,
    };
    use goals_portal_core::db::open_db;
    use goals_portal_core::{
        AttainmentStatus, PartFields, RosterPair, RosterRepository, SqliteStore,
    };
    use rusqlite::params;
    use std::path::PathBuf;
    use std::sync::OnceLock;

    static TEST_DB: OnceLock<PathBuf> = OnceLock::new();

    struct Fixture {
        pair_id: String,
        educator_token: String,
        evaluator_token: String,
    }

    fn test_db() -> PathBuf {
        TEST_DB
            .get_or_init(|| {
                let path = std::env::temp_dir().join(format!(
                    "goals_portal_ffi_test_{}.sqlite3",
                    std::process::id()
                ));
                assert_eq!(configure_db_path(path.display().to_string()), "");
                drop(open_db(&path).expect("migrate test db"));
                path
            })
            .clone()
    }

    fn sign_in(email: &str) -> String {
        let conn = open_db(test_db()).expect("open db");
        let token = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO sessions (token, email) VALUES (?1, ?2);",
            params![token, email],
        )
        .expect("insert session");
        token
    }

    fn fixture() -> Fixture {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let educator = format!("edu-{suffix}@x.org");
        let evaluator = format!("eval-{suffix}@x.org");
        let pair_id = format!("P-{suffix}");

        let conn = open_db(test_db()).expect("open db");
        let store = SqliteStore::try_new(&conn).expect("store");
        store
            .insert_pair(&RosterPair {
                pair_id: pair_id.clone(),
                school_name: "North".to_string(),
                educator_email: educator.clone(),
                educator_name: "Ada".to_string(),
                evaluator_email: evaluator.clone(),
                evaluator_name: "Bo".to_string(),
                ..RosterPair::default()
            })
            .expect("insert pair");

        Fixture {
            pair_id,
            educator_token: sign_in(&educator),
            evaluator_token: sign_in(&evaluator),
        }
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn configure_db_path_rejects_blank_and_accepts_same_path_again() {
        assert!(!configure_db_path("  ".to_string()).is_empty());
        let path = test_db();
        assert_eq!(configure_db_path(path.display().to_string()), "");
        assert!(!configure_db_path("/elsewhere/portal.db".to_string()).is_empty());
    }

    #[test]
    fn list_pairs_reports_viewer_roles() {
        let fixture = fixture();
        let response = portal_list_pairs(fixture.evaluator_token.clone());
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.items.len(), 1);
        let item = &response.items[0];
        assert_eq!(item.pair_id, fixture.pair_id);
        assert_eq!(item.roles, vec!["evaluator".to_string()]);
        assert_eq!(
            item.label,
            "Ada (Educator) - Bo (Evaluator) - Resolution (Resolution)"
        );
    }

    #[test]
    fn educator_saves_part1_and_evaluator_reads_it() {
        let fixture = fixture();
        let saved = portal_save_part(
            fixture.educator_token.clone(),
            fixture.pair_id.clone(),
            "Part1".to_string(),
            r#"{"goals":[{"goal_statement":"  Read more  "},{},{}]}"#.to_string(),
        );
        assert!(saved.ok, "{}", saved.message);
        assert_eq!(saved.access, "editable");
        assert_eq!(saved.message, "Saved");
        assert!(saved.updated_at.is_some());

        let opened = portal_open_part(
            fixture.evaluator_token.clone(),
            fixture.pair_id.clone(),
            "part1".to_string(),
        );
        assert!(opened.ok, "{}", opened.message);
        assert_eq!(opened.access, "read_only");
        assert_eq!(opened.message, "You have view-only access to Part1.");
        let fields: PartFields = serde_json::from_str(&opened.fields_json).expect("fields");
        assert_eq!(fields.goals[0].goal_statement.as_deref(), Some("Read more"));
    }

    #[test]
    fn evaluator_sets_and_clears_attainment_with_short_arrays() {
        let fixture = fixture();
        let set = portal_save_part(
            fixture.evaluator_token.clone(),
            fixture.pair_id.clone(),
            "Part4".to_string(),
            r#"{"goal_attainment":["met","not_met"]}"#.to_string(),
        );
        assert!(set.ok, "{}", set.message);

        let cleared = portal_save_part(
            fixture.evaluator_token.clone(),
            fixture.pair_id.clone(),
            "Part4".to_string(),
            r#"{"clear_attainment":[true]}"#.to_string(),
        );
        assert!(cleared.ok, "{}", cleared.message);
        let fields: PartFields = serde_json::from_str(&cleared.fields_json).expect("fields");
        assert_eq!(fields.goal_attainment[0], None);
        assert_eq!(fields.goal_attainment[1], Some(AttainmentStatus::NotMet));
    }

    #[test]
    fn read_only_viewer_cannot_save() {
        let fixture = fixture();
        let response = portal_save_part(
            fixture.evaluator_token,
            fixture.pair_id,
            "Part1".to_string(),
            r#"{"goals":[{"goal_statement":"not mine"},{},{}]}"#.to_string(),
        );
        assert!(!response.ok);
        assert_eq!(response.message, "You have view-only access to Part1.");
    }

    #[test]
    fn missing_part_opens_empty() {
        let fixture = fixture();
        let response = portal_open_part(
            fixture.evaluator_token,
            fixture.pair_id,
            "Part2".to_string(),
        );
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.access, "editable");
        assert_eq!(response.updated_at, None);
        let fields: PartFields = serde_json::from_str(&response.fields_json).expect("fields");
        assert_eq!(fields, PartFields::default());
    }

    #[test]
    fn unknown_token_requires_sign_in() {
        test_db();
        let response = portal_open_part(
            "no-such-token".to_string(),
            "P1".to_string(),
            "Part1".to_string(),
        );
        assert!(!response.ok);
        assert_eq!(response.access, "sign_in_required");
        assert_eq!(response.message, "Please sign in.");
    }

    #[test]
    fn malformed_input_is_reported() {
        let fixture = fixture();
        let bad_part = portal_open_part(
            fixture.educator_token.clone(),
            fixture.pair_id.clone(),
            "Part9".to_string(),
        );
        assert!(!bad_part.ok);
        assert!(bad_part.message.contains("unknown part"));

        let bad_json = portal_save_part(
            fixture.educator_token,
            fixture.pair_id,
            "Part1".to_string(),
            "not json".to_string(),
        );
        assert!(!bad_json.ok);
        assert!(bad_json.message.starts_with("invalid fields_json"));
    }

    #[test]
    fn export_is_admin_only() {
        let fixture = fixture();
        let denied = admin_export_csv(fixture.educator_token, "parts".to_string());
        assert!(!denied.ok);
        assert_eq!(denied.message, "You do not have admin access.");

        let admin = format!("admin-{}@x.org", uuid::Uuid::new_v4().simple());
        {
            let conn = open_db(test_db()).expect("open db");
            let store = SqliteStore::try_new(&conn).expect("store");
            store.grant_admin(&admin).expect("grant admin");
        }
        let export = admin_export_csv(sign_in(&admin), "roster".to_string());
        assert!(export.ok, "{}", export.message);
        assert_eq!(export.file_name, "roster_export.csv");
        assert!(export.body.starts_with("pair_id,school_name,"));
        assert!(export.body.contains(&fixture.pair_id));

        let unknown = admin_export_csv(String::new(), "everything".to_string());
        assert!(!unknown.ok);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn code_sign_in_round_trip() {
        test_db();
        let email = format!("user-{}@x.org", uuid::Uuid::new_v4().simple());
        let sent = auth_send_code(email.clone());
        assert!(sent.ok, "{}", sent.message);
        let code = sent.dev_code.expect("debug builds echo the code");

        let wrong = auth_verify_code(email.clone(), "not-a-code".to_string());
        assert!(!wrong.ok);

        let session = auth_verify_code(email.to_uppercase(), code);
        assert!(session.ok, "{}", session.message);
        let token = session.token.expect("token");
        assert_eq!(session.email.as_deref(), Some(email.as_str()));

        let current = auth_current_user(token.clone());
        assert_eq!(current.email.as_deref(), Some(email.as_str()));

        assert!(auth_end_session(token.clone()).ok);
        assert!(auth_end_session(token.clone()).ok);
        assert!(!auth_current_user(token).ok);
    }
}
