//! Identity provider contract, one-time-code implementation and session
//! context.
//!
//! # Responsibility
//! - Authenticate users by emailed one-time codes.
//! - Hold the signed-in identity explicitly and notify subscribers on change.
//!
//! # Invariants
//! - Identities carry normalized (trimmed, lowercase) emails.
//! - One-time codes are single-use and never logged.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod session;
mod sqlite_provider;

pub use session::{SessionContext, SessionEvent};
pub use sqlite_provider::{
    SqliteIdentityProvider, DEFAULT_CODE_TTL, DEFAULT_SESSION_TTL, MAX_FAILED_ATTEMPTS,
    ONE_TIME_CODE_DIGITS,
};

pub type AuthResult<T> = Result<T, AuthError>;

/// Authenticated user as seen by the portal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub email: String,
}

/// Session issued after a successful code verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque token used to resume the session later.
    pub token: String,
    pub identity: Identity,
}

/// Identity provider errors.
#[derive(Debug)]
pub enum AuthError {
    InvalidEmail(String),
    /// Code unknown or mismatched.
    InvalidCode,
    CodeExpired,
    TooManyAttempts,
    /// No active session for the supplied token.
    NoSession,
    /// Code could not be handed to the delivery channel.
    Delivery(String),
    Db(DbError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidCode => write!(f, "the code is invalid"),
            Self::CodeExpired => write!(f, "the code has expired; request a new one"),
            Self::TooManyAttempts => write!(f, "too many attempts; request a new code"),
            Self::NoSession => write!(f, "no active session"),
            Self::Delivery(message) => write!(f, "failed to deliver code: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Identity provider contract consumed by the portal.
pub trait IdentityProvider {
    /// Returns the user of the active session, if any.
    fn current_user(&self) -> AuthResult<Option<Identity>>;
    /// Issues a fresh one-time code for `email`, replacing any pending one.
    fn send_one_time_code(&self, email: &str) -> AuthResult<()>;
    /// Exchanges a one-time code for a session and makes it active.
    fn verify_one_time_code(&mut self, email: &str, code: &str) -> AuthResult<Session>;
    /// Ends the active session. Idempotent.
    fn end_session(&mut self) -> AuthResult<()>;
}

/// Channel that hands a one-time code to its recipient.
pub trait CodeDelivery {
    fn deliver(&self, email: &str, code: &str) -> Result<(), String>;
}

impl<F> CodeDelivery for F
where
    F: Fn(&str, &str) -> Result<(), String>,
{
    fn deliver(&self, email: &str, code: &str) -> Result<(), String> {
        self(email, code)
    }
}
