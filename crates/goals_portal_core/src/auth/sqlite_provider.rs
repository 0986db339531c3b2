//! SQLite-backed one-time-code identity provider.
//!
//! # Responsibility
//! - Issue numeric one-time codes and hand them to a `CodeDelivery`.
//! - Exchange valid codes for persisted session tokens.
//!
//! # Invariants
//! - At most one pending code per email; issuing replaces the previous one.
//! - A code is consumed by its first successful verification.
//! - A code is discarded once expired or after `MAX_FAILED_ATTEMPTS` misses.
//! - A session older than the session TTL no longer resolves and its row is
//!   deleted on the next lookup.

use super::{AuthError, AuthResult, CodeDelivery, Identity, IdentityProvider, Session};
use crate::db::{ensure_tables, now_epoch_ms};
use crate::email::normalize_email;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;
use uuid::Uuid;

/// Default lifetime of an issued code.
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(10 * 60);
/// Default maximum age of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Failed verifications tolerated before a code is discarded.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;
/// Number of digits in an issued code.
pub const ONE_TIME_CODE_DIGITS: usize = 6;

const REQUIRED_TABLES: &[&str] = &["one_time_codes", "sessions"];

/// One-time-code identity provider over the portal database.
pub struct SqliteIdentityProvider<'conn, D: CodeDelivery> {
    conn: &'conn Connection,
    delivery: D,
    code_ttl: Duration,
    session_ttl: Duration,
    session_token: Option<String>,
}

impl<'conn, D: CodeDelivery> SqliteIdentityProvider<'conn, D> {
    /// Constructs a provider from a migrated connection.
    pub fn try_new(conn: &'conn Connection, delivery: D) -> AuthResult<Self> {
        ensure_tables(conn, REQUIRED_TABLES)?;
        Ok(Self {
            conn,
            delivery,
            code_ttl: DEFAULT_CODE_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            session_token: None,
        })
    }

    /// Overrides the code lifetime.
    pub fn with_code_ttl(mut self, code_ttl: Duration) -> Self {
        self.code_ttl = code_ttl;
        self
    }

    /// Overrides the maximum session age.
    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self
    }

    /// Re-activates a previously issued session token.
    ///
    /// # Errors
    /// - `AuthError::NoSession` when the token is unknown, ended or expired.
    pub fn resume_session(&mut self, token: &str) -> AuthResult<Identity> {
        let token = token.trim();
        let identity = self.lookup_session(token)?.ok_or(AuthError::NoSession)?;
        self.session_token = Some(token.to_string());
        Ok(identity)
    }

    /// Token of the active session.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    fn lookup_session(&self, token: &str) -> AuthResult<Option<Identity>> {
        let ttl_ms = i64::try_from(self.session_ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_epoch_ms().saturating_sub(ttl_ms);
        let purged = self
            .conn
            .execute("DELETE FROM sessions WHERE created_at <= ?1;", [cutoff])?;
        if purged > 0 {
            info!("event=session_purge module=auth status=ok purged={purged}");
        }

        let email = self
            .conn
            .query_row(
                "SELECT email FROM sessions WHERE token = ?1;",
                [token],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(email.map(|email| Identity { email }))
    }

    fn discard_code(&self, email: &str) -> AuthResult<()> {
        self.conn
            .execute("DELETE FROM one_time_codes WHERE email = ?1;", [email])?;
        Ok(())
    }
}

impl<D: CodeDelivery> IdentityProvider for SqliteIdentityProvider<'_, D> {
    fn current_user(&self) -> AuthResult<Option<Identity>> {
        match self.session_token.as_deref() {
            Some(token) => self.lookup_session(token),
            None => Ok(None),
        }
    }

    fn send_one_time_code(&self, email: &str) -> AuthResult<()> {
        let email =
            normalize_email(email).ok_or_else(|| AuthError::InvalidEmail(email.to_string()))?;
        let code = generate_code();
        let ttl_ms = i64::try_from(self.code_ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_epoch_ms().saturating_add(ttl_ms);

        self.conn.execute(
            "INSERT INTO one_time_codes (email, code, expires_at, failed_attempts)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT (email) DO UPDATE SET
                code = excluded.code,
                expires_at = excluded.expires_at,
                failed_attempts = 0;",
            params![email, code, expires_at],
        )?;

        if let Err(err) = self.delivery.deliver(&email, &code) {
            self.discard_code(&email)?;
            warn!("event=otp_send module=auth status=error error_code=delivery_failed");
            return Err(AuthError::Delivery(err));
        }

        info!("event=otp_send module=auth status=ok");
        Ok(())
    }

    fn verify_one_time_code(&mut self, email: &str, code: &str) -> AuthResult<Session> {
        let email =
            normalize_email(email).ok_or_else(|| AuthError::InvalidEmail(email.to_string()))?;
        let pending = self
            .conn
            .query_row(
                "SELECT code, expires_at, failed_attempts
                 FROM one_time_codes
                 WHERE email = ?1;",
                [email.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((expected, expires_at, failed_attempts)) = pending else {
            warn!("event=otp_verify module=auth status=error error_code=no_pending_code");
            return Err(AuthError::InvalidCode);
        };

        if failed_attempts >= MAX_FAILED_ATTEMPTS {
            self.discard_code(&email)?;
            return Err(AuthError::TooManyAttempts);
        }
        if now_epoch_ms() >= expires_at {
            self.discard_code(&email)?;
            warn!("event=otp_verify module=auth status=error error_code=code_expired");
            return Err(AuthError::CodeExpired);
        }
        if code.trim() != expected {
            self.conn.execute(
                "UPDATE one_time_codes
                 SET failed_attempts = failed_attempts + 1
                 WHERE email = ?1;",
                [email.as_str()],
            )?;
            warn!(
                "event=otp_verify module=auth status=error error_code=code_mismatch attempts={}",
                failed_attempts + 1
            );
            return Err(AuthError::InvalidCode);
        }

        self.discard_code(&email)?;
        let token = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO sessions (token, email, created_at) VALUES (?1, ?2, ?3);",
            params![token, email, now_epoch_ms()],
        )?;
        self.session_token = Some(token.clone());

        info!("event=otp_verify module=auth status=ok");
        Ok(Session {
            token,
            identity: Identity { email },
        })
    }

    fn end_session(&mut self) -> AuthResult<()> {
        if let Some(token) = self.session_token.take() {
            self.conn
                .execute("DELETE FROM sessions WHERE token = ?1;", [token.as_str()])?;
            info!("event=session_end module=auth status=ok");
        }
        Ok(())
    }
}

fn generate_code() -> String {
    let modulus = 10_u128.pow(ONE_TIME_CODE_DIGITS as u32);
    let value = Uuid::new_v4().as_u128() % modulus;
    format!("{value:0width$}", width = ONE_TIME_CODE_DIGITS)
}
