use goals_portal_core::auth::MAX_FAILED_ATTEMPTS;
use goals_portal_core::db::open_db_in_memory;
use goals_portal_core::{AuthError, IdentityProvider, SessionContext, SqliteIdentityProvider};
use rusqlite::Connection;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

type Outbox = Rc<RefCell<Vec<(String, String)>>>;

fn capturing_delivery(outbox: &Outbox) -> impl Fn(&str, &str) -> Result<(), String> {
    let outbox = Rc::clone(outbox);
    move |email: &str, code: &str| -> Result<(), String> {
        outbox
            .borrow_mut()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

fn last_code(outbox: &Outbox) -> String {
    outbox.borrow().last().unwrap().1.clone()
}

fn pending_code_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM one_time_codes;", [], |row| row.get(0))
        .unwrap()
}

fn wrong_code(code: &str) -> String {
    if code == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}

#[test]
fn delivered_code_signs_the_user_in() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();
    assert_eq!(provider.current_user().unwrap(), None);

    provider.send_one_time_code("  Ada@X.org ").unwrap();
    let (recipient, code) = outbox.borrow()[0].clone();
    assert_eq!(recipient, "ada@x.org");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|ch| ch.is_ascii_digit()));

    let session = provider.verify_one_time_code("ada@x.org", &code).unwrap();
    assert_eq!(session.identity.email, "ada@x.org");
    assert_eq!(provider.session_token(), Some(session.token.as_str()));
    assert_eq!(provider.current_user().unwrap(), Some(session.identity.clone()));

    let context = SessionContext::from_provider(&provider).unwrap();
    assert_eq!(context.current_email().as_deref(), Some("ada@x.org"));
}

#[test]
fn codes_are_single_use() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();

    provider.send_one_time_code("ada@x.org").unwrap();
    let code = last_code(&outbox);
    provider.verify_one_time_code("ada@x.org", &code).unwrap();

    let err = provider.verify_one_time_code("ada@x.org", &code).unwrap_err();
    assert!(matches!(err, AuthError::InvalidCode));
    assert_eq!(pending_code_count(&conn), 0);
}

#[test]
fn wrong_code_is_rejected_but_retry_succeeds() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();

    provider.send_one_time_code("ada@x.org").unwrap();
    let code = last_code(&outbox);
    let err = provider
        .verify_one_time_code("ada@x.org", &wrong_code(&code))
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCode));
    assert_eq!(provider.current_user().unwrap(), None);

    provider.verify_one_time_code("ada@x.org", &code).unwrap();
}

#[test]
fn code_is_locked_after_repeated_failures() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();

    provider.send_one_time_code("ada@x.org").unwrap();
    let code = last_code(&outbox);
    for _ in 0..MAX_FAILED_ATTEMPTS {
        let err = provider
            .verify_one_time_code("ada@x.org", &wrong_code(&code))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode));
    }

    let err = provider.verify_one_time_code("ada@x.org", &code).unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));
    assert_eq!(pending_code_count(&conn), 0);
}

#[test]
fn expired_code_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox))
        .unwrap()
        .with_code_ttl(Duration::ZERO);

    provider.send_one_time_code("ada@x.org").unwrap();
    let code = last_code(&outbox);
    let err = provider.verify_one_time_code("ada@x.org", &code).unwrap_err();
    assert!(matches!(err, AuthError::CodeExpired));
}

#[test]
fn malformed_email_is_rejected_before_delivery() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();

    let err = provider.send_one_time_code("not an email").unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert!(outbox.borrow().is_empty());
}

#[test]
fn failed_delivery_discards_the_code() {
    let conn = open_db_in_memory().unwrap();
    let provider = SqliteIdentityProvider::try_new(
        &conn,
        |_email: &str, _code: &str| -> Result<(), String> { Err("smtp down".to_string()) },
    )
    .unwrap();

    let err = provider.send_one_time_code("ada@x.org").unwrap_err();
    assert!(matches!(err, AuthError::Delivery(message) if message == "smtp down"));
    assert_eq!(pending_code_count(&conn), 0);
}

#[test]
fn session_token_can_be_resumed_until_ended() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();
    provider.send_one_time_code("ada@x.org").unwrap();
    let session = provider
        .verify_one_time_code("ada@x.org", &last_code(&outbox))
        .unwrap();

    let mut resumed = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();
    let identity = resumed.resume_session(&session.token).unwrap();
    assert_eq!(identity.email, "ada@x.org");
    assert_eq!(resumed.current_user().unwrap(), Some(identity));

    provider.end_session().unwrap();
    provider.end_session().unwrap();
    assert_eq!(provider.current_user().unwrap(), None);
    assert_eq!(resumed.current_user().unwrap(), None);

    let mut late = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();
    assert!(matches!(
        late.resume_session(&session.token),
        Err(AuthError::NoSession)
    ));
}

#[test]
fn expired_session_no_longer_resolves_and_is_purged() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox))
        .unwrap()
        .with_session_ttl(Duration::ZERO);
    provider.send_one_time_code("ada@x.org").unwrap();
    let session = provider
        .verify_one_time_code("ada@x.org", &last_code(&outbox))
        .unwrap();

    assert_eq!(provider.current_user().unwrap(), None);
    let mut resumed = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox)).unwrap();
    assert!(matches!(
        resumed.resume_session(&session.token),
        Err(AuthError::NoSession)
    ));
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn session_within_its_lifetime_resolves() {
    let conn = open_db_in_memory().unwrap();
    let outbox = Outbox::default();
    let mut provider = SqliteIdentityProvider::try_new(&conn, capturing_delivery(&outbox))
        .unwrap()
        .with_session_ttl(Duration::from_secs(60));
    provider.send_one_time_code("ada@x.org").unwrap();
    let session = provider
        .verify_one_time_code("ada@x.org", &last_code(&outbox))
        .unwrap();

    assert_eq!(provider.current_user().unwrap(), Some(session.identity));
}
