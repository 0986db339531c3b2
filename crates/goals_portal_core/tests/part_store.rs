use goals_portal_core::db::open_db_in_memory;
use goals_portal_core::{
    PartFields, PartName, PartRecord, PartRepository, PartValidationError, RepoError,
    RosterPair, RosterRepository, SqliteStore,
};
use rusqlite::Connection;

fn seed_pair(store: &SqliteStore<'_>) {
    store
        .insert_pair(&RosterPair {
            pair_id: "P1".to_string(),
            school_name: "North Elementary".to_string(),
            educator_email: "A@X.org".to_string(),
            educator_name: "Ada".to_string(),
            evaluator_email: "eval@x.org".to_string(),
            evaluator_name: "Eve".to_string(),
            resolution_email: "res@x.org".to_string(),
            resolution_name: "Rex".to_string(),
        })
        .unwrap();
}

fn part1_record(statement: &str) -> PartRecord {
    let mut record = PartRecord::empty("P1", PartName::Part1);
    record.fields.goals[0].goal_statement = Some(statement.to_string());
    record
}

fn part_row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM parts;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn insert_pair_normalizes_role_emails_and_rejects_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);

    let pair = store.get_pair("P1").unwrap().unwrap();
    assert_eq!(pair.educator_email, "a@x.org");

    let err = store
        .insert_pair(&RosterPair {
            pair_id: "P1".to_string(),
            ..RosterPair::default()
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicatePair(id) if id == "P1"));
}

#[test]
fn insert_pair_rejects_malformed_email() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let err = store
        .insert_pair(&RosterPair {
            pair_id: "P2".to_string(),
            evaluator_email: "not-an-email".to_string(),
            ..RosterPair::default()
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("evaluator_email")));
}

#[test]
fn upserting_twice_keeps_one_row_and_last_write_wins() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);

    store.upsert_part("a@x.org", &part1_record("first")).unwrap();
    store.upsert_part("a@x.org", &part1_record("second")).unwrap();

    assert_eq!(part_row_count(&conn), 1);
    let loaded = store
        .get_part("a@x.org", "P1", PartName::Part1)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.fields.goals[0].goal_statement.as_deref(), Some("second"));
    assert_eq!(loaded.updated_by.as_deref(), Some("a@x.org"));
    assert!(loaded.is_persisted());
}

#[test]
fn upsert_by_wrong_role_is_denied() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);

    let err = store
        .upsert_part("eval@x.org", &part1_record("not mine"))
        .unwrap_err();
    assert!(matches!(err, RepoError::PermissionDenied { .. }));
    assert_eq!(part_row_count(&conn), 0);
}

#[test]
fn upsert_matches_role_email_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);

    let written = store
        .upsert_part(" A@x.ORG ", &part1_record("mine"))
        .unwrap();
    assert_eq!(written.updated_by.as_deref(), Some("a@x.org"));
}

#[test]
fn upsert_for_unknown_pair_fails() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let mut record = part1_record("orphan");
    record.pair_id = "missing".to_string();

    let err = store.upsert_part("a@x.org", &record).unwrap_err();
    assert!(matches!(err, RepoError::PairNotFound(id) if id == "missing"));
}

#[test]
fn upsert_rejects_fields_of_other_parts() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);

    let mut record = PartRecord::empty("P1", PartName::Part2);
    record.fields.resolution_decision = Some("uphold".to_string());
    let err = store.upsert_part("eval@x.org", &record).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(PartValidationError::FieldNotInPart { .. })
    ));
}

#[test]
fn upsert_normalizes_text_server_side() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);

    let mut record = PartRecord::empty("P1", PartName::Part3);
    record.fields = PartFields {
        resolution_decision: Some("  uphold goals  ".to_string()),
        resolution_rationale: Some("   ".to_string()),
        ..PartFields::default()
    };
    store.upsert_part("res@x.org", &record).unwrap();

    let loaded = store
        .get_part("res@x.org", "P1", PartName::Part3)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.fields.resolution_decision.as_deref(), Some("uphold goals"));
    assert_eq!(loaded.fields.resolution_rationale, None);
}

#[test]
fn reads_of_missing_rows_and_hidden_pairs_are_absent() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);
    store.upsert_part("a@x.org", &part1_record("goal")).unwrap();

    assert!(store
        .get_part("eval@x.org", "P1", PartName::Part2)
        .unwrap()
        .is_none());
    assert!(store
        .get_part("eval@x.org", "P1", PartName::Part1)
        .unwrap()
        .is_some());
    assert!(store
        .get_part("stranger@x.org", "P1", PartName::Part1)
        .unwrap()
        .is_none());
}

#[test]
fn visible_pairs_follow_role_membership_and_admin_grants() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    seed_pair(&store);
    store
        .insert_pair(&RosterPair {
            pair_id: "P0".to_string(),
            educator_email: "other@x.org".to_string(),
            evaluator_email: "eval@x.org".to_string(),
            ..RosterPair::default()
        })
        .unwrap();

    let ids = |viewer: &str| {
        store
            .list_visible_pairs(viewer)
            .unwrap()
            .into_iter()
            .map(|pair| pair.pair_id)
            .collect::<Vec<_>>()
    };
    assert_eq!(ids("EVAL@x.org"), vec!["P0", "P1"]);
    assert_eq!(ids("a@x.org"), vec!["P1"]);
    assert!(ids("boss@x.org").is_empty());

    store.grant_admin("Boss@X.org").unwrap();
    store.grant_admin("boss@x.org").unwrap();
    assert!(store.is_admin("boss@x.org").unwrap());
    assert_eq!(ids("boss@x.org"), vec!["P0", "P1"]);
    assert!(store
        .get_part("boss@x.org", "P1", PartName::Part1)
        .unwrap()
        .is_none());
}
