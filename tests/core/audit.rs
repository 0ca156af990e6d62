use gantry::core::audit::{self, Actor, AuditDraft};
use gantry::core::db;
use gantry::core::schemas;
use rusqlite::Connection;
use serde_json::{Value, json};
use tempfile::tempdir;

fn scratch_conn() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join(schemas::COMPLIANCE_DB_NAME);
    let conn = db::db_connect(&db_path).expect("db connect");
    schemas::ensure_schema(&conn).expect("schema");
    (tmp, conn)
}

fn draft(action: &str, entity_id: i64) -> AuditDraft {
    AuditDraft {
        action: action.to_string(),
        entity_type: "equipment".to_string(),
        entity_id,
        old_values: None,
        new_values: Some(json!({"id": entity_id})),
    }
}

#[test]
fn append_round_trips_the_full_entry() {
    let (_tmp, conn) = scratch_conn();

    let actor = Actor::named(Some(7), "inspector.diaz");
    let meta = json!({"ip": "10.0.4.7", "window": "wnd-2"});
    let entry_id = audit::append_entry(
        &conn,
        "01JC0000000000000000000000",
        &actor,
        Some(&meta),
        &AuditDraft {
            action: "equipment.update".to_string(),
            entity_type: "equipment".to_string(),
            entity_id: 12,
            old_values: Some(json!({"location": "Bay 1"})),
            new_values: Some(json!({"location": "Bay 4"})),
        },
    )
    .expect("append");
    assert_eq!(entry_id.len(), 26);

    let entries = audit::recent_entries(&conn, 10).expect("entries");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.entry_id, entry_id);
    assert_eq!(entry.dispatch_id, "01JC0000000000000000000000");
    assert_eq!(entry.user_id, Some(7));
    assert_eq!(entry.username, "inspector.diaz");
    assert_eq!(entry.action, "equipment.update");
    assert_eq!(entry.entity_type, "equipment");
    assert_eq!(entry.entity_id, 12);
    assert_eq!(entry.old_values, Some(json!({"location": "Bay 1"})));
    assert_eq!(entry.new_values, Some(json!({"location": "Bay 4"})));
    assert_eq!(entry.client_meta, Some(meta));
    assert!(entry.ts.ends_with('Z'));
}

#[test]
fn recent_entries_newest_first_and_limited() {
    let (_tmp, conn) = scratch_conn();

    let actor = Actor::system();
    for i in 1..=3 {
        audit::append_entry(&conn, "d-1", &actor, None, &draft(&format!("step.{}", i), i))
            .expect("append");
    }

    assert_eq!(audit::entry_count(&conn).expect("count"), 3);

    let entries = audit::recent_entries(&conn, 2).expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "step.3");
    assert_eq!(entries[1].action, "step.2");
}

#[test]
fn system_actor_has_no_user_id() {
    let (_tmp, conn) = scratch_conn();

    audit::append_entry(&conn, "d-1", &Actor::system(), None, &draft("equipment.create", 1))
        .expect("append");

    let entries = audit::recent_entries(&conn, 1).expect("entries");
    assert_eq!(entries[0].username, "system");
    assert_eq!(entries[0].user_id, None);
    assert!(entries[0].client_meta.is_none());
}

#[test]
fn unparseable_stored_values_surface_as_strings() {
    let (_tmp, conn) = scratch_conn();

    audit::append_entry(&conn, "d-1", &Actor::system(), None, &draft("equipment.create", 1))
        .expect("append");
    conn.execute("UPDATE audit_log SET old_values = 'not json at all'", [])
        .expect("mangle");

    let entries = audit::recent_entries(&conn, 1).expect("entries");
    assert_eq!(
        entries[0].old_values,
        Some(Value::String("not json at all".to_string()))
    );
}

#[test]
fn wire_serialization_uses_camel_case() {
    let (_tmp, conn) = scratch_conn();

    audit::append_entry(&conn, "d-9", &Actor::named(None, "ops"), None, &draft("equipment.delete", 4))
        .expect("append");

    let entries = audit::recent_entries(&conn, 1).expect("entries");
    let wire = serde_json::to_value(&entries[0]).expect("serialize");
    assert!(wire.get("entryId").is_some());
    assert!(wire.get("dispatchId").is_some());
    assert!(wire.get("entityType").is_some());
    assert!(wire.get("timestamp").is_some());
    assert!(wire.get("entry_id").is_none());
}
