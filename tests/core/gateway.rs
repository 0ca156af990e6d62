use gantry::core::audit;
use gantry::core::config;
use gantry::core::db;
use gantry::core::gateway::{Gateway, Request};
use gantry::core::store::Store;
use rusqlite::Connection;
use serde_json::{Value, json};
use std::sync::{Arc, Barrier};
use tempfile::tempdir;

fn scratch() -> (tempfile::TempDir, Gateway) {
    let tmp = tempdir().expect("tempdir");
    let store = Store::init(tmp.path()).expect("store init");
    let cfg = config::load_config(&store).expect("config");
    db::initialize_compliance_db(&store.data_root(), &cfg.database).expect("db init");
    let gateway = Gateway::open(store).expect("gateway");
    (tmp, gateway)
}

fn open_conn(gateway: &Gateway) -> Connection {
    db::db_connect(&gateway.config().db_path(gateway.store())).expect("db connect")
}

fn dispatch(gateway: &Gateway, domain: &str, action: &str, params: Value) -> gantry::core::gateway::Response {
    gateway.dispatch(&Request::new(domain, action, params))
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("count")
}

#[test]
fn unknown_operation_touches_nothing() {
    let (_tmp, gateway) = scratch();

    let res = dispatch(&gateway, "equipment", "explode", json!({}));
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("UnknownOperation"));

    let res = dispatch(&gateway, "ghosts", "getAll", json!({}));
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("UnknownOperation"));

    let conn = open_conn(&gateway);
    assert_eq!(count_rows(&conn, "equipment"), 0);
    assert_eq!(audit::entry_count(&conn).expect("audit count"), 0);
}

#[test]
fn invalid_params_never_reach_the_handler() {
    let (_tmp, gateway) = scratch();

    // Both required fields missing
    let res = dispatch(&gateway, "equipment", "create", json!({"category": "crane"}));
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ValidationFailed"));
    let fields = res.fields.expect("fields");
    let names: Vec<&str> = fields
        .iter()
        .map(|f| f["field"].as_str().expect("field name"))
        .collect();
    assert!(names.contains(&"code"));
    assert!(names.contains(&"name"));

    let conn = open_conn(&gateway);
    assert_eq!(count_rows(&conn, "equipment"), 0);
    assert_eq!(audit::entry_count(&conn).expect("audit count"), 0);
}

#[test]
fn validation_collects_every_failure_at_once() {
    let (_tmp, gateway) = scratch();

    let res = dispatch(
        &gateway,
        "loadTests",
        "create",
        json!({
            "equipmentId": "not-a-number",
            "eventDate": "2024-13-40",
            "outcome": "maybe"
        }),
    );
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ValidationFailed"));

    let fields = res.fields.expect("fields");
    assert_eq!(fields.len(), 3);
    let reasons: Vec<(&str, &str)> = fields
        .iter()
        .map(|f| {
            (
                f["field"].as_str().expect("field"),
                f["reason"].as_str().expect("reason"),
            )
        })
        .collect();
    assert!(reasons.contains(&("equipmentId", "invalid-id")));
    assert!(reasons.contains(&("eventDate", "invalid-date")));
    assert!(reasons.contains(&("outcome", "not-one-of")));
}

#[test]
fn params_must_be_a_json_object() {
    let (_tmp, gateway) = scratch();

    let res = dispatch(&gateway, "equipment", "getAll", json!([1, 2, 3]));
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ValidationFailed"));
    let fields = res.fields.expect("fields");
    assert_eq!(fields[0]["field"].as_str(), Some("params"));
}

#[test]
fn successful_mutation_writes_exactly_one_audit_entry() {
    let (_tmp, gateway) = scratch();

    let request = Request::new(
        "equipment",
        "create",
        json!({"code": "CR-01", "name": "Bay 1 crane", "category": "crane"}),
    )
    .with_actor(Some(7), "inspector.diaz");
    let res = gateway.dispatch(&request);
    assert!(res.ok, "create failed: {:?}", res.message);
    let value = res.value.expect("value");
    let id = value["id"].as_i64().expect("id");

    let conn = open_conn(&gateway);
    assert_eq!(audit::entry_count(&conn).expect("audit count"), 1);

    let entries = audit::recent_entries(&conn, 10).expect("entries");
    let entry = &entries[0];
    assert_eq!(entry.action, "equipment.create");
    assert_eq!(entry.entity_type, "equipment");
    assert_eq!(entry.entity_id, id);
    assert_eq!(entry.user_id, Some(7));
    assert_eq!(entry.username, "inspector.diaz");
    assert_eq!(entry.dispatch_id, request.id);
    assert!(entry.old_values.is_none());
    // The recorded after-image is the same document the caller received
    assert_eq!(entry.new_values.as_ref(), Some(&value));
}

#[test]
fn actor_defaults_to_system() {
    let (_tmp, gateway) = scratch();

    let res = dispatch(
        &gateway,
        "equipment",
        "create",
        json!({"code": "H-09", "name": "Chain hoist"}),
    );
    assert!(res.ok);

    let conn = open_conn(&gateway);
    let entries = audit::recent_entries(&conn, 1).expect("entries");
    assert_eq!(entries[0].username, "system");
    assert_eq!(entries[0].user_id, None);
}

#[test]
fn audit_write_failure_rolls_back_the_mutation() {
    let (_tmp, gateway) = scratch();

    {
        let conn = open_conn(&gateway);
        conn.execute("ALTER TABLE audit_log RENAME TO audit_log_retired", [])
            .expect("rename audit table");
    }

    let res = dispatch(
        &gateway,
        "equipment",
        "create",
        json!({"code": "CR-02", "name": "Bay 2 crane"}),
    );
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("AuditWriteFailed"));

    // The equipment insert happened inside the same transaction; it must
    // not have survived the failed trail write.
    let conn = open_conn(&gateway);
    assert_eq!(count_rows(&conn, "equipment"), 0);
    assert_eq!(count_rows(&conn, "audit_log_retired"), 0);
}

#[test]
fn missing_relation_maps_to_constraint_violation() {
    let (_tmp, gateway) = scratch();

    let res = dispatch(
        &gateway,
        "loadTests",
        "create",
        json!({"equipmentId": 999, "eventDate": "2024-01-15"}),
    );
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ConstraintViolation"));
    assert!(res.message.expect("message").contains("equipment"));

    let conn = open_conn(&gateway);
    assert_eq!(count_rows(&conn, "compliance_events"), 0);
    assert_eq!(audit::entry_count(&conn).expect("audit count"), 0);
}

#[test]
fn backend_unavailable_when_store_uninitialized() {
    let tmp = tempdir().expect("tempdir");
    let store = Store::init(tmp.path()).expect("store init");
    // No compliance db created
    let gateway = Gateway::open(store).expect("gateway");

    let res = dispatch(&gateway, "equipment", "getAll", json!({}));
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("BackendUnavailable"));
}

#[test]
fn request_envelope_round_trips_from_json() {
    let (_tmp, gateway) = scratch();

    let raw = r#"{
        "domain": "equipment",
        "action": "create",
        "params": {"code": "WN-04", "name": "Deck winch"},
        "actor": {"userId": 3, "username": "rigger.okafor"},
        "client": {"ip": "10.0.4.7"},
        "id": "01JC0000000000000000000000"
    }"#;
    let request: Request = serde_json::from_str(raw).expect("request parse");
    let res = gateway.dispatch(&request);
    assert!(res.ok);
    assert_eq!(res.id, "01JC0000000000000000000000");

    let conn = open_conn(&gateway);
    let entries = audit::recent_entries(&conn, 1).expect("entries");
    assert_eq!(entries[0].dispatch_id, "01JC0000000000000000000000");
    assert_eq!(entries[0].client_meta, Some(json!({"ip": "10.0.4.7"})));
}

#[test]
fn response_envelope_serializes_without_empty_keys() {
    let (_tmp, gateway) = scratch();

    let ok = dispatch(&gateway, "equipment", "getAll", json!({}));
    let ok_json = serde_json::to_value(&ok).expect("serialize");
    assert_eq!(ok_json["ok"], json!(true));
    assert!(ok_json.get("errorKind").is_none());
    assert!(ok_json.get("fields").is_none());

    let err = dispatch(&gateway, "equipment", "vanish", json!({}));
    let err_json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(err_json["ok"], json!(false));
    assert_eq!(err_json["errorKind"], json!("UnknownOperation"));
    assert!(err_json.get("value").is_none());
}

#[test]
fn concurrent_mutations_serialize_on_the_write_lock() {
    let (_tmp, gateway) = scratch();
    let gateway = Arc::new(gateway);
    let barrier = Arc::new(Barrier::new(4));

    let mut handles = Vec::new();
    for i in 0..4 {
        let gw = Arc::clone(&gateway);
        let gate = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            gate.wait();
            gw.dispatch(&Request::new(
                "equipment",
                "create",
                json!({"code": format!("CC-{:02}", i), "name": format!("Crane {}", i)}),
            ))
        }));
    }
    for handle in handles {
        let res = handle.join().expect("thread");
        assert!(res.ok, "concurrent create failed: {:?}", res.message);
    }

    let conn = open_conn(&gateway);
    assert_eq!(count_rows(&conn, "equipment"), 4);
    assert_eq!(audit::entry_count(&conn).expect("audit count"), 4);
}
