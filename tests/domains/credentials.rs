use gantry::core::config;
use gantry::core::db;
use gantry::core::gateway::{Gateway, Request, Response};
use gantry::core::store::Store;
use serde_json::{Value, json};
use tempfile::tempdir;

fn scratch() -> (tempfile::TempDir, Gateway) {
    let tmp = tempdir().expect("tempdir");
    let store = Store::init(tmp.path()).expect("store init");
    let cfg = config::load_config(&store).expect("config");
    db::initialize_compliance_db(&store.data_root(), &cfg.database).expect("db init");
    let gateway = Gateway::open(store).expect("gateway");
    (tmp, gateway)
}

fn dispatch(gateway: &Gateway, domain: &str, action: &str, params: Value) -> Response {
    gateway.dispatch(&Request::new(domain, action, params))
}

fn dispatch_ok(gateway: &Gateway, domain: &str, action: &str, params: Value) -> Value {
    let res = dispatch(gateway, domain, action, params);
    assert!(res.ok, "{} {} failed: {:?}", domain, action, res.message);
    res.value.expect("value")
}

fn add_credential(gateway: &Gateway, holder: &str, expiration: Option<&str>) {
    let mut params = json!({"holder": holder, "credentialType": "Crane Operator"});
    if let Some(date) = expiration {
        params["expirationDate"] = json!(date);
    }
    dispatch_ok(gateway, "credentials", "create", params);
}

#[test]
fn holder_and_type_are_required() {
    let (_tmp, gateway) = scratch();

    let res = dispatch(&gateway, "credentials", "create", json!({}));
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ValidationFailed"));
    let fields = res.fields.expect("fields");
    let names: Vec<&str> = fields
        .iter()
        .map(|f| f["field"].as_str().expect("field"))
        .collect();
    assert!(names.contains(&"holder"));
    assert!(names.contains(&"credentialType"));
}

#[test]
fn expiring_window_is_inclusive_and_skips_undated() {
    let (_tmp, gateway) = scratch();

    add_credential(&gateway, "On the edge", Some("2024-06-15"));
    add_credential(&gateway, "Mid window", Some("2024-06-25"));
    add_credential(&gateway, "Last day", Some("2024-07-15"));
    add_credential(&gateway, "Beyond", Some("2024-07-16"));
    add_credential(&gateway, "Already lapsed", Some("2024-06-14"));
    add_credential(&gateway, "Never expires", None);

    let expiring = dispatch_ok(
        &gateway,
        "credentials",
        "getExpiring",
        json!({"asOf": "2024-06-15"}),
    );
    let holders: Vec<&str> = expiring
        .as_array()
        .expect("array")
        .iter()
        .map(|c| c["holder"].as_str().expect("holder"))
        .collect();
    assert_eq!(holders, vec!["On the edge", "Mid window", "Last day"]);
}

#[test]
fn get_all_lists_by_holder() {
    let (_tmp, gateway) = scratch();

    add_credential(&gateway, "Zhou Wei", Some("2025-01-01"));
    add_credential(&gateway, "Ada Okafor", None);

    let all = dispatch_ok(&gateway, "credentials", "getAll", json!({}));
    let all = all.as_array().expect("array");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["holder"], json!("Ada Okafor"));
    assert_eq!(all[0]["expirationDate"], Value::Null);
    assert_eq!(all[1]["holder"], json!("Zhou Wei"));
    assert_eq!(all[1]["credentialType"], json!("Crane Operator"));
}

#[test]
fn create_writes_a_trail_entry() {
    let (_tmp, gateway) = scratch();

    let request = Request::new(
        "credentials",
        "create",
        json!({"holder": "Ray Ortiz", "credentialType": "Rigger", "expirationDate": "2025-06-01"}),
    )
    .with_actor(Some(2), "hr.admin");
    let res = gateway.dispatch(&request);
    assert!(res.ok);
    let id = res.value.expect("value")["id"].as_i64().expect("id");

    let conn = db::db_connect(&gateway.config().db_path(gateway.store())).expect("db connect");
    let entries = gantry::core::audit::recent_entries(&conn, 1).expect("entries");
    assert_eq!(entries[0].action, "credentials.create");
    assert_eq!(entries[0].entity_type, "credential");
    assert_eq!(entries[0].entity_id, id);
    assert_eq!(entries[0].username, "hr.admin");
}
