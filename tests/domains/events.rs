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

fn create_equipment(gateway: &Gateway, code: &str) -> i64 {
    dispatch_ok(
        gateway,
        "equipment",
        "create",
        json!({"code": code, "name": format!("{} unit", code)}),
    )["id"]
        .as_i64()
        .expect("equipment id")
}

#[test]
fn create_computes_next_due_by_interval() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "CR-01");

    // Annual clock: one year out
    let annual = dispatch_ok(
        &gateway,
        "loadTests",
        "create",
        json!({"equipmentId": id, "eventDate": "2024-01-15", "outcome": "pass"}),
    );
    assert_eq!(annual["intervalType"], json!("annual"));
    assert_eq!(annual["nextDue"], json!("2025-01-15"));
    assert_eq!(annual["assetClass"], json!("load_test"));

    // Periodic clock: six months, clamped to month end
    let periodic = dispatch_ok(
        &gateway,
        "calibrations",
        "create",
        json!({"equipmentId": id, "eventDate": "2024-08-31", "intervalType": "periodic"}),
    );
    assert_eq!(periodic["nextDue"], json!("2025-02-28"));

    // Leap-day annual clock clamps as well
    let leap = dispatch_ok(
        &gateway,
        "inspections",
        "create",
        json!({"equipmentId": id, "eventDate": "2024-02-29"}),
    );
    assert_eq!(leap["nextDue"], json!("2025-02-28"));
}

#[test]
fn explicit_next_due_override_wins() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "CR-02");

    let value = dispatch_ok(
        &gateway,
        "loadTests",
        "create",
        json!({
            "equipmentId": id,
            "eventDate": "2024-01-15",
            "nextDue": "2024-07-01"
        }),
    );
    assert_eq!(value["nextDue"], json!("2024-07-01"));
}

#[test]
fn next_due_before_event_date_is_rejected() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "CR-03");

    let res = dispatch(
        &gateway,
        "loadTests",
        "create",
        json!({
            "equipmentId": id,
            "eventDate": "2024-01-15",
            "nextDue": "2024-01-14"
        }),
    );
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ConstraintViolation"));
    assert!(res.message.expect("message").contains("nextDue"));

    // Same day is allowed
    let res = dispatch(
        &gateway,
        "loadTests",
        "create",
        json!({
            "equipmentId": id,
            "eventDate": "2024-01-15",
            "nextDue": "2024-01-15"
        }),
    );
    assert!(res.ok);
}

#[test]
fn unknown_certificate_reference_is_rejected() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "CR-04");

    let res = dispatch(
        &gateway,
        "loadTests",
        "create",
        json!({"equipmentId": id, "eventDate": "2024-01-15", "certificateId": 42}),
    );
    assert!(!res.ok);
    assert_eq!(res.error_kind.as_deref(), Some("ConstraintViolation"));
    assert!(res.message.expect("message").contains("certificate"));
}

#[test]
fn due_window_is_inclusive_on_both_edges() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "CR-05");

    for next_due in ["2024-06-14", "2024-06-15", "2024-07-15", "2024-07-16"] {
        dispatch_ok(
            &gateway,
            "loadTests",
            "create",
            json!({"equipmentId": id, "eventDate": "2024-01-01", "nextDue": next_due}),
        );
    }

    // Default threshold: asOf plus thirty days
    let due = dispatch_ok(
        &gateway,
        "loadTests",
        "getDue",
        json!({"asOf": "2024-06-15"}),
    );
    let dates: Vec<&str> = due
        .as_array()
        .expect("array")
        .iter()
        .map(|e| e["nextDue"].as_str().expect("nextDue"))
        .collect();
    assert_eq!(dates, vec!["2024-07-15", "2024-06-15"]);

    // Explicit threshold widens the window
    let due = dispatch_ok(
        &gateway,
        "loadTests",
        "getDue",
        json!({"asOf": "2024-06-15", "threshold": "2024-07-16"}),
    );
    assert_eq!(due.as_array().expect("array").len(), 3);
}

#[test]
fn overdue_is_strictly_before_as_of() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "CR-06");

    for next_due in ["2024-06-14", "2024-06-15"] {
        dispatch_ok(
            &gateway,
            "calibrations",
            "create",
            json!({"equipmentId": id, "eventDate": "2024-01-01", "nextDue": next_due}),
        );
    }

    let overdue = dispatch_ok(
        &gateway,
        "calibrations",
        "getOverdue",
        json!({"asOf": "2024-06-15"}),
    );
    let overdue = overdue.as_array().expect("array");
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["nextDue"], json!("2024-06-14"));
}

#[test]
fn classes_do_not_bleed_into_each_other() {
    let (_tmp, gateway) = scratch();
    let first = create_equipment(&gateway, "CR-07");
    let second = create_equipment(&gateway, "CR-08");

    dispatch_ok(
        &gateway,
        "loadTests",
        "create",
        json!({"equipmentId": first, "eventDate": "2024-01-15"}),
    );
    dispatch_ok(
        &gateway,
        "calibrations",
        "create",
        json!({"equipmentId": first, "eventDate": "2024-02-01"}),
    );
    dispatch_ok(
        &gateway,
        "loadTests",
        "create",
        json!({"equipmentId": second, "eventDate": "2024-03-01"}),
    );

    let of_first = dispatch_ok(
        &gateway,
        "loadTests",
        "getByEquipmentId",
        json!({"equipmentId": first}),
    );
    let of_first = of_first.as_array().expect("array");
    assert_eq!(of_first.len(), 1);
    assert_eq!(of_first[0]["assetClass"], json!("load_test"));
    assert_eq!(of_first[0]["equipmentId"], json!(first));

    let all_load_tests = dispatch_ok(&gateway, "loadTests", "getAll", json!({}));
    assert_eq!(all_load_tests.as_array().expect("array").len(), 2);

    let all_calibrations = dispatch_ok(&gateway, "calibrations", "getAll", json!({}));
    assert_eq!(all_calibrations.as_array().expect("array").len(), 1);
}

#[test]
fn event_rows_carry_the_inspection_detail() {
    let (_tmp, gateway) = scratch();
    let id = create_equipment(&gateway, "PV-01");

    let value = dispatch_ok(
        &gateway,
        "inspections",
        "create",
        json!({
            "equipmentId": id,
            "eventDate": "2024-04-02",
            "outcome": "fail",
            "inspector": "J. Mercer",
            "deficiencies": "Relief valve seized",
            "correctiveAction": "Replace valve, retest"
        }),
    );
    assert_eq!(value["outcome"], json!("fail"));
    assert_eq!(value["inspector"], json!("J. Mercer"));
    assert_eq!(value["deficiencies"], json!("Relief valve seized"));
    assert_eq!(value["correctiveAction"], json!("Replace valve, retest"));
    assert_eq!(value["certificateId"], Value::Null);
}
