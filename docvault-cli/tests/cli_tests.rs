// End-to-end tests driving the docvault binary as a separate process
use docvault_core::{FileLock, Store};
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn docvault(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docvault"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("DOCVAULT_DATA_DIR")
        .env_remove("DOCVAULT_LOCK_TIMEOUT_MS")
        .env_remove("DOCVAULT_POLL_INTERVAL_MS")
        .env_remove("DOCVAULT_DECODE_POLICY")
        .output()
        .expect("failed to run docvault")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "docvault failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_crud_through_cli() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path();

    let inserted = stdout_json(&docvault(
        data,
        &["insert", "inventory", r#"{"name": "Oki", "quantity": 4}"#],
    ));
    let id = inserted["id"].as_str().unwrap().to_string();

    let updated = stdout_json(&docvault(data, &["set", "inventory", &id, "quantity", "9"]));
    assert_eq!(updated["quantity"], 9);

    let fetched = stdout_json(&docvault(data, &["get", "inventory", &id]));
    assert_eq!(fetched["name"], "Oki");

    let listed = stdout_json(&docvault(data, &["list", "inventory"]));
    assert_eq!(listed.as_array().unwrap().len(), 1);

    stdout_json(&docvault(data, &["remove", "inventory", &id]));
    let listed = stdout_json(&docvault(data, &["list", "inventory"]));
    assert!(listed.as_array().unwrap().is_empty());
}

#[test]
fn test_duplicate_insert_fails() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path();

    stdout_json(&docvault(data, &["insert", "patients", r#"{"id": "p1"}"#]));
    let output = docvault(data, &["insert", "patients", r#"{"id": "p1"}"#]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn test_set_refuses_id_change() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path();

    stdout_json(&docvault(data, &["insert", "patients", r#"{"id": "p1"}"#]));
    let output = docvault(data, &["set", "patients", "p1", "id", "p2"]);
    assert!(!output.status.success());
}

#[test]
fn test_lock_held_by_other_process_times_out() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path();
    let store = Store::open_dir(data).unwrap();
    let inventory = store.collection("inventory").unwrap();

    let _held = FileLock::acquire(inventory.path(), Duration::from_secs(1), Duration::from_millis(5))
        .unwrap();

    let started = Instant::now();
    let output = docvault(data, &["--lock-timeout-ms", "200", "list", "inventory"]);
    let elapsed = started.elapsed();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Timed out"));
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
}

#[test]
fn test_document_commands() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path();

    let empty = stdout_json(&docvault(data, &["doc-get", "doctor_info"]));
    assert!(empty.as_object().unwrap().is_empty());

    let output = docvault(data, &["doc-set", "doctor_info", r#"{"name": "Dr. Rossi"}"#]);
    assert!(output.status.success());

    let doc = stdout_json(&docvault(data, &["doc-get", "doctor_info"]));
    assert_eq!(doc["name"], "Dr. Rossi");
}

#[test]
fn test_export_then_import() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let dump = source.path().join("dump.json");
    let data = source.path().join("data");

    stdout_json(&docvault(&data, &["insert", "patients", r#"{"id": "p1", "name": "Zoë"}"#]));
    stdout_json(&docvault(&data, &["insert", "patients", r#"{"id": "p2"}"#]));
    assert!(docvault(&data, &["doc-set", "doctor_info", r#"{"name": "Dr. Rossi"}"#])
        .status
        .success());

    let output = docvault(&data, &["export", dump.to_str().unwrap()]);
    assert!(output.status.success());

    let output = docvault(target.path(), &["import", dump.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let listed = stdout_json(&docvault(target.path(), &["list", "patients"]));
    assert_eq!(listed[0]["name"], "Zoë");
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let doc = stdout_json(&docvault(target.path(), &["doc-get", "doctor_info"]));
    assert_eq!(doc["name"], "Dr. Rossi");
}

#[test]
fn test_new_id_needs_no_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("never-created");

    let output = docvault(&missing, &["new-id"]);
    assert!(output.status.success());
    assert!(!missing.exists());
    let id = String::from_utf8(output.stdout).unwrap();
    assert!(id.trim().contains('.'));
}

#[test]
fn test_import_with_duplicate_leaves_collection_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    let dump = temp_dir.path().join("dump.json");

    stdout_json(&docvault(&data, &["insert", "patients", r#"{"id": "p2"}"#]));
    std::fs::write(
        &dump,
        r#"{"patients": [{"id": "p1"}, {"id": "p2"}, {"id": "p3"}]}"#,
    )
    .unwrap();

    let output = docvault(&data, &["import", dump.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));

    let listed = stdout_json(&docvault(&data, &["list", "patients"]));
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["p2"]);
}

#[test]
fn test_import_rejects_duplicates_within_dump() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    let dump = temp_dir.path().join("dump.json");
    std::fs::write(&dump, r#"{"inventory": [{"id": "m1"}, {"id": "m1"}]}"#).unwrap();

    let output = docvault(&data, &["import", dump.to_str().unwrap()]);
    assert!(!output.status.success());

    let listed = stdout_json(&docvault(&data, &["list", "inventory"]));
    assert!(listed.as_array().unwrap().is_empty());
}

#[test]
fn test_export_waits_for_file_lock() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    let dump = temp_dir.path().join("dump.json");

    stdout_json(&docvault(&data, &["insert", "patients", r#"{"id": "p1"}"#]));
    let store = Store::open_dir(&data).unwrap();
    let patients = store.collection("patients").unwrap();
    let held = FileLock::acquire(patients.path(), Duration::from_secs(1), Duration::from_millis(5))
        .unwrap();

    let output = docvault(
        &data,
        &["--lock-timeout-ms", "200", "export", dump.to_str().unwrap()],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Timed out"));
    assert!(!dump.exists());

    held.release().unwrap();
    let output = docvault(&data, &["export", dump.to_str().unwrap()]);
    assert!(output.status.success());
    let exported: Value = serde_json::from_slice(&std::fs::read(&dump).unwrap()).unwrap();
    assert_eq!(exported["patients"][0]["id"], "p1");
}
