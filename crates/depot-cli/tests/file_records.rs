//! CLI integration tests for record commands against a file backend.

mod common;

use serde_json::json;
use tempfile::TempDir;

use common::{
    backend_url, json_lines, next_cursor, run_cli, run_cli_default_backend, run_cli_success,
};

struct Env {
    _dir: TempDir,
    home: std::path::PathBuf,
    backend: String,
}

fn setup() -> Env {
    let dir = TempDir::new().unwrap();
    let home = dir.path().join("home");
    std::fs::create_dir_all(&home).unwrap();
    let backend = backend_url(&dir.path().join("depot"));
    Env {
        _dir: dir,
        home,
        backend,
    }
}

impl Env {
    fn ok(&self, args: &[&str]) -> String {
        run_cli_success(args, &self.home, &self.backend)
    }

    fn run(&self, args: &[&str]) -> std::process::Output {
        run_cli(args, &self.home, &self.backend)
    }
}

#[test]
fn test_create_get_delete() {
    let env = setup();

    let created = env.ok(&["records", "create", r#"{"id": "user:1", "name": "Ada"}"#]);
    assert_eq!(json_lines(&created), vec![json!({"id": "user:1", "name": "Ada"})]);

    let fetched = env.ok(&["records", "get", "user:1"]);
    assert_eq!(json_lines(&fetched), vec![json!({"id": "user:1", "name": "Ada"})]);

    let deleted = env.ok(&["records", "delete", "user:1"]);
    assert!(deleted.contains("Deleted record user:1"));

    let output = env.run(&["records", "get", "user:1"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_create_existing_fails() {
    let env = setup();
    env.ok(&["records", "create", r#"{"id": "r"}"#]);

    let output = env.run(&["records", "create", r#"{"id": "r"}"#]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to create record"));
}

#[test]
fn test_update_and_upsert_merge_fields() {
    let env = setup();

    let output = env.run(&["records", "update", r#"{"id": "r", "a": 1}"#]);
    assert!(!output.status.success());

    env.ok(&["records", "upsert", r#"{"id": "r", "a": 1}"#]);
    let merged = env.ok(&["records", "update", r#"{"id": "r", "b": "two"}"#]);
    assert_eq!(json_lines(&merged), vec![json!({"id": "r", "a": 1, "b": "two"})]);
}

#[test]
fn test_get_many_prints_null_for_missing() {
    let env = setup();
    env.ok(&["records", "create", r#"{"id": "b"}"#]);

    let stdout = env.ok(&["records", "get-many", "a", "b"]);
    assert_eq!(json_lines(&stdout), vec![json!(null), json!({"id": "b"})]);
}

#[test]
fn test_list_follows_cursors() {
    let env = setup();
    for i in 0..5 {
        env.ok(&["records", "create", &format!(r#"{{"id": "k{}"}}"#, i)]);
    }

    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut args = vec!["records", "list", "--limit", "2"];
        if let Some(c) = &cursor {
            args.push("--cursor");
            args.push(c);
        }
        let output = env.run(&args);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        for record in json_lines(&stdout) {
            ids.push(record["id"].as_str().unwrap().to_string());
        }

        match next_cursor(&String::from_utf8_lossy(&output.stderr)) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(ids, vec!["k0", "k1", "k2", "k3", "k4"]);
}

#[test]
fn test_query_filters_and_sorts() {
    let env = setup();
    for (id, age) in [("a", 15), ("b", 30), ("c", 45), ("d", 22)] {
        env.ok(&[
            "records",
            "create",
            &json!({"id": id, "age": age}).to_string(),
        ]);
    }

    let stdout = env.ok(&[
        "records",
        "query",
        "--filter",
        r#"{"age": {"$gte": 18}}"#,
        "--sort",
        "age",
        "--order",
        "desc",
    ]);
    let ids: Vec<_> = json_lines(&stdout)
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["c", "b", "d"]);
}

#[test]
fn test_query_rejects_malformed_filter() {
    let env = setup();

    let output = env.run(&["records", "query", "--filter", r#"{"age": {"$bogus": 1}}"#]);
    assert!(!output.status.success());

    let output = env.run(&["records", "query", "--filter", "{not json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("filter is not valid JSON"));
}

#[test]
fn test_field_mutations() {
    let env = setup();
    env.ok(&["records", "create", r#"{"id": "r"}"#]);

    env.ok(&["records", "increment", "r", "n"]);
    let stdout = env.ok(&["records", "increment", "r", "n", "--by", "5"]);
    assert_eq!(json_lines(&stdout)[0]["n"], json!(6));

    env.ok(&["records", "append", "r", "log", "first"]);
    env.ok(&["records", "append", "r", "log", "2"]);
    let stdout = env.ok(&["records", "remove", "r", "log", "first"]);
    assert_eq!(json_lines(&stdout)[0]["log"], json!([2]));

    env.ok(&["records", "add-to-set", "r", "tags", "x"]);
    env.ok(&["records", "add-to-set", "r", "tags", "x"]);
    let stdout = env.ok(&["records", "add-to-set", "r", "tags", "y"]);
    assert_eq!(json_lines(&stdout)[0]["tags"], json!({"$set": ["x", "y"]}));

    let stdout = env.ok(&["records", "remove-from-set", "r", "tags", "x"]);
    assert_eq!(json_lines(&stdout)[0]["tags"], json!({"$set": ["y"]}));

    // Appending to a set is a type mismatch.
    let output = env.run(&["records", "append", "r", "tags", "z"]);
    assert!(!output.status.success());
}

#[test]
fn test_table_flag_isolates_records() {
    let env = setup();
    env.ok(&["records", "--table", "users", "create", r#"{"id": "x"}"#]);

    let output = env.run(&["records", "get", "x"]);
    assert!(!output.status.success());

    env.ok(&["--table", "users", "records", "get", "x"]);
}

#[test]
fn test_pretty_output() {
    let env = setup();
    let stdout = env.ok(&["--pretty", "records", "create", r#"{"id": "r", "a": 1}"#]);
    assert!(stdout.lines().count() > 1);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value, json!({"id": "r", "a": 1}));
}

#[test]
fn test_default_backend_uses_data_directory() {
    let env = setup();

    let output = run_cli_default_backend(&["records", "create", r#"{"id": "r"}"#], &env.home);
    assert!(
        output.status.success(),
        "create failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(
        env.home
            .join("data/depot/tables/default/records/r.json")
            .exists()
    );
}

#[test]
fn test_rejects_unsupported_backend() {
    let env = setup();
    let output = run_cli(&["records", "list"], &env.home, "https://example.com/db");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid backend URL"));
}

#[test]
fn test_memory_backend_starts_empty() {
    let env = setup();
    let output = run_cli(&["records", "list"], &env.home, "memory:");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No records found."));
}
