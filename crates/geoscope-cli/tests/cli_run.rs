use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn geoscope() -> Command {
    let mut cmd = Command::cargo_bin("geoscope").unwrap();
    cmd.env_remove("GEOSCOPE_LOG");
    cmd
}

fn write_workspace(dir: &Path, responses: &str) -> std::path::PathBuf {
    fs::write(
        dir.join("bank.csv"),
        "prompt_id,prompt_text,client_name\n\
         1,Best dentist in Austin?,Acme Dental\n\
         2,Cheap braces in Austin?,Acme Dental\n\
         3,Best dentist in Dallas?,Bright Smiles\n",
    )
    .unwrap();
    fs::write(dir.join("responses.jsonl"), responses).unwrap();
    let config = dir.join("geoscope.yaml");
    fs::write(
        &config,
        r#"
version: 1
prompt_bank: bank.csv
clients_file: clients.csv
db: out/geo.db
provider:
  kind: replay
  path: responses.jsonl
settings:
  retry:
    max_retries: 0
    delay_ms: 0
"#,
    )
    .unwrap();
    config
}

const ANSWERS: &str = r#"{"prompt": "Best dentist in Austin?", "response": "Acme Dental is excellent."}
{"prompt": "Cheap braces in Austin?", "response": "Try Lone Star Ortho."}
"#;

#[test]
fn run_then_show_and_export() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(dir.path(), ANSWERS);

    geoscope()
        .args(["run", "--no-progress", "--client", "acme dental", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Prompts tested:      2"))
        .stderr(contains("Avg appearance:      50.0%"));

    assert!(dir.path().join("out/geo.db").exists());

    geoscope()
        .args(["show", "--client", "ACME DENTAL", "--search", "braces", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Cheap braces in Austin?"))
        .stderr(contains("Best dentist in Austin?").not());

    let out = dir.path().join("acme.csv");
    geoscope()
        .args(["export", "--client", "Acme Dental", "--out"])
        .arg(&out)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("client_name,prompt_id,prompt_text"));
    assert_eq!(csv.lines().count(), 3);

    geoscope()
        .args(["import", "--input"])
        .arg(&out)
        .args(["--db"])
        .arg(dir.path().join("copy.db"))
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Imported 2 of 2 rows"));
}

#[test]
fn json_report_on_stdout() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(dir.path(), ANSWERS);

    let output = geoscope()
        .args(["run", "--format", "json", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["selected"], 2);
    assert_eq!(report["summaries"][0]["appearances"], 1);
}

#[test]
fn rate_limit_exits_one_and_keeps_finished_prompts() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(
        dir.path(),
        r#"{"prompt": "Best dentist in Austin?", "response": "Acme Dental"}
{"prompt": "Cheap braces in Austin?", "error": "rate_limited"}
"#,
    );

    geoscope()
        .args(["run", "--no-progress", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(contains("rate limited at prompt 2"));

    geoscope()
        .args(["export", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("Best dentist in Austin?"))
        .stdout(contains("Cheap braces").not());
}

#[test]
fn rate_limit_still_reports_json() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(
        dir.path(),
        r#"{"prompt": "Best dentist in Austin?", "response": "Acme Dental"}
{"prompt": "Cheap braces in Austin?", "error": "rate_limited"}
"#,
    );

    let output = geoscope()
        .args(["run", "--format", "json", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "rate_limited");
    assert_eq!(report["prompt_id"], 2);
    assert_eq!(report["persisted"], 1);
    assert_eq!(report["selected"], 2);
}

#[test]
fn import_rejects_inconsistent_rows() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(dir.path(), ANSWERS);
    let input = dir.path().join("bad.csv");
    fs::write(
        &input,
        "client_name,prompt_id,prompt_text,appearances,appearance_percent,avg_position,\
         avg_sentiment,runs_requested,runs_completed,raw_responses,timestamp\n\
         Acme Dental,1,q,5,500.0,1.7,-9.0,1,1,x,2025-01-01T00:00:00Z\n",
    )
    .unwrap();

    geoscope()
        .args(["import", "--input"])
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(contains("row 1: inconsistent summary"))
        .stderr(contains("appearances 5 exceeds runs_completed 1"));

    geoscope()
        .args(["clients", "list", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout("");
}

#[test]
fn unknown_client_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(dir.path(), ANSWERS);

    geoscope()
        .args(["run", "--client", "Acme Dentl", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Did you mean 'Acme Dental'?"));
}

#[test]
fn config_problems_exit_two() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(dir.path(), ANSWERS);
    fs::remove_file(dir.path().join("bank.csv")).unwrap();

    geoscope()
        .args(["run", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("prompt bank not found"));

    geoscope()
        .args(["run", "--client", "Acme Dental", "--config"])
        .arg(dir.path().join("missing.yaml"))
        .assert()
        .code(2);

    write_workspace(dir.path(), ANSWERS);
    geoscope()
        .args(["run", "--runs", "0", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("runs_per_prompt"));
}

#[test]
fn clients_add_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = write_workspace(dir.path(), ANSWERS);

    for _ in 0..2 {
        geoscope()
            .args(["clients", "--config"])
            .arg(&config)
            .args(["add", "Acme Dental"])
            .assert()
            .success();
    }
    let registry = fs::read_to_string(dir.path().join("clients.csv")).unwrap();
    assert_eq!(registry.matches("Acme Dental").count(), 1);

    geoscope()
        .args(["clients", "--config"])
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("Acme Dental"));
}

#[test]
fn init_generate_run_from_scratch() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("geoscope.yaml");

    geoscope()
        .arg("init")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
    assert!(dir.path().join("data/clients.csv").exists());

    geoscope()
        .arg("generate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Generated 15 prompts for 1 clients"));

    geoscope()
        .args(["run", "--no-progress", "--client", "Acme Dental", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Restricted-quota mode: at most 5 prompts"))
        .stderr(contains("Prompts tested:      5"));
}

#[test]
fn version_prints_package_version() {
    geoscope()
        .arg("version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}
