use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const REQUIRES_C_AND_F: &str =
    r#"input=$(cat); echo "$input" | grep -qx c && echo "$input" | grep -qx f"#;

fn write_items(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("items.txt");
    fs::write(&path, contents).expect("write items");
    path
}

fn run_json(items: &Path, extra: &[&str], oracle: &[&str]) -> (Value, Option<i32>) {
    let mut cmd = cargo_bin_cmd!("grantmin");
    cmd.arg(items).args(extra).arg("--").args(oracle);

    let output = cmd.output().expect("run grantmin");
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let result = serde_json::from_str(&stdout).expect("parse result json");

    (result, output.status.code())
}

#[test]
fn reduces_to_required_items() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\nd\ne\nf\ng\nh\n");

    let (result, code) = run_json(&items, &[], &["sh", "-c", REQUIRES_C_AND_F]);

    assert_eq!(code, Some(0));
    assert_eq!(result["status"], "pass");
    assert_eq!(result["candidate_count"], 8);
    assert_eq!(result["minimal"]["items"], serde_json::json!(["c", "f"]));
    assert_eq!(result["minimal"]["item_count"], 2);

    let stats = &result["minimal"]["stats"];
    let queries = stats["queries"].as_u64().expect("queries");
    let evaluations = stats["oracle_evaluations"].as_u64().expect("evaluations");
    let cache_hits = stats["cache_hits"].as_u64().expect("cache hits");
    assert_eq!(evaluations + cache_hits, queries + 1);
}

#[test]
fn fails_when_the_full_set_does_not_pass() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\n");

    let (result, code) = run_json(&items, &[], &["false"]);

    assert_eq!(code, Some(1));
    assert_eq!(result["status"], "fail");
    assert_eq!(result["reason"]["kind"], "precondition_failed");
    assert!(result.get("minimal").is_none());
}

#[test]
fn reports_timeout_when_the_oracle_hangs() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\n");

    let (result, code) = run_json(
        &items,
        &["--timeout-ms", "100"],
        &["sh", "-c", "cat > /dev/null; sleep 5"],
    );

    assert_eq!(code, Some(4));
    assert_eq!(result["status"], "timeout");
    assert_eq!(result["reason"]["kind"], "timeout");
    assert!(result.get("minimal").is_none());
}

#[test]
fn reports_oracle_failure_when_the_command_cannot_spawn() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\n");

    let (result, code) = run_json(&items, &[], &["/nonexistent/grantmin-oracle"]);

    assert_eq!(code, Some(2));
    assert_eq!(result["status"], "error");
    assert_eq!(result["reason"]["kind"], "oracle_failure");
}

#[test]
fn missing_items_file_is_invalid_input() {
    let temp = TempDir::new().expect("tmp dir");
    let items = temp.path().join("does-not-exist.txt");

    let (result, code) = run_json(&items, &[], &["true"]);

    assert_eq!(code, Some(2));
    assert_eq!(result["status"], "error");
    assert_eq!(result["reason"]["kind"], "invalid_input");
    assert_eq!(result["candidate_count"], 0);
    assert_eq!(result["inputs"][0]["sha256"], "UNKNOWN");
}

#[test]
fn skips_comments_and_duplicate_items() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "alpha\nalpha\n# note\n\nbeta\ngamma\n");

    let (result, code) = run_json(&items, &[], &["true"]);

    assert_eq!(code, Some(0));
    assert_eq!(result["candidate_count"], 3);
    assert_eq!(result["minimal"]["items"], serde_json::json!(["alpha"]));
}

#[test]
fn hashes_the_items_file() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\n");

    let (result, _code) = run_json(&items, &[], &["true"]);

    let sha256 = result["inputs"][0]["sha256"].as_str().expect("sha256");
    assert_eq!(sha256.len(), 64);
    assert!(sha256.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn text_format_lists_the_minimal_items() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\nd\ne\nf\ng\nh\n");

    cargo_bin_cmd!("grantmin")
        .arg(&items)
        .args(["--format", "text"])
        .arg("--")
        .args(["sh", "-c", REQUIRES_C_AND_F])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=pass"))
        .stdout(predicate::str::contains("minimal=2"))
        .stdout(predicate::str::contains("\nc\nf"));
}

#[test]
fn progress_reports_rounds_on_stderr() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\nd\n");

    cargo_bin_cmd!("grantmin")
        .arg(&items)
        .arg("--progress")
        .arg("--")
        .args(["sh", "-c", r#"input=$(cat); echo "$input" | grep -qx c"#])
        .assert()
        .success()
        .stderr(predicate::str::contains("round: 4 items, 2 splits"))
        .stderr(predicate::str::contains("reduced to 1 items: c"));
}

#[test]
fn writes_the_result_to_an_output_file() {
    let temp = TempDir::new().expect("tmp dir");
    let items = write_items(temp.path(), "a\nb\nc\nd\n");
    let output_path = temp.path().join("result.json");

    cargo_bin_cmd!("grantmin")
        .arg(&items)
        .args(["--output", output_path.to_str().expect("utf8 path")])
        .arg("--")
        .args(["sh", "-c", r#"input=$(cat); echo "$input" | grep -qx c"#])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let text = fs::read_to_string(&output_path).expect("read result file");
    let result: Value = serde_json::from_str(&text).expect("parse result json");
    assert_eq!(result["status"], "pass");
    assert_eq!(result["minimal"]["items"], serde_json::json!(["c"]));
}
