use predicates::prelude::*;

use std::fs;
use tempfile::TempDir;

/// Test that the binary runs and shows help
#[test]
fn test_help_command() {
    assert_cmd::cargo_bin_cmd!("enhancers")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("stacktrace enhancement rules"));
}

#[test]
fn test_version_command() {
    assert_cmd::cargo_bin_cmd!("enhancers")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("enhancers"));
}

/// Encoding a rule file and decoding the result gives back the rules
#[test]
fn test_encode_decode_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.txt");
    fs::write(&rules_path, "# vendored code\npath:**/vendor/** -app\nfunction:panic v-group\n").unwrap();

    let output = assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["encode", rules_path.to_str().unwrap(), "--base", "common:2019-03-14"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let encoded = String::from_utf8(output).unwrap().trim().to_string();
    assert!(!encoded.is_empty());
    assert!(!encoded.contains('='));

    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["--format", "json", "decode", &encoded])
        .assert()
        .success()
        .stdout(predicate::str::contains("common:2019-03-14"))
        .stdout(predicate::str::contains("p**/vendor/**").not())
        .stdout(predicate::str::contains("\"path:**/vendor/**\""))
        .stdout(predicate::str::contains("\"v-group\""));
}

#[test]
fn test_decode_reads_stdin() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.txt");
    let encoded_path = temp_dir.path().join("rules.b64");
    fs::write(&rules_path, "function:main +app\n").unwrap();

    assert_cmd::cargo_bin_cmd!("enhancers")
        .args([
            "--output",
            encoded_path.to_str().unwrap(),
            "encode",
            rules_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let encoded = fs::read_to_string(&encoded_path).unwrap();
    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["--format", "json", "decode", "-"])
        .write_stdin(encoded)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"function:main\""))
        .stdout(predicate::str::contains("\"+app\""));
}

#[test]
fn test_decode_garbage_fails() {
    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["decode", "not-a-rule-set"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid encoded rule set"));
}

/// Apply marks vendored frames out of app and reports the contribution
#[test]
fn test_apply_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.txt");
    let input_path = temp_dir.path().join("stacktrace.json");
    fs::write(&rules_path, "path:**/vendor/** -app\n").unwrap();
    fs::write(
        &input_path,
        r#"{
            "platform": "python",
            "frames": [
                {"abs_path": "src/vendor/lib.py", "function": "helper", "in_app": true},
                {"abs_path": "src/app.py", "function": "main", "in_app": true}
            ]
        }"#,
    )
    .unwrap();

    assert_cmd::cargo_bin_cmd!("enhancers")
        .args([
            "--format",
            "json",
            "apply",
            rules_path.to_str().unwrap(),
            "--input",
            input_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"orig_in_app\": 1"))
        .stdout(predicate::str::contains(
            "marked out of app by stack trace rule (path:**/vendor/** -app)",
        ))
        .stdout(predicate::str::contains("\"in_app_contributing_frames\": 1"));
}

#[test]
fn test_apply_rejects_invalid_stacktrace() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.txt");
    fs::write(&rules_path, "function:main +app\n").unwrap();

    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["apply", rules_path.to_str().unwrap(), "--input", "-"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid stacktrace JSON"));
}

#[test]
fn test_profiling_filter() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.txt");
    fs::write(&rules_path, "path:foo +app\n# comment\n\nbogus-line\n").unwrap();

    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["profiling", rules_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("path:foo +app\n");
}

#[test]
fn test_bases_listing() {
    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["--format", "json", "bases"])
        .assert()
        .success()
        .stdout(predicate::str::contains("common:2019-03-14"))
        .stdout(predicate::str::contains("legacy:2019-03-12"))
        .stdout(predicate::str::contains("newstyle:2023-01-11"));
}

#[test]
fn test_invalid_rule_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.txt");
    fs::write(&rules_path, "function:ok +app\nfunction:broken\n").unwrap();

    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["encode", rules_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_encode_nonexistent_file() {
    assert_cmd::cargo_bin_cmd!("enhancers")
        .args(["encode", "/nonexistent/rules.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
