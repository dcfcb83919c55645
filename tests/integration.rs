use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn advisor_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("advisor");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let kb = root.join("knowledge_base");
    fs::create_dir_all(kb.join("guides")).unwrap();
    fs::write(
        kb.join("planting.txt"),
        "Sugarcane setts are planted in furrows 90 cm apart.",
    )
    .unwrap();
    fs::write(
        kb.join("guides/irrigation.json"),
        r#"{"stage": "tillering", "interval_days": 10}"#,
    )
    .unwrap();
    fs::write(kb.join("guides/duplicate.txt"), "Sugarcane setts are planted in furrows 90 cm apart.").unwrap();
    fs::write(kb.join("field.jpg"), [0xFFu8, 0xD8, 0xFF]).unwrap();

    let config_content = format!(
        r#"[storage]
state_dir = "{root}/state"
output_dir = "{root}/state"

[remote]
provider = "local"

[ingest]
root = "{root}/knowledge_base"
max_workers = 2

[gate]
cooldown_secs = 3600
"#,
        root = root.display()
    );

    let config_path = config_dir.join("advisor.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_advisor(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = advisor_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .env_remove("ADVISOR_COOLDOWN_SECONDS")
        .env_remove("INFOGRAPHIC_COOLDOWN_SECONDS")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run advisor binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, stdout))
}

#[test]
fn test_index_created_once() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout1, stderr, success) = run_advisor(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout1, stderr);
    let (stdout2, _, success) = run_advisor(&config_path, &["index"]);
    assert!(success);

    let first = json(&stdout1);
    assert!(first["id"].as_str().unwrap().starts_with("local-"));
    assert_eq!(first["id"], json(&stdout2)["id"]);
}

#[test]
fn test_ingest_then_reingest_skips() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_advisor(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    // The duplicate may race the original; either way only two uploads land.
    assert!(stdout.contains("Ingested 3/3 files"), "stdout={}", stdout);

    let (stdout, _, success) = run_advisor(&config_path, &["ingest"]);
    assert!(success);
    assert!(
        stdout.contains("(0 uploaded, 3 skipped, 0 failed)"),
        "stdout={}",
        stdout
    );

    let cache = fs::read_to_string(tmp.path().join("state/upload_cache.json")).unwrap();
    assert_eq!(json(&cache).as_object().unwrap().len(), 2);
}

#[test]
fn test_ingest_missing_root_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nowhere");

    let (_, stderr, success) =
        run_advisor(&config_path, &["ingest", "--root", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr={}", stderr);
}

#[test]
fn test_upload_reports_missing_file_without_failing() {
    let (tmp, config_path) = setup_test_env();
    let good = tmp.path().join("knowledge_base/planting.txt");
    let bad = tmp.path().join("knowledge_base/ghost.pdf");

    let (stdout, stderr, success) = run_advisor(
        &config_path,
        &["upload", good.to_str().unwrap(), bad.to_str().unwrap()],
    );
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 1/2 files"), "stdout={}", stdout);
    assert!(stdout.contains("ghost.pdf"));
}

#[test]
fn test_gate_check_and_record() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_advisor(&config_path, &["gate", "check", "Red Rot"]);
    assert!(success);
    let fresh = json(&stdout);
    assert_eq!(fresh["allow"], true);
    assert_eq!(fresh["decision"], "fresh");

    let (stdout, _, success) = run_advisor(&config_path, &["gate", "record", "red rot"]);
    assert!(success);
    assert!(stdout.contains("Recorded"));

    let (stdout, _, _) = run_advisor(&config_path, &["gate", "check", "  RED   rot "]);
    let cooling = json(&stdout);
    assert_eq!(cooling["allow"], false);
    assert_eq!(cooling["decision"], "cooling_down");
    assert!(cooling["detail"]["remaining_secs"].as_i64().unwrap() > 3500);

    let (stdout, _, _) = run_advisor(&config_path, &["gate", "check", "red rot", "--force"]);
    assert_eq!(json(&stdout)["decision"], "forced");

    let (stdout, _, _) = run_advisor(&config_path, &["gate", "check", "red rot timeline"]);
    let overridden = json(&stdout);
    assert_eq!(overridden["decision"], "override");
    assert_eq!(overridden["detail"]["token"], "timeline");
}

#[test]
fn test_parse_file_and_stdin() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("model.txt");
    fs::write(
        &input,
        "Analysis below.\n{'crop': 'sugarcane', 'healthy': True, 'notes': None,}\nThanks!",
    )
    .unwrap();

    let (stdout, stderr, success) = run_advisor(&config_path, &["parse", input.to_str().unwrap()]);
    assert!(success, "parse failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(
        json(&stdout),
        serde_json::json!({"crop": "sugarcane", "healthy": true, "notes": null})
    );

    let mut child = Command::new(advisor_binary())
        .arg("parse")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"```json\n{\"format\": \"visual\"}\n```")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        json(&String::from_utf8_lossy(&output.stdout)),
        serde_json::json!({"format": "visual"})
    );
}

#[test]
fn test_parse_prose_fails() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("prose.txt");
    fs::write(&input, "I could not determine the crop from the photo.").unwrap();

    let (stdout, stderr, success) = run_advisor(&config_path, &["parse", input.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("No structured record"));
}

#[test]
fn test_svg_extraction() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("svg.txt");
    fs::write(&input, "Sure:\n<SVG viewBox=\"0 0 10 10\"><rect/></SVG>\nDone.").unwrap();

    let (stdout, _, success) = run_advisor(&config_path, &["svg", input.to_str().unwrap()]);
    assert!(success);
    assert_eq!(stdout.trim(), "<SVG viewBox=\"0 0 10 10\"><rect/></SVG>");
}

#[test]
fn test_decide_without_config() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.toml");

    let (stdout, stderr, success) =
        run_advisor(&missing, &["decide", "Give me a fertilizer schedule for ratoon cane"]);
    assert!(success, "decide failed: stderr={}", stderr);
    let decision = json(&stdout);
    assert_eq!(decision["make"], true);
    assert_eq!(decision["style"], "timeline");

    // Commands needing state refuse to run without a config file.
    let (_, stderr, success) = run_advisor(&missing, &["gate", "check", "x"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_classify_greeting_offline() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_advisor(&config_path, &["classify", "Namaste, how are you?"]);
    assert!(success);
    let classification = json(&stdout);
    assert_eq!(classification["format"], "text");
    assert_eq!(classification["confidence"], 0.95);

    // No model behind the local provider: default record, not an error.
    let (stdout, _, success) =
        run_advisor(&config_path, &["classify", "what yield per acre can I expect"]);
    assert!(success);
    let classification = json(&stdout);
    assert_eq!(classification["format"], "text");
    assert_eq!(classification["confidence"], 0.5);
}

#[test]
fn test_infographic_without_model_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_advisor(&config_path, &["infographic", "weed control"]);
    assert!(!success);
    assert!(stderr.contains("not configured"), "stderr={}", stderr);
}
