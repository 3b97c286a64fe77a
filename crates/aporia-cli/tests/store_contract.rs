use predicates::prelude::*;

fn aporia(store: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("aporia"));
    for k in [
        "APORIA_ENV_FILE",
        "APORIA_BACKEND",
        "APORIA_MODEL",
        "APORIA_OPENAI_COMPAT_BASE_URL",
        "APORIA_OPENAI_COMPAT_API_KEY",
        "APORIA_OPENAI_COMPAT_MODEL",
        "APORIA_OLLAMA_ENABLE",
    ] {
        cmd.env_remove(k);
    }
    cmd.env("APORIA_STORE_DIR", store);
    cmd
}

fn json_stdout(cmd: &mut assert_cmd::Command) -> serde_json::Value {
    let out = cmd.output().expect("run aporia");
    assert!(
        out.status.success(),
        "aporia failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse json stdout")
}

#[test]
fn restore_with_empty_store_restores_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let html = dir.path().join("page.html");
    std::fs::write(&html, "<html><body><p>Some text.</p></body></html>").expect("write html");

    let v = json_stdout(
        aporia(&dir.path().join("store"))
            .args(["restore", "--url", "https://example.com/a#frag"])
            .arg(&html),
    );
    assert_eq!(v["kind"].as_str(), Some("restore"));
    assert_eq!(v["report"]["restored"].as_array().map(|a| a.len()), Some(0));
    assert_eq!(v["report"]["missing"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn config_write_persists_defaults_and_env_store_dir_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = dir.path().join("store");

    let v = json_stdout(aporia(&store).args(["config", "--write", "true"]));
    assert_eq!(v["written"].as_bool(), Some(true));
    assert_eq!(v["config"]["backend"].as_str(), Some("openai_compat"));
    assert_eq!(v["config"]["chunk"]["target_words"].as_u64(), Some(500));
    assert_eq!(v["config"]["anchor"]["fuzzy_threshold"].as_f64(), Some(0.8));
    assert!(store.join("config.json").is_file());

    let again = json_stdout(aporia(&store).args(["config"]));
    assert_eq!(again["written"].as_bool(), Some(false));
    assert_eq!(again["config"], v["config"]);
}

#[test]
fn forget_unknown_annotation_reports_not_removed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let v = json_stdout(
        aporia(&dir.path().join("store"))
            .args(["forget", "--url", "https://example.com/a", "--id", "nope"]),
    );
    assert_eq!(v["removed"].as_bool(), Some(false));
    assert_eq!(v["url"].as_str(), Some("https://example.com/a"));
}

#[test]
fn analyze_without_backend_fails_with_hint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let html = dir.path().join("page.html");
    std::fs::write(&html, "<html><body><p>Some text.</p></body></html>").expect("write html");

    aporia(&dir.path().join("store"))
        .args(["analyze", "--url", "https://example.com/a"])
        .arg(&html)
        .assert()
        .failure()
        .stderr(predicate::str::contains("APORIA_OPENAI_COMPAT_BASE_URL"));
}

#[test]
fn invalid_url_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    aporia(&dir.path().join("store"))
        .args(["forget", "--url", "not a url", "--id", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid url"));
}
