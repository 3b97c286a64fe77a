#[test]
fn aporia_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("aporia");
    let out = std::process::Command::new(bin)
        .args(["version"])
        // Keep this hermetic: no env-file autoload.
        .env_remove("APORIA_ENV_FILE")
        .output()
        .expect("run aporia version");

    assert!(out.status.success(), "aporia version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["name"].as_str(), Some("aporia"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn aporia_version_text_output() {
    let bin = assert_cmd::cargo::cargo_bin!("aporia");
    assert_cmd::Command::new(bin)
        .args(["version", "--output", "text"])
        .env_remove("APORIA_ENV_FILE")
        .assert()
        .success()
        .stdout(predicates::str::starts_with("aporia "));
}
