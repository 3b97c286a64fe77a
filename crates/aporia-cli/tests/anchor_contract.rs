fn aporia() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("aporia"));
    cmd.env_remove("APORIA_ENV_FILE");
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

const ORIGINAL: &str = "<html><body><p>The premise is questionable at best. Other text follows.</p></body></html>";

#[test]
fn describe_then_reanchor_after_markup_edit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = dir.path().join("original.html");
    std::fs::write(&original, ORIGINAL).expect("write html");

    let described = json_stdout(
        aporia()
            .args(["describe", "--start", "4", "--end", "27"])
            .arg(&original),
    );
    assert_eq!(described["anchor"]["exact"].as_str(), Some("premise is questionable"));
    assert_eq!(described["anchor"]["prefix"].as_str(), Some("The "));
    assert_eq!(described["anchor"]["start"].as_u64(), Some(4));

    let anchor_path = dir.path().join("anchor.json");
    std::fs::write(&anchor_path, described.to_string()).expect("write anchor");

    let edited = dir.path().join("edited.html");
    std::fs::write(
        &edited,
        "<html><body><p>Intro added. The premise is <b>questionable</b> at best. Other text follows.</p></body></html>",
    )
    .expect("write html");

    let v = json_stdout(aporia().args(["reanchor", "--anchor"]).arg(&anchor_path).arg(&edited));
    assert_eq!(v["found"].as_bool(), Some(true));
    assert_eq!(v["method"].as_str(), Some("exact"));
    assert_eq!(v["score"].as_f64(), Some(1.0));
    assert_eq!(v["exact"].as_str(), Some("premise is questionable"));
    assert_eq!(v["start"].as_u64(), Some(17));
    assert_eq!(v["end"].as_u64(), Some(40));
}

#[test]
fn reanchor_reports_not_found_without_failing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let anchor_path = dir.path().join("anchor.json");
    std::fs::write(
        &anchor_path,
        r#"{"exact":"premise is questionable","prefix":"The ","suffix":" at best.","start":4,"end":27}"#,
    )
    .expect("write anchor");
    let gone = dir.path().join("gone.html");
    std::fs::write(&gone, "<html><body><p>Gone.</p></body></html>").expect("write html");

    let v = json_stdout(aporia().args(["reanchor", "--anchor"]).arg(&anchor_path).arg(&gone));
    assert_eq!(v["found"].as_bool(), Some(false));
    assert!(v["method"].is_null());
}

#[test]
fn describe_rejects_out_of_range_offsets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = dir.path().join("original.html");
    std::fs::write(&original, ORIGINAL).expect("write html");

    aporia()
        .args(["describe", "--start", "10", "--end", "5000"])
        .arg(&original)
        .assert()
        .failure()
        .stderr(predicates::str::contains("not within the document text"));
}
