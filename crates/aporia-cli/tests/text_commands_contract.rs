use predicates::prelude::*;

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

#[test]
fn sentences_from_stdin_respect_abbreviations() {
    let v = json_stdout(
        aporia()
            .args(["sentences"])
            .write_stdin("Dr. Smith arrived. He left! Why?"),
    );
    assert_eq!(v["kind"].as_str(), Some("sentences"));
    assert_eq!(v["count"].as_u64(), Some(3));
    let texts: Vec<&str> = v["sentences"]
        .as_array()
        .expect("sentences array")
        .iter()
        .filter_map(|s| s["text"].as_str())
        .collect();
    assert_eq!(texts, vec!["Dr. Smith arrived.", "He left!", "Why?"]);
    assert_eq!(v["sentences"][1]["start"].as_u64(), Some(19));
}

#[test]
fn paragraphs_split_on_blank_lines() {
    let v = json_stdout(
        aporia()
            .args(["paragraphs", "-"])
            .write_stdin("One claim. Another claim.\n\nA new paragraph."),
    );
    assert_eq!(v["count"].as_u64(), Some(2));
    assert_eq!(v["paragraphs"][0]["sentences"].as_array().map(|a| a.len()), Some(2));
}

#[test]
fn chunk_summary_reports_order_and_word_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("essay.txt");
    let mut text = String::new();
    for i in 0..12 {
        text.push_str(&format!(
            "Paragraph {i} argues that the evidence is weak. However, the author insists otherwise.\n\n"
        ));
    }
    std::fs::write(&path, &text).expect("write essay");

    let v = json_stdout(
        aporia()
            .args(["chunk", "--target", "20", "--min", "10", "--max", "40"])
            .args(["--prioritize", "true", "--summary", "true"])
            .arg(&path),
    );
    let count = v["count"].as_u64().expect("count") as usize;
    assert!(count > 1);
    let chunks = v["chunks"].as_array().expect("chunks");
    assert_eq!(chunks.len(), count);
    for c in chunks {
        assert!(c["word_count"].as_u64().unwrap_or(0) <= 40);
        assert!(c.get("text").is_none());
    }
    let mut order: Vec<u64> = v["order"]
        .as_array()
        .expect("order")
        .iter()
        .filter_map(|x| x.as_u64())
        .collect();
    order.sort_unstable();
    assert_eq!(order, (0..count as u64).collect::<Vec<_>>());
    assert_eq!(v["config"]["max_words"].as_u64(), Some(40));
}

#[test]
fn chunk_rejects_min_above_max() {
    aporia()
        .args(["chunk", "--min", "900", "--max", "800", "-"])
        .write_stdin("Short.")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--min"));
}

#[test]
fn salience_scores_argumentative_text_higher() {
    let flat = json_stdout(aporia().args(["salience"]).write_stdin("The cat sat on the mat."));
    let argued = json_stdout(aporia().args(["salience"]).write_stdin(
        "Therefore we must conclude that the evidence proves the claim. But is that really true?",
    ));
    let f = flat["score"].as_f64().expect("score");
    let a = argued["score"].as_f64().expect("score");
    assert!((0.0..=1.0).contains(&f));
    assert!((0.0..=1.0).contains(&a));
    assert!(a > f, "argued={a} flat={f}");
}

#[test]
fn expand_grows_to_sentence_bounds() {
    let v = json_stdout(
        aporia()
            .args(["expand", "--start", "22", "--end", "26"])
            .write_stdin("First one here. The second sentence is it. Third."),
    );
    assert_eq!(v["text"].as_str(), Some("The second sentence is it."));
    assert_eq!(v["start"].as_u64(), Some(16));
    assert_eq!(v["end"].as_u64(), Some(42));
}

#[test]
fn visible_mode_reads_only_the_text_a_reader_sees() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = dir.path().join("page.html");
    std::fs::write(
        &page,
        "<html><body><p>Visible claim here. </p>\
         <p style=\"font-size: 4px\">Tiny print. </p>\
         <div style=\"display:none\">Hidden note. </div>\
         <script>track()</script><p>Last word.</p></body></html>",
    )
    .expect("write html");

    let v = json_stdout(aporia().args(["sentences", "--visible"]).arg(&page));
    let texts: Vec<&str> = v["sentences"]
        .as_array()
        .expect("sentences array")
        .iter()
        .filter_map(|s| s["text"].as_str())
        .collect();
    assert_eq!(texts, vec!["Visible claim here.", "Last word."]);

    let v = json_stdout(
        aporia()
            .args(["chunk", "--visible", "--summary", "true", "--target", "1", "--min", "1"])
            .arg(&page),
    );
    assert_eq!(v["count"].as_u64(), Some(1));
    assert_eq!(v["chunks"][0]["word_count"].as_u64(), Some(5));
}
