// Session log round-trip and crash-recovery tests.

use std::fs::OpenOptions;
use std::io::Write;

use voicelog::{read_back, render_transcript, LogEntry, Origin, SessionLog, VoicelogError};

fn entry(user: &str, name: &str, start: f64, text: &str) -> LogEntry {
    LogEntry {
        user_id: user.to_string(),
        display_name: name.to_string(),
        start_ts: start,
        end_ts: start + 1.0,
        origin: Origin::Voice,
        text: text.to_string(),
    }
}

#[test]
fn written_entries_read_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = SessionLog::open(dir.path(), "standup").unwrap();

    let entries = vec![
        entry("u1", "Ana", 100.0, "good morning"),
        entry("u2", "Bo", 101.5, "hello everyone"),
        LogEntry {
            user_id: "u1".to_string(),
            display_name: "Ana".to_string(),
            start_ts: 102.0,
            end_ts: 102.0,
            origin: Origin::Text,
            text: "typed note".to_string(),
        },
    ];
    for e in &entries {
        log.append(e).unwrap();
    }
    let path = log.path().to_path_buf();
    log.close().unwrap();

    let restored = read_back(&path).unwrap();
    assert_eq!(restored, entries);
}

#[test]
fn log_lives_under_the_session_directory() {
    let dir = tempfile::tempdir().unwrap();
    let log = SessionLog::open(dir.path(), "weekly-sync").unwrap();
    assert_eq!(
        log.path(),
        dir.path().join("weekly-sync").join("log.jsonl")
    );
}

#[test]
fn corrupted_trailing_line_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = SessionLog::open(dir.path(), "s").unwrap();
    log.append(&entry("u1", "Ana", 1.0, "first")).unwrap();
    log.append(&entry("u1", "Ana", 2.0, "second")).unwrap();
    let path = log.path().to_path_buf();
    log.close().unwrap();

    // Simulate a write cut short by a crash.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{\"user_id\":\"u1\",\"display").unwrap();

    let restored = read_back(&path).unwrap();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored[1].text, "second");
}

#[test]
fn corruption_in_the_middle_is_an_error_with_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = SessionLog::open(dir.path(), "s").unwrap();
    log.append(&entry("u1", "Ana", 1.0, "first")).unwrap();
    let path = log.path().to_path_buf();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"not json at all\n").unwrap();
    drop(file);
    log.append(&entry("u1", "Ana", 2.0, "third")).unwrap();
    log.close().unwrap();

    match read_back(&path) {
        Err(VoicelogError::CorruptLog { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected CorruptLog, got {other:?}"),
    }
}

#[test]
fn blank_lines_are_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = SessionLog::open(dir.path(), "s").unwrap();
    log.append(&entry("u1", "Ana", 1.0, "only")).unwrap();
    let path = log.path().to_path_buf();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"\n\n").unwrap();

    assert_eq!(read_back(&path).unwrap().len(), 1);
}

#[test]
fn origin_serializes_lowercase() {
    let e = entry("u1", "Ana", 1.0, "hi");
    let json = serde_json::to_string(&e).unwrap();
    assert!(json.contains("\"origin\":\"voice\""));
}

#[test]
fn transcript_renders_in_capture_order() {
    // Commit order deliberately differs from capture order: inference
    // latency reorders entries on disk.
    let entries = vec![
        entry("u2", "Bo", 20.0, "second line"),
        entry("u1", "Ana", 10.0, "first line"),
        entry("u1", "Ana", 30.0, "third line"),
    ];
    let text = render_transcript(&entries);
    assert_eq!(text, "Ana: first line\nBo: second line\nAna: third line\n");
}

#[test]
fn appends_survive_reopening_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = SessionLog::open(dir.path(), "s").unwrap();
    log.append(&entry("u1", "Ana", 1.0, "before")).unwrap();
    let path = log.path().to_path_buf();
    log.close().unwrap();

    let mut log = SessionLog::open(dir.path(), "s").unwrap();
    log.append(&entry("u1", "Ana", 2.0, "after")).unwrap();
    log.close().unwrap();

    let restored = read_back(&path).unwrap();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored[0].text, "before");
    assert_eq!(restored[1].text, "after");
}
