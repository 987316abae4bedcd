#[path = "common/mod.rs"]
mod common;

use common::*;
use std::process::Command;

fn logsplit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_logsplit"))
}

/// Skipped lines do not change the exit status; the summary goes to stderr.
#[test]
fn exits_zero_with_skips() {
    let ws = Workspace::new();
    write_lines(&ws.input(), &[log_line("2020-01-01", "a"), "junk".to_string()]);

    let out = logsplit()
        .arg("--input").arg(ws.input())
        .arg("--output").arg(ws.prefix())
        .arg("--max-open").arg("4")
        .output()
        .unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("routed=1"), "{stderr}");
    assert!(stderr.contains("malformed=1"), "{stderr}");
    assert_eq!(read_lines(&ws.shard("2020-01-01")), vec![log_line("2020-01-01", "a")]);
}

/// A fatal I/O error gives a non-zero exit status.
#[test]
fn exits_nonzero_on_unreadable_input() {
    let ws = Workspace::new();
    let out = logsplit()
        .arg("--input").arg(ws.path().join("missing.json"))
        .arg("--output").arg(ws.prefix())
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing.json"));
}

/// A read failure mid-input exits non-zero and still reports the counters,
/// even with logging switched off.
#[test]
fn exits_nonzero_on_truncated_input_with_counters() {
    let ws = Workspace::new();
    let input = ws.path().join("app.jsonl.zst");
    let lines: Vec<String> = (0..200).map(|i| log_line("2021-06-01", &format!("record {i}"))).collect();
    write_zst_lines(&input, &lines);
    truncate_to_half(&input);

    let out = logsplit()
        .env("RUST_LOG", "off")
        .arg("--input").arg(&input)
        .arg("--output").arg(ws.prefix())
        .output()
        .unwrap();

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("app.jsonl.zst"), "{stderr}");
    assert!(stderr.contains("routed="), "{stderr}");
    assert!(stderr.contains("malformed=0"), "{stderr}");
}

/// Buffer sizes and the progress label are accepted on the command line.
#[test]
fn accepts_buffer_and_progress_options() {
    let ws = Workspace::new();
    write_lines(&ws.input(), &[log_line("2020-01-01", "a"), log_line("2020-01-02", "b")]);

    let out = logsplit()
        .arg("--input").arg(ws.input())
        .arg("--output").arg(ws.prefix())
        .arg("--read-buffer").arg("8192")
        .arg("--write-buffer").arg("1")
        .arg("--progress")
        .arg("--progress-label").arg("app.json.1")
        .output()
        .unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(ws.output_names(), vec!["app-2020-01-01", "app-2020-01-02"]);
}
