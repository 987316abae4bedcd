#[path = "common/mod.rs"]
mod common;

use common::*;
use logsplit::{LogSplitter, RecordSource, RunState, SplitOptions, SplitPipeline};
use std::fs;
use std::io::{BufReader, Cursor};

/// Output location cannot be created (its parent is a regular file):
/// the run fails with an error naming the path and leaves no shard behind.
#[test]
fn unwritable_output_aborts_the_run() {
    let ws = Workspace::new();
    write_lines(&ws.input(), &[log_line("2020-01-01", "a")]);
    let blocker = ws.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();
    let report_path = ws.path().join("report.json");

    let err = LogSplitter::new()
        .input(ws.input())
        .output_prefix(blocker.join("app"))
        .report_path(&report_path)
        .run()
        .unwrap_err();

    assert!(format!("{err:#}").contains("blocker"), "{err:#}");
    // The report is still written on abort.
    let v: serde_json::Value = serde_json::from_slice(&fs::read(&report_path).unwrap()).unwrap();
    assert_eq!(v["state"], "aborted");
    assert!(v["error"].is_string());
}

/// A shard that fails mid-run aborts the pipeline, and records already routed
/// to other shards are flushed to disk rather than lost in buffers.
#[test]
fn abort_flushes_shards_written_so_far() {
    let ws = Workspace::new();
    let lines = vec![
        log_line("2020-01-01", "a"),
        log_line("2020-01-01", "b"),
        log_line("2020-01-02", "boom"),
        log_line("2020-01-01", "never"),
    ];
    write_lines(&ws.input(), &lines);
    // A directory where the 01-02 shard file should go makes its open fail.
    fs::create_dir_all(ws.shard("2020-01-02")).unwrap();

    let opts = SplitOptions::default().with_io_write_buffer(1024 * 1024);
    let mut pipeline = SplitPipeline::new(&ws.prefix(), &opts).unwrap();
    let source = RecordSource::open(&ws.input(), 64 * 1024, None).unwrap();

    assert!(pipeline.run(source).is_err());
    assert_eq!(pipeline.state(), RunState::Aborted);
    assert_eq!(read_lines(&ws.shard("2020-01-01")), vec![lines[0].clone(), lines[1].clone()]);
    assert_eq!(pipeline.counters().routed, 2);
    assert!(pipeline.counters().is_balanced());
}

/// A missing input is fatal and creates no output.
#[test]
fn missing_input_is_fatal() {
    let ws = Workspace::new();
    let err = LogSplitter::new()
        .input(ws.path().join("nope.json"))
        .output_prefix(ws.prefix())
        .run()
        .unwrap_err();
    assert!(format!("{err:#}").contains("nope.json"));
    assert!(ws.output_names().is_empty());
}

/// An invalid custom timestamp format is rejected up front.
#[test]
fn invalid_timestamp_format_is_fatal() {
    let ws = Workspace::new();
    write_lines(&ws.input(), &[log_line("2020-01-01", "a")]);
    let err = LogSplitter::new()
        .input(ws.input())
        .output_prefix(ws.prefix())
        .timestamp_formats(["[year"])
        .run()
        .unwrap_err();
    assert!(format!("{err:#}").contains("invalid timestamp format"));
}

/// A pipeline runs once: `Idle -> Running -> Completed`, then refuses to run again.
#[test]
fn pipeline_runs_exactly_once() {
    let ws = Workspace::new();
    let line = log_line("2020-01-01", "a");
    let mut pipeline = SplitPipeline::new(&ws.prefix(), &SplitOptions::default()).unwrap();
    assert_eq!(pipeline.state(), RunState::Idle);

    let input = format!("{line}\n");
    pipeline
        .run(RecordSource::from_reader("memory", Cursor::new(input.clone().into_bytes())))
        .unwrap();
    assert_eq!(pipeline.state(), RunState::Completed);
    assert_eq!(pipeline.counters().routed, 1);

    let again = pipeline.run(RecordSource::from_reader("memory", Cursor::new(input.into_bytes())));
    assert!(again.is_err());
    assert_eq!(pipeline.state(), RunState::Completed);
    assert_eq!(read_lines(&ws.shard("2020-01-01")), vec![line]);
}

/// A read failure mid-input aborts the run the same way in sequential and
/// parallel mode: lines read before the failure are on disk either way.
#[test]
fn read_failure_keeps_lines_read_before_it() {
    let lines = vec![
        log_line("2020-01-01", "a"),
        log_line("2020-01-02", "b"),
        "junk".to_string(),
    ];
    for (threads, batch) in [(1, 8192), (4, 100)] {
        let ws = Workspace::new();
        let opts = SplitOptions::default().with_parallelism(threads).with_batch_size(batch);
        let mut pipeline = SplitPipeline::new(&ws.prefix(), &opts).unwrap();
        let source = RecordSource::from_reader("flaky", BufReader::new(FailingReader::new(&lines)));

        let err = pipeline.run(source).unwrap_err();
        assert!(format!("{err:#}").contains("device went away"), "{err:#}");
        assert_eq!(pipeline.state(), RunState::Aborted, "threads={threads}");
        assert_eq!(pipeline.counters().lines_read, 3, "threads={threads}");
        assert_eq!(pipeline.counters().routed, 2, "threads={threads}");
        assert!(pipeline.counters().is_balanced());
        assert_eq!(read_lines(&ws.shard("2020-01-01")), vec![lines[0].clone()], "threads={threads}");
        assert_eq!(read_lines(&ws.shard("2020-01-02")), vec![lines[1].clone()], "threads={threads}");
    }
}

/// A full disk surfaces when the shard is flushed: the run aborts naming that
/// shard, and every other shard is still flushed completely.
#[cfg(unix)]
#[test]
fn full_disk_aborts_and_names_the_shard() {
    let full = std::path::Path::new("/dev/full");
    if !full.exists() {
        return;
    }
    let ws = Workspace::new();
    let lines = vec![
        log_line("2020-01-01", "a"),
        log_line("2020-01-02", "lost"),
        log_line("2020-01-01", "b"),
    ];
    write_lines(&ws.input(), &lines);
    fs::create_dir_all(ws.prefix().parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(full, ws.shard("2020-01-02")).unwrap();

    let mut pipeline = SplitPipeline::new(&ws.prefix(), &SplitOptions::default()).unwrap();
    let source = RecordSource::open(&ws.input(), 64 * 1024, None).unwrap();

    let err = pipeline.run(source).unwrap_err();
    assert!(format!("{err:#}").contains("app-2020-01-02"), "{err:#}");
    assert_eq!(pipeline.state(), RunState::Aborted);
    assert!(pipeline.counters().is_balanced());
    assert_eq!(read_lines(&ws.shard("2020-01-01")), vec![lines[0].clone(), lines[2].clone()]);
}
