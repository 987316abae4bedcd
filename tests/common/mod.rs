#![allow(dead_code)]

use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory holding `input.json.1` and the shard outputs under `out/`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
    pub fn input(&self) -> PathBuf {
        self.path().join("input.json.1")
    }
    pub fn prefix(&self) -> PathBuf {
        self.path().join("out").join("app")
    }
    /// `<prefix>-<day>`
    pub fn shard(&self, day: &str) -> PathBuf {
        self.path().join("out").join(format!("app-{day}"))
    }
    /// Names of every file directly under `out/`, sorted.
    pub fn output_names(&self) -> Vec<String> {
        let dir = self.path().join("out");
        if !dir.exists() {
            return vec![];
        }
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// One Python-logging style record: `{"asctime": "<day> 12:00:00,123", "message": ...}`.
pub fn log_line(day: &str, message: &str) -> String {
    json!({
        "asctime": format!("{day} 12:00:00,123"),
        "levelname": "INFO",
        "message": message,
    })
    .to_string()
}

/// Write lines joined by `\n`, with a trailing newline.
pub fn write_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// Write raw bytes verbatim (for terminator tests).
pub fn write_bytes(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

/// Read a text file line-by-line (terminators stripped).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).collect()
}

/// Write a compressed `.zst` file containing the provided lines.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Decompress a (possibly multi-frame) `.zst` file and collect lines.
pub fn decompress_zst_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let dec = zstd::stream::read::Decoder::new(f).unwrap();
    let r = BufReader::new(dec);
    r.lines().map(|l| l.unwrap()).collect()
}

/// Serves `data`, then fails every further read (a device that goes away mid-file).
pub struct FailingReader {
    data: Cursor<Vec<u8>>,
}

impl FailingReader {
    pub fn new(lines: &[String]) -> Self {
        let mut data = Vec::new();
        for l in lines {
            data.extend_from_slice(l.as_bytes());
            data.push(b'\n');
        }
        Self { data: Cursor::new(data) }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
        }
        Ok(n)
    }
}

/// Cut a file down to half its length.
pub fn truncate_to_half(path: &Path) {
    let f = fs::OpenOptions::new().write(true).open(path).unwrap();
    let len = f.metadata().unwrap().len();
    f.set_len(len / 2).unwrap();
}
