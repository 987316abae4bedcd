//! Sequential line reader over a plain or zstd-compressed log file.

use crate::paths::is_zstd_path;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder;

/// How the line was terminated in the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline.
    Missing,
}

impl LineEnding {
    /// Bytes written after the record. A missing terminator becomes `\n` so
    /// later appends to the same shard never run into this record.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf | LineEnding::Missing => b"\n",
            LineEnding::CrLf => b"\r\n",
        }
    }
}

/// One input line, exactly as read, without its terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub line_no: u64, // 1-based
    pub bytes: Vec<u8>,
    pub ending: LineEnding,
}

impl RawRecord {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A `Read` wrapper that reports bytes read from disk to a progress bar.
struct CountingReader<R: Read> {
    inner: R,
    pb: Option<ProgressBar>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(pb) = &self.pb {
            pb.inc(n as u64);
        }
        Ok(n)
    }
}

/// Lazy, finite, non-restartable sequence of `RawRecord`s in file order.
/// Memory use is bounded by the read buffer plus the longest line.
pub struct RecordSource {
    path: PathBuf,
    rdr: Box<dyn BufRead>,
    line_no: u64,
    done: bool,
}

impl RecordSource {
    pub fn open(path: &Path, buf_bytes: usize, pb: Option<ProgressBar>) -> Result<Self> {
        let file: File = open_with_backoff(path, 16, 50)
            .with_context(|| format!("open input {}", path.display()))?;
        let counted = CountingReader { inner: file, pb };
        let cap = buf_bytes.max(8 * 1024);
        let rdr: Box<dyn BufRead> = if is_zstd_path(path) {
            let mut decoder = Decoder::new(counted)
                .with_context(|| format!("zstd decoder for {}", path.display()))?;
            // Large windows show up in long-range archives.
            decoder.window_log_max(31)?;
            Box::new(BufReader::with_capacity(cap, decoder))
        } else {
            Box::new(BufReader::with_capacity(cap, counted))
        };
        Ok(Self { path: path.to_path_buf(), rdr, line_no: 0, done: false })
    }

    /// Wrap an arbitrary reader (used for in-memory inputs).
    pub fn from_reader(name: impl Into<PathBuf>, rdr: impl BufRead + 'static) -> Self {
        Self { path: name.into(), rdr: Box::new(rdr), line_no: 0, done: false }
    }

    fn read_record(&mut self) -> Result<Option<RawRecord>> {
        let mut buf = Vec::with_capacity(1024);
        let n = self
            .rdr
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("read {} after line {}", self.path.display(), self.line_no))?;
        if n == 0 {
            return Ok(None);
        }
        let ending = if buf.ends_with(b"\r\n") {
            buf.truncate(buf.len() - 2);
            LineEnding::CrLf
        } else if buf.ends_with(b"\n") {
            buf.pop();
            LineEnding::Lf
        } else {
            LineEnding::Missing
        };
        self.line_no += 1;
        Ok(Some(RawRecord { line_no: self.line_no, bytes: buf, ending }))
    }
}

impl Iterator for RecordSource {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // A failed read is fatal; never resume mid-line.
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
