//! Append-only record writers for shard and rejects files.

use crate::config::Compression;
use crate::date::ShardKey;
use crate::source::RawRecord;
use crate::util::{create_parent_dirs, open_append_with_backoff};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zstd::stream::write::Encoder as ZstdEncoder;

enum Sink {
    Plain(BufWriter<File>),
    Zstd(ZstdEncoder<'static, BufWriter<File>>),
}

impl Sink {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Sink::Plain(w) => w,
            Sink::Zstd(enc) => enc,
        }
    }
}

/// A buffered append-mode file. Files are never opened with truncation, so
/// closing and reopening keeps every earlier record in place.
pub struct RecordWriter {
    path: PathBuf,
    sink: Option<Sink>,
    written: u64,
}

impl RecordWriter {
    pub fn open(path: &Path, compression: Compression, buf_bytes: usize) -> Result<Self> {
        create_parent_dirs(path)?;
        let f = open_append_with_backoff(path, 16, 50)
            .with_context(|| format!("open {} for append", path.display()))?;
        let buffered = BufWriter::with_capacity(buf_bytes.max(8 * 1024), f);
        let sink = match compression {
            Compression::None => Sink::Plain(buffered),
            Compression::Zstd { level } => {
                let mut enc = ZstdEncoder::new(buffered, level)
                    .with_context(|| format!("zstd encoder for {}", path.display()))?;
                enc.include_checksum(true)?;
                Sink::Zstd(enc)
            }
        };
        Ok(Self { path: path.to_path_buf(), sink: Some(sink), written: 0 })
    }

    /// Write the record bytes followed by its original line terminator.
    pub fn write_record(&mut self, rec: &RawRecord) -> Result<()> {
        let sink = match &mut self.sink {
            Some(s) => s,
            None => anyhow::bail!("write to closed file {}", self.path.display()),
        };
        let w = sink.writer();
        w.write_all(&rec.bytes)
            .and_then(|_| w.write_all(rec.ending.as_bytes()))
            .with_context(|| format!("write line {} to {}", rec.line_no, self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered bytes (ending the zstd frame) and close the file.
    /// Safe to call more than once.
    pub fn finish(&mut self) -> Result<()> {
        let mut buffered = match self.sink.take() {
            None => return Ok(()),
            Some(Sink::Plain(w)) => w,
            Some(Sink::Zstd(enc)) => enc
                .finish()
                .with_context(|| format!("finish zstd frame {}", self.path.display()))?,
        };
        buffered
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written since this handle was opened.
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// The open output stream for one shard key.
pub struct ShardWriter {
    key: ShardKey,
    inner: RecordWriter,
}

impl ShardWriter {
    pub fn open(key: ShardKey, path: &Path, compression: Compression, buf_bytes: usize) -> Result<Self> {
        Ok(Self { key, inner: RecordWriter::open(path, compression, buf_bytes)? })
    }

    pub fn key(&self) -> ShardKey {
        self.key
    }

    #[inline]
    pub fn write_record(&mut self, rec: &RawRecord) -> Result<()> {
        self.inner.write_record(rec)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    pub fn written(&self) -> u64 {
        self.inner.written()
    }
}

/// Lazily opened sink for skipped lines (`<prefix>.rejected`).
pub struct RejectsWriter {
    path: PathBuf,
    compression: Compression,
    buf_bytes: usize,
    inner: Option<RecordWriter>,
}

impl RejectsWriter {
    pub fn new(path: PathBuf, compression: Compression, buf_bytes: usize) -> Self {
        Self { path, compression, buf_bytes, inner: None }
    }

    pub fn write_record(&mut self, rec: &RawRecord) -> Result<()> {
        if self.inner.is_none() {
            self.inner = Some(RecordWriter::open(&self.path, self.compression, self.buf_bytes)?);
        }
        match &mut self.inner {
            Some(w) => w.write_record(rec),
            None => Ok(()),
        }
    }

    pub fn finish(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut w) => w.finish(),
            None => Ok(()),
        }
    }
}
