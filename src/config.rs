use std::path::{Path, PathBuf};

/// Output encoding for shard and rejects files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Records are written verbatim.
    None,
    /// Each open/close session of a file appends one zstd frame.
    Zstd { level: i32 },
}

impl Compression {
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Zstd { .. } => ".zst",
        }
    }
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct SplitOptions {
    pub input: PathBuf,
    pub output_prefix: Option<PathBuf>, // None: derived from the input path
    pub timestamp_field: String,        // top-level key, or JSON pointer when it starts with '/'
    pub timestamp_formats: Vec<String>, // tried before the built-in formats
    pub max_open_files: usize,          // K: shard writers kept open at once
    pub parallelism: usize,             // 1 = sequential extraction
    pub batch_size: usize,              // records per parallel extraction batch
    pub compression: Compression,
    pub write_rejects: bool,
    pub report_path: Option<PathBuf>,
    pub progress: bool,
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,  // BufReader capacity
    pub write_buffer_bytes: usize, // BufWriter capacity per shard
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_prefix: None,
            timestamp_field: "asctime".to_string(),
            timestamp_formats: Vec::new(),
            max_open_files: 128,
            parallelism: 1,
            batch_size: 8192,
            compression: Compression::None,
            write_rejects: false,
            report_path: None,
            progress: false,
            progress_label: None,

            // K writers each hold one buffer, so keep these modest.
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 64 * 1024,
        }
    }
}

impl SplitOptions {
    pub fn with_input(mut self, path: impl AsRef<Path>) -> Self {
        self.input = path.as_ref().to_path_buf();
        self
    }
    pub fn with_output_prefix(mut self, prefix: impl AsRef<Path>) -> Self {
        self.output_prefix = Some(prefix.as_ref().to_path_buf());
        self
    }
    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        let f = field.into();
        if !f.trim().is_empty() {
            self.timestamp_field = f;
        }
        self
    }
    pub fn with_timestamp_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_formats = formats.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_max_open_files(mut self, n: usize) -> Self {
        self.max_open_files = n.max(1);
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = threads.max(1);
        self
    }
    pub fn with_batch_size(mut self, records: usize) -> Self {
        self.batch_size = records.max(1);
        self
    }
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
    pub fn with_rejects(mut self, yes: bool) -> Self {
        self.write_rejects = yes;
        self
    }
    pub fn with_report_path(mut self, path: impl AsRef<Path>) -> Self {
        self.report_path = Some(path.as_ref().to_path_buf());
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }

    // IO buffers tuning
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }
}
