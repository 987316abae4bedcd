use crate::config::{Compression, SplitOptions};
use crate::counters::RunCounters;
use crate::date::{DailyShards, ShardKey, ShardKeyPolicy};
use crate::extract::{SkipReason, TimestampExtractor};
use crate::paths::{default_output_prefix, rejects_path};
use crate::pool::{PoolStats, ShardHandlePool};
use crate::progress::{input_size, ProgressScope};
use crate::source::{RawRecord, RecordSource};
use crate::util::{create_parent_dirs, init_tracing_once};
use crate::writer::RejectsWriter;
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Lifecycle of one run: `Idle -> Running -> {Completed, Aborted}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Single-pass read -> extract -> route -> write over one input.
///
/// Owns the run counters and the handle pool. Both terminal states release
/// every held writer exactly once before `run` returns.
pub struct SplitPipeline {
    extractor: TimestampExtractor,
    policy: Box<dyn ShardKeyPolicy>,
    pool: ShardHandlePool,
    rejects: Option<RejectsWriter>,
    counters: RunCounters,
    state: RunState,
    parallelism: usize,
    batch_size: usize,
}

impl SplitPipeline {
    pub fn new(prefix: &Path, opts: &SplitOptions) -> Result<Self> {
        let extractor = TimestampExtractor::new(&opts.timestamp_field)
            .with_formats(&opts.timestamp_formats)?;
        let pool = ShardHandlePool::new(prefix, opts.max_open_files, opts.compression, opts.write_buffer_bytes);
        let rejects = opts.write_rejects.then(|| {
            RejectsWriter::new(rejects_path(prefix, opts.compression), opts.compression, opts.write_buffer_bytes)
        });
        Ok(Self {
            extractor,
            policy: Box::new(DailyShards),
            pool,
            rejects,
            counters: RunCounters::default(),
            state: RunState::Idle,
            parallelism: opts.parallelism.max(1),
            batch_size: opts.batch_size.max(1),
        })
    }

    /// Swap the partitioning function (daily by default).
    pub fn with_policy(mut self, policy: impl ShardKeyPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn pool_stats(&self) -> &PoolStats {
        self.pool.stats()
    }

    pub fn run(&mut self, source: RecordSource) -> Result<()> {
        if self.state != RunState::Idle {
            bail!("pipeline already ran (state: {:?})", self.state);
        }
        self.state = RunState::Running;

        let driven = if self.parallelism > 1 {
            self.drive_batched(source)
        } else {
            self.drive_sequential(source)
        };
        let released = self.release_all();

        let outcome = match (driven, released) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), released) => {
                if let Err(re) = released {
                    tracing::warn!("cleanup after abort also failed: {re:#}");
                }
                Err(e)
            }
            (Ok(()), Err(e)) => Err(e.context("closing output files")),
        };
        self.state = if outcome.is_ok() { RunState::Completed } else { RunState::Aborted };
        outcome
    }

    fn drive_sequential(&mut self, source: RecordSource) -> Result<()> {
        for rec in source {
            let rec = rec?;
            let outcome = classify(&self.extractor, &*self.policy, &rec);
            self.route(&rec, outcome)?;
        }
        Ok(())
    }

    /// Extraction fans out over a rayon pool one batch at a time; the indexed
    /// collect keeps batch order, so routing and writing stay sequential.
    fn drive_batched(&mut self, source: RecordSource) -> Result<()> {
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .build()
            .context("build extraction thread pool")?;
        let mut batch: Vec<RawRecord> = Vec::with_capacity(self.batch_size);
        for rec in source {
            match rec {
                Ok(rec) => batch.push(rec),
                Err(e) => {
                    // Lines read before the failure are written, as in sequential mode.
                    self.route_batch(&workers, &mut batch)?;
                    return Err(e);
                }
            }
            if batch.len() >= self.batch_size {
                self.route_batch(&workers, &mut batch)?;
            }
        }
        if !batch.is_empty() {
            self.route_batch(&workers, &mut batch)?;
        }
        Ok(())
    }

    fn route_batch(&mut self, workers: &rayon::ThreadPool, batch: &mut Vec<RawRecord>) -> Result<()> {
        let outcomes: Vec<Result<ShardKey, SkipReason>> = {
            let extractor = &self.extractor;
            let policy = &*self.policy;
            workers.install(|| batch.par_iter().map(|rec| classify(extractor, policy, rec)).collect())
        };
        for (rec, outcome) in batch.drain(..).zip(outcomes) {
            self.route(&rec, outcome)?;
        }
        Ok(())
    }

    fn route(&mut self, rec: &RawRecord, outcome: Result<ShardKey, SkipReason>) -> Result<()> {
        match outcome {
            Ok(key) => {
                self.pool.acquire(key)?.write_record(rec)?;
                self.counters.record_routed(key);
            }
            Err(reason) => {
                tracing::debug!(line = rec.line_no, %reason, "skipping record");
                if let Some(rejects) = &mut self.rejects {
                    rejects.write_record(rec)?;
                }
                self.counters.record_skip(reason);
            }
        }
        self.counters.record_read();
        Ok(())
    }

    fn release_all(&mut self) -> Result<()> {
        let pool = self.pool.release_all();
        let rejects = match &mut self.rejects {
            Some(r) => r.finish(),
            None => Ok(()),
        };
        pool.and(rejects)
    }
}

fn classify(
    extractor: &TimestampExtractor,
    policy: &dyn ShardKeyPolicy,
    rec: &RawRecord,
) -> Result<ShardKey, SkipReason> {
    extractor.extract(rec.bytes()).map(|ts| policy.shard_key(&ts))
}

/// What a run did, reported on completion and on abort.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output_prefix: PathBuf,
    pub state: RunState,
    pub counters: RunCounters,
    pub pool: PoolStats,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl RunReport {
    fn log(&self) {
        let c = &self.counters;
        tracing::info!(
            state = ?self.state,
            lines_read = c.lines_read,
            routed = c.routed,
            skipped = c.skipped_total(),
            malformed = c.skipped.malformed,
            missing_field = c.skipped.missing_field,
            bad_timestamp = c.skipped.bad_timestamp,
            shards = c.per_day.len(),
            evictions = self.pool.evicted,
            "run summary ({} ms)",
            self.elapsed_ms
        );
        for (day, n) in &c.per_day {
            tracing::debug!(shard = %day, records = n, "routed");
        }
        if let Some(e) = &self.error {
            tracing::error!("run aborted: {e}");
        }
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        create_parent_dirs(path)?;
        let f = File::create(path).with_context(|| format!("create report {}", path.display()))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.write_all(b"\n")?;
        w.flush().with_context(|| format!("flush report {}", path.display()))?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct LogSplitter {
    pub(crate) opts: SplitOptions,
}

impl LogSplitter {
    pub fn new() -> Self {
        Self { opts: SplitOptions::default() }
    }

    // -------- Builder methods --------
    pub fn input(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input(path); self }
    pub fn output_prefix(mut self, prefix: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_prefix(prefix); self }
    pub fn timestamp_field(mut self, field: impl Into<String>) -> Self { self.opts = self.opts.with_timestamp_field(field); self }
    pub fn timestamp_formats<I, S>(mut self, formats: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.opts = self.opts.with_timestamp_formats(formats); self }
    pub fn max_open_files(mut self, n: usize) -> Self { self.opts = self.opts.with_max_open_files(n); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn batch_size(mut self, records: usize) -> Self { self.opts = self.opts.with_batch_size(records); self }
    pub fn compression(mut self, compression: Compression) -> Self { self.opts = self.opts.with_compression(compression); self }
    pub fn rejects(mut self, yes: bool) -> Self { self.opts = self.opts.with_rejects(yes); self }
    pub fn report_path(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_report_path(path); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn io_write_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_write_buffer(bytes); self }

    /// The explicit prefix, or one derived from the input file name.
    pub fn resolve_output_prefix(&self) -> Result<PathBuf> {
        match &self.opts.output_prefix {
            Some(p) => Ok(p.clone()),
            None => default_output_prefix(&self.opts.input),
        }
    }

    /// Split the input into per-day files. Skipped lines never fail the run;
    /// any I/O failure does, after all open files have been flushed and closed.
    /// The error of an aborted run carries the counters reached so far.
    pub fn run(self) -> Result<RunReport> {
        init_tracing_once();
        if self.opts.input.as_os_str().is_empty() {
            bail!("input path is required");
        }
        let prefix = self.resolve_output_prefix()?;
        let start = Instant::now();
        tracing::info!(
            input = %self.opts.input.display(),
            prefix = %prefix.display(),
            max_open = self.opts.max_open_files,
            parallelism = self.opts.parallelism,
            "splitting log by day"
        );

        let mut pipeline = SplitPipeline::new(&prefix, &self.opts)?;
        let progress = if self.opts.progress {
            let label = self.opts.progress_label.clone().unwrap_or_else(|| "Splitting".to_string());
            ProgressScope::bytes(label, input_size(&self.opts.input))
        } else {
            ProgressScope::disabled()
        };

        let outcome = RecordSource::open(&self.opts.input, self.opts.read_buffer_bytes, progress.bar())
            .and_then(|source| pipeline.run(source));

        let report = RunReport {
            input: self.opts.input.clone(),
            output_prefix: prefix,
            state: if outcome.is_ok() { RunState::Completed } else { RunState::Aborted },
            counters: pipeline.counters().clone(),
            pool: pipeline.pool_stats().clone(),
            error: outcome.as_ref().err().map(|e| format!("{e:#}")),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        match &outcome {
            Ok(()) => progress.finish(format!("{} records routed", report.counters.routed)),
            Err(_) => progress.abandon("aborted"),
        }
        report.log();

        if let Some(path) = &self.opts.report_path {
            if let Err(e) = report.write_json(path) {
                if outcome.is_ok() {
                    return Err(e);
                }
                tracing::warn!("could not write run report: {e:#}");
            }
        }
        match outcome {
            Ok(()) => Ok(report),
            Err(e) => Err(e.context(format!("aborted after {}", report.counters))),
        }
    }
}
