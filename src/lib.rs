//! Split one large JSON-lines log into per-day files (`<prefix>-YYYY-MM-DD`),
//! streaming the input once with a bounded number of open output files.

mod config;
mod counters;
mod date;
mod extract;
mod paths;
mod pipeline;
mod pool;
mod progress;
mod source;
mod util;
mod writer;

pub use crate::config::{Compression, SplitOptions};
pub use crate::counters::{RunCounters, SkipCounts};
pub use crate::date::{iter_days, DailyShards, ShardKey, ShardKeyPolicy};
pub use crate::extract::{FieldPath, ParsedTimestamp, SkipReason, TimestampExtractor};
pub use crate::pipeline::{LogSplitter, RunReport, RunState, SplitPipeline};
pub use crate::pool::{PoolStats, ShardHandlePool};
pub use crate::source::{LineEnding, RawRecord, RecordSource};
pub use crate::writer::{RecordWriter, RejectsWriter, ShardWriter};

// Path conventions, so callers can locate outputs.
pub use crate::paths::{default_output_prefix, rejects_path, shard_path};

pub use crate::util::init_tracing_once;
