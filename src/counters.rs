//! Per-run tallies: lines read, routed, and skipped by reason, plus routed counts per day.

use crate::date::ShardKey;
use crate::extract::SkipReason;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub malformed: u64,
    pub missing_field: u64,
    pub bad_timestamp: u64,
}

impl SkipCounts {
    pub fn get(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::Malformed => self.malformed,
            SkipReason::MissingField => self.missing_field,
            SkipReason::BadTimestamp => self.bad_timestamp,
        }
    }

    fn slot(&mut self, reason: SkipReason) -> &mut u64 {
        match reason {
            SkipReason::Malformed => &mut self.malformed,
            SkipReason::MissingField => &mut self.missing_field,
            SkipReason::BadTimestamp => &mut self.bad_timestamp,
        }
    }

    pub fn total(&self) -> u64 {
        self.malformed + self.missing_field + self.bad_timestamp
    }
}

/// Owned by the pipeline and passed by `&mut` to whatever updates it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub lines_read: u64,
    pub routed: u64,
    pub skipped: SkipCounts,
    #[serde(serialize_with = "serialize_per_day")]
    pub per_day: BTreeMap<ShardKey, u64>,
}

impl RunCounters {
    #[inline]
    pub fn record_read(&mut self) {
        self.lines_read += 1;
    }

    #[inline]
    pub fn record_routed(&mut self, key: ShardKey) {
        self.routed += 1;
        *self.per_day.entry(key).or_insert(0) += 1;
    }

    #[inline]
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.slot(reason) += 1;
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.total()
    }

    /// `lines_read == routed + skipped`; holds whenever no record is in flight.
    pub fn is_balanced(&self) -> bool {
        self.lines_read == self.routed + self.skipped_total()
    }
}

impl fmt::Display for RunCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read={} routed={} skipped={} (malformed={} missing_field={} bad_timestamp={}) shards={}",
            self.lines_read,
            self.routed,
            self.skipped_total(),
            self.skipped.malformed,
            self.skipped.missing_field,
            self.skipped.bad_timestamp,
            self.per_day.len(),
        )
    }
}

fn serialize_per_day<S>(per_day: &BTreeMap<ShardKey, u64>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_map(per_day.iter().map(|(k, v)| (k.to_string(), *v)))
}
