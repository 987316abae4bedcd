use crate::extract::ParsedTimestamp;
use std::fmt;
use std::str::FromStr;
use time::{Date, Month};

/// Calendar-day partition key ("YYYY-MM-DD"), ordered by date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardKey(Date);

impl ShardKey {
    /// Returns `None` for impossible dates (e.g. 2021-02-30).
    pub fn new(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = Month::try_from(month).ok()?;
        Date::from_calendar_date(year, month, day).ok().map(Self)
    }
    pub fn from_date(date: Date) -> Self {
        Self(date)
    }
    pub fn date(self) -> Date {
        self.0
    }
    pub fn next(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }
    pub fn prev(self) -> Option<Self> {
        self.0.previous_day().map(Self)
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for ShardKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = s.split('-').collect();
        if parts.len() != 3 {
            return Err("expected YYYY-MM-DD".into());
        }
        let year: i32 = parts[0].parse().map_err(|_| "invalid year")?;
        let month: u8 = parts[1].parse().map_err(|_| "invalid month")?;
        let day: u8 = parts[2].parse().map_err(|_| "invalid day")?;
        Self::new(year, month, day).ok_or_else(|| format!("no such date: {s}"))
    }
}

/// Inclusive iteration from `start` to `end` (if `start` <= `end`), else empty.
pub fn iter_days(start: ShardKey, end: ShardKey) -> impl Iterator<Item = ShardKey> {
    let mut curr = if start <= end { Some(start) } else { None };
    std::iter::from_fn(move || {
        let ret = curr?;
        curr = ret.next().filter(|n| *n <= end);
        Some(ret)
    })
}

/// Maps a parsed timestamp to the partition it belongs to.
/// Implementations must be pure: equal timestamps always yield equal keys.
pub trait ShardKeyPolicy: Send + Sync {
    fn shard_key(&self, ts: &ParsedTimestamp) -> ShardKey;
}

/// One shard per calendar day, using the date exactly as written in the record.
#[derive(Clone, Copy, Debug, Default)]
pub struct DailyShards;

impl ShardKeyPolicy for DailyShards {
    #[inline]
    fn shard_key(&self, ts: &ParsedTimestamp) -> ShardKey {
        ShardKey::from_date(ts.date)
    }
}
