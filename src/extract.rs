//! Timestamp extraction: decode one JSON line just far enough to read a single
//! field, then parse that field into a calendar date-time.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::format_description::{BorrowedFormatItem, OwnedFormatItem};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Why a record was not routed to any shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The line is not a JSON object.
    Malformed,
    /// The timestamp field is absent (or `null`).
    MissingField,
    /// The field is present but is not a string in any accepted format.
    BadTimestamp,
}

impl SkipReason {
    pub const ALL: [SkipReason; 3] = [
        SkipReason::Malformed,
        SkipReason::MissingField,
        SkipReason::BadTimestamp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Malformed => "malformed",
            SkipReason::MissingField => "missing_field",
            SkipReason::BadTimestamp => "bad_timestamp",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date-time as literally written in the record. `offset` is only known for
/// RFC 3339 inputs; the date is never shifted into another zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub date: Date,
    pub time: Time,
    pub offset: Option<UtcOffset>,
}

impl From<PrimitiveDateTime> for ParsedTimestamp {
    fn from(dt: PrimitiveDateTime) -> Self {
        Self { date: dt.date(), time: dt.time(), offset: None }
    }
}

impl From<OffsetDateTime> for ParsedTimestamp {
    fn from(dt: OffsetDateTime) -> Self {
        Self { date: dt.date(), time: dt.time(), offset: Some(dt.offset()) }
    }
}

// Python logging's `asctime` first, then common ISO-8601 spellings.
const NAIVE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second],[subsecond]"),
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
];

const DATE_ONLY: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

/// Where the timestamp lives inside a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldPath {
    Key(String),
    Pointer(String),
}

impl FieldPath {
    /// A leading `/` selects a JSON pointer (`/meta/ts`); anything else is a top-level key.
    pub fn parse(field: &str) -> Self {
        if field.starts_with('/') {
            FieldPath::Pointer(field.to_string())
        } else {
            FieldPath::Key(field.to_string())
        }
    }

    fn lookup<'v>(&self, v: &'v Value) -> Option<&'v Value> {
        match self {
            FieldPath::Key(k) => v.get(k),
            FieldPath::Pointer(p) => v.pointer(p),
        }
    }
}

/// Pure function from a raw line to its timestamp (or the reason it has none).
pub struct TimestampExtractor {
    field: FieldPath,
    custom: Vec<OwnedFormatItem>,
}

impl TimestampExtractor {
    pub fn new(field: &str) -> Self {
        Self { field: FieldPath::parse(field), custom: Vec::new() }
    }

    /// Add user formats (`time` format-description syntax); they are tried before the built-ins.
    pub fn with_formats<I, S>(mut self, formats: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for f in formats {
            let f = f.as_ref();
            let item = time::format_description::parse_owned::<2>(f)
                .with_context(|| format!("invalid timestamp format `{f}`"))?;
            self.custom.push(item);
        }
        Ok(self)
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn extract(&self, line: &[u8]) -> Result<ParsedTimestamp, SkipReason> {
        let value: Value = serde_json::from_slice(line).map_err(|_| SkipReason::Malformed)?;
        if !value.is_object() {
            return Err(SkipReason::Malformed);
        }
        let field = match self.field.lookup(&value) {
            None | Some(Value::Null) => return Err(SkipReason::MissingField),
            Some(f) => f,
        };
        let text = field.as_str().ok_or(SkipReason::BadTimestamp)?;
        self.parse_timestamp(text).ok_or(SkipReason::BadTimestamp)
    }

    pub fn parse_timestamp(&self, text: &str) -> Option<ParsedTimestamp> {
        let s = text.trim();
        for fmt in &self.custom {
            if let Ok(dt) = PrimitiveDateTime::parse(s, fmt) {
                return Some(dt.into());
            }
            if let Ok(dt) = OffsetDateTime::parse(s, fmt) {
                return Some(dt.into());
            }
            if let Ok(d) = Date::parse(s, fmt) {
                return Some(ParsedTimestamp { date: d, time: Time::MIDNIGHT, offset: None });
            }
        }
        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
            return Some(dt.into());
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(dt) = PrimitiveDateTime::parse(s, *fmt) {
                return Some(dt.into());
            }
        }
        Date::parse(s, DATE_ONLY)
            .ok()
            .map(|d| ParsedTimestamp { date: d, time: Time::MIDNIGHT, offset: None })
    }
}
