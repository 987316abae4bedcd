use crate::config::Compression;
use crate::date::ShardKey;
use anyhow::Result;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `<prefix>-<YYYY-MM-DD>[.zst]`
pub fn shard_path(prefix: &Path, key: ShardKey, compression: Compression) -> PathBuf {
    let mut s: OsString = prefix.as_os_str().to_os_string();
    s.push("-");
    s.push(key.to_string());
    s.push(compression.suffix());
    PathBuf::from(s)
}

/// `<prefix>.rejected[.zst]`: skipped lines, verbatim.
pub fn rejects_path(prefix: &Path, compression: Compression) -> PathBuf {
    let mut s: OsString = prefix.as_os_str().to_os_string();
    s.push(".rejected");
    s.push(compression.suffix());
    PathBuf::from(s)
}

/// True when the input should be decoded as a zstd stream.
pub fn is_zstd_path(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "zst")
}

/// Derive an output prefix from a rotated log name by dropping trailing
/// `.json`/`.jsonl`/`.ndjson`/`.log`, a rotation number and `.zst`:
/// `logs/app.json.1` -> `logs/app`. Names that would become empty are kept.
pub fn default_output_prefix(input: &Path) -> Result<PathBuf> {
    let re = Regex::new(r"(\.(jsonl?|ndjson|log))?(\.\d+)?(\.zst)?$")?;
    let name = match input.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return Ok(input.to_path_buf()),
    };
    let stem = re.replace(name, "");
    if stem.is_empty() {
        return Ok(input.to_path_buf());
    }
    Ok(input.with_file_name(stem.as_ref()))
}
