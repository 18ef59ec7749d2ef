//! Windows FILETIME <-> `chrono` conversion. Grounded on the teacher's
//! `formatters/src/ntfs/structures.rs::filetime_to_unix`, but kept at full
//! 100ns precision via `chrono` instead of truncating to whole seconds -
//! forensic callers care about the sub-second part of a timestamp.

use chrono::{DateTime, TimeZone, Utc};

/// 100-nanosecond intervals between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_DIFF_100NS: i64 = 116_444_736_000_000_000;
const HUNDRED_NS_PER_SECOND: i64 = 10_000_000;

/// Converts a raw NTFS FILETIME (100ns ticks since 1601-01-01) into a UTC
/// timestamp. Out-of-range values (before the Unix epoch, or too far in
/// the future for `chrono`) clamp to `None` rather than panicking, since
/// these fields come straight off an untrusted image.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let ticks_since_unix_epoch = filetime as i64 - FILETIME_EPOCH_DIFF_100NS;
    let seconds = ticks_since_unix_epoch.div_euclid(HUNDRED_NS_PER_SECOND);
    let remainder_100ns = ticks_since_unix_epoch.rem_euclid(HUNDRED_NS_PER_SECOND);
    let nanos = (remainder_100ns * 100) as u32;
    Utc.timestamp_opt(seconds, nanos).single()
}

pub fn datetime_to_filetime(dt: DateTime<Utc>) -> u64 {
    let seconds = dt.timestamp();
    let nanos = dt.timestamp_subsec_nanos();
    let ticks = seconds * HUNDRED_NS_PER_SECOND + (nanos / 100) as i64;
    (ticks + FILETIME_EPOCH_DIFF_100NS) as u64
}
