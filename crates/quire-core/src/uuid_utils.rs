//! UUID v7 and timestamp utilities.
//!
//! Notes and tags use UUIDv7 identifiers, whose leading 48 bits are a
//! millisecond timestamp, so byte-wise id order follows creation order.
//! Timestamps are persisted as integer microseconds.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use quire_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(a < b);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Convert stored microseconds back into a UTC timestamp.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
}

/// Current time truncated to microsecond precision, so a value survives a
/// store/load cycle unchanged.
pub fn now_micros() -> (DateTime<Utc>, i64) {
    let micros = Utc::now().timestamp_micros();
    (micros_to_datetime(micros), micros)
}
