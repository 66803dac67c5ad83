//! Timeout conversions.
//!
//! Kernel wait calls take their timeout either as a `(seconds,
//! nanoseconds)` pair (kqueue) or as a millisecond count (epoll, poll,
//! WSAPoll). Millisecond conversions round up so a wait never ends
//! before the requested duration has elapsed.

use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u128 = 1_000_000;

/// Builds a select timeout from a floating-point number of seconds.
///
/// The value is split into whole seconds and a sub-second remainder.
/// The remainder is rounded to the nearest nanosecond, carrying into the
/// seconds when it reaches a full second.
///
/// Zero, negative values, NaN and anything that rounds to zero yield
/// [`Duration::ZERO`], which means a non-blocking poll. Values too large to represent saturate to
/// [`Duration::MAX`].
///
/// # Examples
///
/// ```
/// use fdselect::timeout::secs_f64;
/// use std::time::Duration;
///
/// assert_eq!(secs_f64(2.5), Duration::from_millis(2500));
/// assert_eq!(secs_f64(-1.0), Duration::ZERO);
/// ```
pub fn secs_f64(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }

    if seconds >= u64::MAX as f64 {
        return Duration::MAX;
    }

    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * NANOS_PER_SEC as f64).round() as u64;
    let whole = whole as u64;

    if nanos >= NANOS_PER_SEC {
        return match whole.checked_add(1) {
            Some(secs) => Duration::new(secs, 0),
            None => Duration::MAX,
        };
    }

    Duration::new(whole, nanos as u32)
}

/// Converts a timeout to the millisecond argument of `epoll_wait`,
/// `poll` and `WSAPoll`.
///
/// `None` becomes `-1` (block indefinitely). Durations are rounded up to
/// the next millisecond and clamped to `i32::MAX`.
pub fn to_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(timeout) => {
            let millis = timeout.as_nanos().div_ceil(NANOS_PER_MILLI);
            millis.min(i32::MAX as u128) as i32
        }
    }
}

/// Converts a timeout to the `timespec` taken by `kevent`.
///
/// Seconds beyond the range of `time_t` saturate.
#[cfg(unix)]
pub fn to_timespec(timeout: Duration) -> libc::timespec {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };

    ts.tv_sec = timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t;
    ts.tv_nsec = timeout.subsec_nanos() as _;

    ts
}
