//! Utility functions used by Gander, and available when configuring load tests.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use url::Url;

use crate::{GanderError, CANCELED};

lazy_static! {
    static ref TIMESPAN: Regex =
        Regex::new(r"((?P<hours>\d+?)h)?((?P<minutes>\d+?)m)?((?P<seconds>\d+?)s)?")
            .expect("failed to compile timespan regex");
}

/// Parse a string representing a time span and return the number of seconds.
///
/// Can be specified as an integer, indicating seconds. Or can use integers
/// together with one or more of "h", "m", and "s", in that order, indicating
/// "hours", "minutes", and "seconds".
///
/// Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// // 1 hour 2 minutes and 3 seconds is 3,723 seconds.
/// assert_eq!(util::parse_timespan("1h2m3s"), 3_723);
///
/// // 45 seconds is 45 seconds.
/// assert_eq!(util::parse_timespan("45"), 45);
///
/// // Invalid value is 0 seconds.
/// assert_eq!(util::parse_timespan("foo"), 0);
/// ```
pub fn parse_timespan(time_str: &str) -> usize {
    if let Ok(t) = usize::from_str(time_str) {
        trace!("{} is integer: {} seconds", time_str, t);
        return t;
    }

    let time_matches = match TIMESPAN.captures(time_str) {
        Some(captures) => captures,
        None => return 0,
    };
    let component = |name: &str| -> usize {
        time_matches
            .name(name)
            .and_then(|m| usize::from_str(m.as_str()).ok())
            .unwrap_or(0)
    };
    let hours = component("hours");
    let minutes = component("minutes");
    let seconds = component("seconds");
    let total = hours * 60 * 60 + minutes * 60 + seconds;
    trace!(
        "{} hours {} minutes {} seconds: {} seconds",
        hours,
        minutes,
        seconds,
        total
    );
    total
}

/// Sleep for a specified duration, minus the time spent doing other things.
///
/// Returns a fresh drift timer to be passed in on the next call.
pub async fn sleep_minus_drift(
    duration: std::time::Duration,
    drift: tokio::time::Instant,
) -> tokio::time::Instant {
    match duration.checked_sub(drift.elapsed()) {
        Some(delay) if delay.as_nanos() > 0 => tokio::time::sleep(delay).await,
        _ => debug!("sleep_minus_drift: drift was greater than or equal to duration, not sleeping"),
    };
    tokio::time::Instant::now()
}

/// Calculate median for a BTreeMap of usizes.
///
/// The list is comprised of two parts: the integer value on the left, and the number
/// of occurrences of the integer on the right. For example (5, 1) indicates that the
/// integer "5" is included 1 time.
///
/// Values are rounded when they are recorded, so the result is clamped to the real
/// `min` and `max` seen.
///
/// # Example
/// ```rust
/// use std::collections::BTreeMap;
/// use gander::util;
///
/// let mut btree: BTreeMap<usize, usize> = BTreeMap::new();
/// btree.insert(7, 5);
/// btree.insert(8, 1);
/// btree.insert(13, 21);
/// btree.insert(19, 44);
/// btree.insert(21, 5);
///
/// // Median (middle) value in this list of 76 integers is 19.
/// assert_eq!(util::median(&btree, 76, 7, 21), 19);
/// ```
pub fn median(
    btree: &BTreeMap<usize, usize>,
    total_elements: usize,
    min: usize,
    max: usize,
) -> usize {
    let mut total_count: usize = 0;
    let half_elements: usize = (total_elements as f64 / 2.0).round() as usize;
    for (value, counter) in btree {
        total_count += counter;
        if total_count >= half_elements {
            return (*value).clamp(min, max.max(min));
        }
    }
    0
}

/// Truncate strings when they're too long to display.
///
/// If a string is longer than the specified max length, this function removes extra
/// the characters and replaces the last two with a double-period ellipsis.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// assert_eq!(util::truncate_string("READ_UNEXPECTED", 10), "READ_UNE..");
/// ```
pub fn truncate_string(str_to_truncate: &str, max_length: usize) -> String {
    if str_to_truncate.chars().count() > max_length {
        let truncated: String = str_to_truncate
            .chars()
            .take(max_length.saturating_sub(2))
            .collect();
        format!("{}..", truncated)
    } else {
        str_to_truncate.to_string()
    }
}

/// Helper function to determine if a host can be parsed.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// assert!(util::is_valid_host("http://localhost:8080/").is_ok());
///
/// // Protocol is required
/// assert!(util::is_valid_host("localhost:8080").is_err());
/// ```
pub fn is_valid_host(host: &str) -> Result<bool, GanderError> {
    let url = Url::parse(host).map_err(|parse_error| GanderError::InvalidHost {
        host: host.to_string(),
        detail: "Invalid host.".to_string(),
        parse_error,
    })?;
    if url.cannot_be_a_base() {
        return Err(GanderError::InvalidHost {
            host: host.to_string(),
            detail: "Host can not be used as a base URL.".to_string(),
            parse_error: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        });
    }
    Ok(true)
}

// Internal helper to configure the control-c handler. Drain cleanly on the first
// ctrl-c. Exit abruptly on the second ctrl-c.
pub(crate) fn setup_ctrlc_handler() {
    match ctrlc::set_handler(move || {
        if CANCELED.swap(true, Ordering::SeqCst) {
            warn!("caught another ctrl-c, exiting immediately...");
            std::process::exit(1);
        } else {
            warn!("caught ctrl-c, draining...");
        }
    }) {
        Ok(_) => (),
        Err(e) => {
            // The handler can only be registered once per process, reset the flag so
            // consecutive load tests in the same process start clean.
            CANCELED.store(false, Ordering::SeqCst);
            debug!("reusing ctrl-c handler: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespan() {
        assert_eq!(parse_timespan("0"), 0);
        assert_eq!(parse_timespan("foo"), 0);
        assert_eq!(parse_timespan("1"), 1);
        assert_eq!(parse_timespan("1s"), 1);
        assert_eq!(parse_timespan("10s"), 10);
        assert_eq!(parse_timespan("1m"), 60);
        assert_eq!(parse_timespan("1m1s"), 61);
        assert_eq!(parse_timespan("10m5s"), 605);
        assert_eq!(parse_timespan("1h"), 3600);
        assert_eq!(parse_timespan("1h5m13s"), 3913);
        assert_eq!(parse_timespan("24h"), 86400);
    }

    #[test]
    fn median_test() {
        let mut btree: BTreeMap<usize, usize> = BTreeMap::new();
        btree.insert(1, 1);
        btree.insert(2, 1);
        btree.insert(3, 1);
        assert_eq!(median(&btree, 3, 1, 3), 2);
        assert_eq!(median(&btree, 3, 3, 3), 3);

        // Rounded values are clamped to the real minimum and maximum.
        let mut btree: BTreeMap<usize, usize> = BTreeMap::new();
        btree.insert(100, 3);
        btree.insert(210, 1);
        btree.insert(240, 1);
        assert_eq!(median(&btree, 5, 101, 243), 101);

        // Nothing recorded.
        let btree: BTreeMap<usize, usize> = BTreeMap::new();
        assert_eq!(median(&btree, 0, 0, 0), 0);
    }

    #[test]
    fn truncate() {
        assert_eq!(truncate_string("DELETE_403", 24), "DELETE_403");
        assert_eq!(truncate_string("abcde", 4), "ab..");
        assert_eq!(truncate_string("abcde", 2), "..");
        assert_eq!(truncate_string("これはテストだ", 3), "こ..");
    }

    #[test]
    fn valid_host() {
        assert!(is_valid_host("http://example.com").is_ok());
        assert!(is_valid_host("http://127.0.0.1:8080/").is_ok());
        assert!(is_valid_host("example.com").is_err());
        assert!(is_valid_host("/path/to/file").is_err());
        assert!(is_valid_host("http://").is_err());
        assert!(is_valid_host("mailto:admin@example.com").is_err());
    }
}
