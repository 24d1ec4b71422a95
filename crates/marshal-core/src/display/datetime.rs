//! DateTime display utilities.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

/// Formats a `Timestamp` in the system time zone as
/// `YYYY-MM-DD HH:MM:SS TZ`.
pub struct LocalDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for LocalDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .to_zoned(TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

/// Elapsed time between two timestamps, e.g. `1m 05s` or `850ms`.
pub struct Elapsed<'a>(pub &'a Timestamp, pub &'a Timestamp);

impl fmt::Display for Elapsed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.1.as_millisecond().saturating_sub(self.0.as_millisecond()).max(0);
        let secs = millis / 1000;
        match secs {
            0 => write!(f, "{millis}ms"),
            1..=59 => write!(f, "{secs}s"),
            60..=3599 => write!(f, "{}m {:02}s", secs / 60, secs % 60),
            _ => write!(f, "{}h {:02}m", secs / 3600, (secs % 3600) / 60),
        }
    }
}
