use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A span of seconds between two service-day instants, negative when the
/// subtrahend lies later in the day.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration {
    seconds: i32,
}

impl Duration {
    pub fn seconds(seconds: i32) -> Duration {
        Duration { seconds }
    }

    pub fn minutes(minutes: i32) -> Duration {
        Duration {
            seconds: minutes * 60,
        }
    }

    pub fn as_secs(self) -> i32 {
        self.seconds
    }
}

/// An instant within a service day, counted in whole seconds from the day's
/// start. The count runs past 86,400 for schedules continuing over midnight,
/// so a "25:10:00" departure stays on the service day it belongs to.
///
/// ```rust
/// use journey_search::time::{Duration, Time};
/// let boarding: Time = "09:58:30".parse().unwrap();
/// assert_eq!(boarding + Duration::minutes(2), Time::from_hms(10, 0, 30));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Time {
    seconds_since_midnight: u32,
}

impl Time {
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Time {
        Time {
            seconds_since_midnight: hours * 3600 + minutes * 60 + seconds,
        }
    }

    /// Construct from a count of seconds since the service-day start
    pub fn from_seconds(seconds_since_midnight: u32) -> Time {
        Time {
            seconds_since_midnight,
        }
    }

    /// Seconds since the service-day start, may exceed 86,400
    pub fn seconds(self) -> u32 {
        self.seconds_since_midnight
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    /// The instant shifted by a span; clamps at the service-day start
    /// rather than rolling into the previous day
    fn add(self, rhs: Duration) -> Time {
        let shifted = i64::from(self.seconds_since_midnight) + i64::from(rhs.seconds);
        Time {
            seconds_since_midnight: shifted.max(0) as u32,
        }
    }
}

impl Sub for Time {
    type Output = Duration;

    /// The signed span from `rhs` to `self`, both within one service day
    fn sub(self, rhs: Time) -> Duration {
        Duration::seconds(self.seconds_since_midnight as i32 - rhs.seconds_since_midnight as i32)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock_minutes = self.seconds_since_midnight / 60;
        write!(
            f,
            "{:02}:{:02}:{:02}",
            clock_minutes / 60,
            clock_minutes % 60,
            self.seconds_since_midnight % 60
        )
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Reads the GTFS clock format: three colon-separated fields, minutes and
/// seconds exactly two digits, the hour one to three digits and free to pass
/// 23 for times after midnight.
impl std::str::FromStr for Time {
    type Err = TimeParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut fields = text.split(':');
        let parts = (fields.next(), fields.next(), fields.next(), fields.next());
        let (h, m, s) = match parts {
            (Some(h), Some(m), Some(s), None) => (h, m, s),
            _ => return Err(TimeParseError::new(text)),
        };
        if h.is_empty() || h.len() > 3 || m.len() != 2 || s.len() != 2 {
            return Err(TimeParseError::new(text));
        }
        let field = |digits: &str| -> Result<u32, TimeParseError> {
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TimeParseError::new(text));
            }
            digits.parse().map_err(|_| TimeParseError::new(text))
        };
        let (hours, minutes, seconds) = (field(h)?, field(m)?, field(s)?);
        if minutes > 59 || seconds > 59 {
            return Err(TimeParseError::new(text));
        }
        Ok(Time::from_hms(hours, minutes, seconds))
    }
}

/// The input did not look like a GTFS clock time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a GTFS clock time (expected H:MM:SS, minutes and seconds under 60): {0:?}")]
pub struct TimeParseError(String);

impl TimeParseError {
    fn new(text: &str) -> TimeParseError {
        TimeParseError(text.to_owned())
    }
}
