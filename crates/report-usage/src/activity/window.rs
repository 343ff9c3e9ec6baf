//! UTC time windows for activity log queries.

use chrono::{DateTime, Duration, NaiveTime, SubsecRound, Utc};

use crate::error::WindowError;

/// How far back the activity log keeps events.
pub const RETENTION_DAYS: i64 = 30;

/// Timestamp layout the activity API expects (second precision, UTC).
const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A `[start, end]` query window with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// # Errors
    ///
    /// Returns [`WindowError::Inverted`] unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Inverted {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// The window `[now - days, now]`, truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::Empty`] when `days` is zero.
    pub fn trailing(days: u32, now: DateTime<Utc>) -> Result<Self, WindowError> {
        if days == 0 {
            return Err(WindowError::Empty);
        }
        let end = now.trunc_subsecs(0);
        Self::new(end - Duration::days(i64::from(days)), end)
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True when part of the window lies beyond the retention horizon.
    /// Such a window still works, it just returns incomplete results.
    #[must_use]
    pub fn exceeds_retention(&self, now: DateTime<Utc>) -> bool {
        self.start < now - Duration::days(RETENTION_DAYS)
    }

    /// Split the window at UTC midnight.
    ///
    /// A slice that reaches midnight ends one millisecond before it so that
    /// its start and end fall on the same UTC day.
    #[must_use]
    pub fn daily_slices(&self) -> Vec<TimeWindow> {
        let mut slices = Vec::new();
        let mut cursor = self.start;

        while cursor < self.end {
            let next_midnight = (cursor.date_naive() + Duration::days(1))
                .and_time(NaiveTime::MIN)
                .and_utc();
            let slice_end = if self.end < next_midnight {
                self.end
            } else {
                next_midnight - Duration::milliseconds(1)
            };
            if cursor < slice_end {
                slices.push(TimeWindow {
                    start: cursor,
                    end: slice_end,
                });
            }
            cursor = next_midnight;
        }

        slices
    }

    /// `startDateTime` / `endDateTime` query parameters, single-quoted.
    #[must_use]
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("startDateTime", Self::quote(self.start)),
            ("endDateTime", Self::quote(self.end)),
        ]
    }

    fn quote(at: DateTime<Utc>) -> String {
        format!("'{}'", at.format(QUERY_FORMAT))
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format(QUERY_FORMAT),
            self.end.format(QUERY_FORMAT)
        )
    }
}
