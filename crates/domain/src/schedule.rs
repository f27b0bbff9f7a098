use chrono::{DateTime, Datelike, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A single `[start_minute, end_minute)` pause window within one day.
/// `start` in `[0, 1439]`, `end` in `[0, 1440]`, `end >= start` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DayInterval {
    pub start_minute: u16,
    pub end_minute: u16,
}

impl DayInterval {
    pub fn new(start_minute: u16, end_minute: u16) -> Option<Self> {
        if start_minute > 1439 || end_minute > 1440 || end_minute < start_minute {
            return None;
        }
        Some(Self {
            start_minute,
            end_minute,
        })
    }

    fn contains(&self, minute_of_day: u16) -> bool {
        minute_of_day >= self.start_minute && minute_of_day < self.end_minute
    }
}

/// Per-day (Sunday=0..Saturday=6) parental-control pause intervals.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WeeklySchedule {
    /// Index 0 = Sunday, ... 6 = Saturday.
    pub days: [Vec<DayInterval>; 7],
    pub timezone: Option<String>,
}

impl WeeklySchedule {
    /// Returns true when parental control is paused at `now`, evaluated in
    /// the schedule's configured timezone (falling back to UTC).
    pub fn is_paused(&self, now: DateTime<chrono::Utc>) -> bool {
        let tz: Tz = self
            .timezone
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(Tz::UTC);
        let local = tz.from_utc_datetime(&now.naive_utc());
        let weekday = local.weekday().num_days_from_sunday() as usize;
        let minute_of_day = (local.hour() * 60 + local.minute()) as u16;

        self.days[weekday]
            .iter()
            .any(|interval| interval.contains(minute_of_day))
    }
}
