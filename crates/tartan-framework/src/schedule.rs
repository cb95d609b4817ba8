//! Schedules for time-based actions.
//!
//! A [`Schedule`] is an interval plus an optional wall-clock anchor:
//!
//! | Schedule | Fires |
//! |----------|-------|
//! | `every(5, Minutes)` | 5 minutes after start, then every 5 minutes |
//! | `every(1, Days).at(09:30)` | next 09:30, then every day at 09:30 |
//! | `weekly_on(Monday).at(10:00)` | next Monday 10:00, then every week |
//!
//! Anchored schedules are evaluated in a [`TimeLocation`]. Local times that
//! do not exist (DST gaps) roll forward one hour; ambiguous local times fire
//! at the earliest instant.

use std::fmt;

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Invalid schedule or time zone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The interval was zero.
    #[error("schedule interval must be at least 1")]
    ZeroInterval,

    /// A wall-clock time was set on a sub-daily schedule.
    #[error("a time of day only applies to day or week schedules, not {unit}")]
    AtTimeNeedsDays {
        /// The offending unit.
        unit: TimeUnit,
    },

    /// The time of day could not be parsed.
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    /// The time zone name is not a known IANA zone.
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
}

// =============================================================================
// TimeUnit
// =============================================================================

/// Unit of a schedule interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Calendar days.
    Days,
    /// Calendar weeks.
    Weeks,
}

impl TimeUnit {
    fn singular(self) -> &'static str {
        match self {
            Self::Seconds => "second",
            Self::Minutes => "minute",
            Self::Hours => "hour",
            Self::Days => "day",
            Self::Weeks => "week",
        }
    }

    fn is_calendar(self) -> bool {
        matches!(self, Self::Days | Self::Weeks)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.singular())
    }
}

// =============================================================================
// TimeLocation
// =============================================================================

/// The zone anchored schedules are evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeLocation {
    /// The host's local zone.
    #[default]
    Local,
    /// An IANA zone.
    Zone(Tz),
}

impl TimeLocation {
    /// Parses `Local` or an IANA zone name such as `America/Los_Angeles`.
    pub fn parse(name: &str) -> Result<Self, ScheduleError> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        name.parse::<Tz>()
            .map(Self::Zone)
            .map_err(|_| ScheduleError::UnknownTimeZone(name.to_string()))
    }

    /// Wall-clock time of `instant` in this zone.
    pub fn naive_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => instant.with_timezone(&chrono::Local).naive_local(),
            Self::Zone(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// The instant a wall-clock time denotes in this zone.
    pub fn resolve(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Local => resolve_in(&chrono::Local, local),
            Self::Zone(tz) => resolve_in(tz, local),
        }
    }
}

impl fmt::Display for TimeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("Local"),
            Self::Zone(tz) => f.write_str(tz.name()),
        }
    }
}

fn resolve_in<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = local;
    // No real-world gap is longer than a few hours.
    for _ in 0..4 {
        match zone.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(a, b) => return a.min(b).with_timezone(&Utc),
            LocalResult::None => candidate += TimeDelta::hours(1),
        }
    }
    Utc.from_utc_datetime(&local)
}

// =============================================================================
// Schedule
// =============================================================================

/// When a scheduled action fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    interval: u32,
    unit: TimeUnit,
    weekday: Option<Weekday>,
    at_time: Option<NaiveTime>,
}

impl Schedule {
    /// Fires every `interval` `unit`s.
    pub fn every(interval: u32, unit: TimeUnit) -> Self {
        Self {
            interval,
            unit,
            weekday: None,
            at_time: None,
        }
    }

    /// Fires every week on `weekday`.
    pub fn weekly_on(weekday: Weekday) -> Self {
        Self::every(1, TimeUnit::Weeks).on(weekday)
    }

    /// Anchors to a weekday. Forces the unit to weeks.
    pub fn on(mut self, weekday: Weekday) -> Self {
        self.unit = TimeUnit::Weeks;
        self.weekday = Some(weekday);
        self
    }

    /// Anchors to a wall-clock time.
    pub fn at(mut self, time: NaiveTime) -> Self {
        self.at_time = Some(time);
        self
    }

    /// Anchors to a wall-clock time given as `HH:MM`.
    pub fn at_str(self, time: &str) -> Result<Self, ScheduleError> {
        let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| ScheduleError::InvalidTime(time.to_string()))?;
        Ok(self.at(parsed))
    }

    /// Checks the schedule is well formed.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.interval == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        if self.at_time.is_some() && !self.unit.is_calendar() {
            return Err(ScheduleError::AtTimeNeedsDays { unit: self.unit });
        }
        Ok(())
    }

    /// The interval count.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// The interval unit.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// The weekday anchor, if any.
    pub fn weekday(&self) -> Option<Weekday> {
        self.weekday
    }

    /// The wall-clock anchor, if any.
    pub fn at_time(&self) -> Option<NaiveTime> {
        self.at_time
    }

    fn is_anchored(&self) -> bool {
        self.weekday.is_some() || self.at_time.is_some()
    }

    fn period(&self) -> TimeDelta {
        let n = i64::from(self.interval.max(1));
        match self.unit {
            TimeUnit::Seconds => TimeDelta::seconds(n),
            TimeUnit::Minutes => TimeDelta::minutes(n),
            TimeUnit::Hours => TimeDelta::hours(n),
            TimeUnit::Days => TimeDelta::days(n),
            TimeUnit::Weeks => TimeDelta::weeks(n),
        }
    }

    fn day_step(&self) -> i64 {
        let n = i64::from(self.interval.max(1));
        match self.unit {
            TimeUnit::Weeks => 7 * n,
            _ => n,
        }
    }

    /// First firing strictly after `start`.
    pub fn first_after(&self, start: DateTime<Utc>, location: &TimeLocation) -> DateTime<Utc> {
        if !self.is_anchored() {
            return start + self.period();
        }

        let at = self.at_time.unwrap_or(NaiveTime::MIN);
        let mut date = location.naive_local(start).date();
        let step = match self.weekday {
            Some(weekday) => {
                let ahead = (7 + weekday.num_days_from_monday()
                    - date.weekday().num_days_from_monday())
                    % 7;
                date += TimeDelta::days(i64::from(ahead));
                7
            }
            None => 1,
        };

        loop {
            let candidate = location.resolve(date.and_time(at));
            if candidate > start {
                return candidate;
            }
            date += TimeDelta::days(step);
        }
    }

    /// Firing that follows `previous`.
    pub fn next_after(&self, previous: DateTime<Utc>, location: &TimeLocation) -> DateTime<Utc> {
        if !self.is_anchored() {
            return previous + self.period();
        }

        let at = self.at_time.unwrap_or(NaiveTime::MIN);
        let date = location.naive_local(previous).date() + TimeDelta::days(self.day_step());
        location.resolve(date.and_time(at))
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.weekday, self.interval) {
            (Some(day), 1) => write!(f, "Every {}", weekday_name(day))?,
            (Some(day), n) => write!(f, "Every {n} weeks on {}", weekday_name(day))?,
            (None, 1) => write!(f, "Every {}", self.unit.singular())?,
            (None, n) => write!(f, "Every {n} {}", self.unit)?,
        }
        if let Some(at) = self.at_time {
            write!(f, " at {}", at.format("%H:%M"))?;
        }
        Ok(())
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn la() -> TimeLocation {
        TimeLocation::parse("America/Los_Angeles").unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_weekly_monday_fires_at_local_ten_across_dst() {
        let schedule = Schedule::weekly_on(Weekday::Mon).at_str("10:00").unwrap();
        let location = la();

        // Monday 2026-10-19 10:00 PDT exactly: strictly after means next week.
        let mut fire = schedule.first_after(utc("2026-10-19T17:00:00Z"), &location);
        assert_eq!(fire, utc("2026-10-26T17:00:00Z"));

        for _ in 0..100 {
            let local = location.naive_local(fire);
            assert_eq!(local.weekday(), Weekday::Mon);
            assert_eq!((local.hour(), local.minute()), (10, 0));
            let next = schedule.next_after(fire, &location);
            assert!(next > fire);
            fire = next;
        }

        // After the November switch the offset is -08:00.
        let after_dst = schedule.next_after(utc("2026-10-26T17:00:00Z"), &location);
        assert_eq!(after_dst, utc("2026-11-02T18:00:00Z"));
    }

    #[test]
    fn test_daily_at_time_in_gap_rolls_forward() {
        let schedule = Schedule::every(1, TimeUnit::Days).at_str("02:30").unwrap();
        let location = la();
        // 2026-03-08 02:30 does not exist in Los Angeles.
        let fire = schedule.first_after(utc("2026-03-08T09:00:00Z"), &location);
        assert_eq!(fire, utc("2026-03-08T10:30:00Z"));
        assert_eq!(location.naive_local(fire).hour(), 3);
    }

    #[test]
    fn test_ambiguous_local_time_picks_earliest() {
        let schedule = Schedule::every(1, TimeUnit::Days).at_str("01:30").unwrap();
        let fire = schedule.first_after(utc("2026-11-01T07:00:00Z"), &la());
        assert_eq!(fire, utc("2026-11-01T08:30:00Z"));
    }

    #[test]
    fn test_unanchored_intervals() {
        let start = utc("2026-01-01T00:00:00Z");
        let schedule = Schedule::every(5, TimeUnit::Minutes);
        let first = schedule.first_after(start, &TimeLocation::Local);
        assert_eq!(first, utc("2026-01-01T00:05:00Z"));
        assert_eq!(
            schedule.next_after(first, &TimeLocation::Local),
            utc("2026-01-01T00:10:00Z")
        );
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Schedule::every(0, TimeUnit::Seconds).validate(),
            Err(ScheduleError::ZeroInterval)
        );
        let bad = Schedule::every(2, TimeUnit::Hours).at_str("10:00").unwrap();
        assert_eq!(
            bad.validate(),
            Err(ScheduleError::AtTimeNeedsDays {
                unit: TimeUnit::Hours
            })
        );
        assert!(Schedule::every(1, TimeUnit::Days).at_str("25:00").is_err());
        assert!(TimeLocation::parse("Mars/Olympus_Mons").is_err());
        assert_eq!(TimeLocation::parse("Local").unwrap(), TimeLocation::Local);
    }

    #[test]
    fn test_display() {
        let weekly = Schedule::weekly_on(Weekday::Mon).at_str("10:00").unwrap();
        assert_eq!(weekly.to_string(), "Every Monday at 10:00");
        assert_eq!(
            Schedule::every(2, TimeUnit::Weeks)
                .on(Weekday::Fri)
                .to_string(),
            "Every 2 weeks on Friday"
        );
        assert_eq!(Schedule::every(1, TimeUnit::Hours).to_string(), "Every hour");
        assert_eq!(
            Schedule::every(3, TimeUnit::Days)
                .at_str("09:30")
                .unwrap()
                .to_string(),
            "Every 3 days at 09:30"
        );
    }
}
