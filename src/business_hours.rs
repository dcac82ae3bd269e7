use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("weekly schedule is missing weekday index {0}")]
    MissingDay(u8),
    #[error("weekday index {0} is outside 0..=6")]
    UnknownDay(u8),
    #[error("invalid clock time '{0}' (expected HH:MM between 00:00 and 24:00)")]
    InvalidClockTime(String),
    #[error("{day} window ends at {end}, which is not after its start {start}")]
    InvertedWindow {
        day: Weekday,
        start: ClockTime,
        end: ClockTime,
    },
}

/// Wall-clock time of day with minute precision.
///
/// `24:00` is accepted and denotes the midnight that ends the day, so a
/// `00:00-24:00` window covers a whole calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime { hour: 0, minute: 0 };
    pub const END_OF_DAY: ClockTime = ClockTime {
        hour: 24,
        minute: 0,
    };

    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if minute > 59 || hour > 24 || (hour == 24 && minute != 0) {
            return Err(ScheduleError::InvalidClockTime(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_from_midnight(&self) -> i64 {
        i64::from(self.hour) * 60 + i64::from(self.minute)
    }

    /// Combine with a calendar day. `24:00` rolls over to the next midnight.
    /// `None` past the last representable day.
    pub fn on(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        date.and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::minutes(self.minutes_from_midnight()))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidClockTime(s.to_string());
        let (hour_s, minute_s) = s.trim().split_once(':').ok_or_else(invalid)?;
        let all_digits =
            |part: &str| !part.is_empty() && part.len() <= 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(hour_s) || !all_digits(minute_s) {
            return Err(invalid());
        }
        let hour: u8 = hour_s.parse().map_err(|_| invalid())?;
        let minute: u8 = minute_s.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Working window for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub active: bool,
    pub start: ClockTime,
    pub end: ClockTime,
}

impl DaySchedule {
    pub fn open(start: ClockTime, end: ClockTime) -> Self {
        Self {
            active: true,
            start,
            end,
        }
    }

    pub fn closed(start: ClockTime, end: ClockTime) -> Self {
        Self {
            active: false,
            start,
            end,
        }
    }

    pub fn full_day() -> Self {
        Self::open(ClockTime::MIDNIGHT, ClockTime::END_OF_DAY)
    }

    /// Nominal hours of work this weekday; zero when inactive or inverted.
    pub fn nominal_hours(&self) -> f64 {
        if !self.active {
            return 0.0;
        }
        let minutes = self.end.minutes_from_midnight() - self.start.minutes_from_midnight();
        minutes.max(0) as f64 / 60.0
    }
}

/// Seven day schedule indexed by weekday, Sunday = 0 through Saturday = 6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<u8, DaySchedule>",
    into = "BTreeMap<u8, DaySchedule>"
)]
pub struct WeeklySchedule {
    days: [DaySchedule; 7],
}

impl Default for WeeklySchedule {
    /// Monday to Friday, 09:00-17:00.
    fn default() -> Self {
        let nine = ClockTime { hour: 9, minute: 0 };
        let five = ClockTime {
            hour: 17,
            minute: 0,
        };
        let mut days = [DaySchedule::open(nine, five); 7];
        days[weekday_index(Weekday::Sun) as usize] = DaySchedule::closed(nine, five);
        days[weekday_index(Weekday::Sat) as usize] = DaySchedule::closed(nine, five);
        Self { days }
    }
}

impl WeeklySchedule {
    pub const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    /// Build from an array already ordered Sunday first.
    pub fn new(days: [DaySchedule; 7]) -> Self {
        Self { days }
    }

    /// Every weekday gets the same window.
    pub fn uniform(day: DaySchedule) -> Self {
        Self { days: [day; 7] }
    }

    /// Build from `(weekday index, day)` pairs. All seven indices must be present;
    /// a repeated index keeps the last entry.
    pub fn from_days<I>(entries: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = (u8, DaySchedule)>,
    {
        let mut slots: [Option<DaySchedule>; 7] = [None; 7];
        for (index, day) in entries {
            let slot = slots
                .get_mut(usize::from(index))
                .ok_or(ScheduleError::UnknownDay(index))?;
            *slot = Some(day);
        }

        let mut days = [DaySchedule::full_day(); 7];
        for (index, slot) in slots.iter().enumerate() {
            days[index] = slot.ok_or(ScheduleError::MissingDay(index as u8))?;
        }
        Ok(Self { days })
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday_index(weekday) as usize]
    }

    pub fn set_day(&mut self, weekday: Weekday, day: DaySchedule) {
        self.days[weekday_index(weekday) as usize] = day;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &DaySchedule)> {
        Self::ALL_WEEKDAYS.iter().copied().zip(self.days.iter())
    }

    /// Reject active days whose window does not end after it starts.
    /// The calculator tolerates such days; this is for settings that are about to be stored.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (weekday, day) in self.iter() {
            if day.active && day.end <= day.start {
                return Err(ScheduleError::InvertedWindow {
                    day: weekday,
                    start: day.start,
                    end: day.end,
                });
            }
        }
        Ok(())
    }

    pub fn weekly_hours(&self) -> f64 {
        self.days.iter().map(DaySchedule::nominal_hours).sum()
    }
}

impl TryFrom<BTreeMap<u8, DaySchedule>> for WeeklySchedule {
    type Error = ScheduleError;

    fn try_from(value: BTreeMap<u8, DaySchedule>) -> Result<Self, Self::Error> {
        Self::from_days(value)
    }
}

impl From<WeeklySchedule> for BTreeMap<u8, DaySchedule> {
    fn from(value: WeeklySchedule) -> Self {
        value
            .days
            .iter()
            .enumerate()
            .map(|(index, day)| (index as u8, *day))
            .collect()
    }
}

/// Weekday index used by persisted schedules (Sunday = 0).
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

pub fn weekday_from_index(index: u8) -> Result<Weekday, ScheduleError> {
    WeeklySchedule::ALL_WEEKDAYS
        .get(usize::from(index))
        .copied()
        .ok_or(ScheduleError::UnknownDay(index))
}

/// Hours of working time inside `[start, end)` under `schedule`, using the
/// calendar of the time zone the instants carry.
///
/// Walks calendar days from `start`'s day, clipping each active day's window to
/// the range. Returns 0 when `end <= start`. Never fails: inactive days, windows
/// whose end precedes their start and windows chrono cannot represent contribute nothing.
pub fn working_hours_elapsed<Tz: TimeZone>(
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    schedule: &WeeklySchedule,
) -> f64 {
    if end <= start {
        return 0.0;
    }

    let tz = start.timezone();
    let mut total = Duration::zero();
    let mut current = start.clone();

    while current < *end {
        let date = current.date_naive();
        let day = schedule.day(date.weekday());

        if day.active {
            let work_start = day.start.on(date).and_then(|at| resolve_local(&tz, at));
            // A window end past chrono's last day still covers everything before `end`.
            let work_end = match day.end.on(date) {
                Some(at) => resolve_local(&tz, at),
                None => Some(end.clone()),
            };
            if let (Some(work_start), Some(work_end)) = (work_start, work_end) {
                let effective_start = current.clone().max(work_start);
                let effective_end = end.clone().min(work_end);
                if effective_end > effective_start {
                    total += effective_end - effective_start;
                }
            }
        }

        let Some(next) = date
            .succ_opt()
            .and_then(|next_day| resolve_local(&tz, next_day.and_time(NaiveTime::MIN)))
        else {
            break;
        };
        if next <= current {
            break;
        }
        current = next;
    }

    total.num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Same as [`working_hours_elapsed`] for epoch-millisecond instants, read in the
/// process's local time zone. Timestamps chrono cannot represent yield 0.
pub fn working_hours_between_millis(start_ms: i64, end_ms: i64, schedule: &WeeklySchedule) -> f64 {
    match (
        Local.timestamp_millis_opt(start_ms).single(),
        Local.timestamp_millis_opt(end_ms).single(),
    ) {
        (Some(start), Some(end)) => working_hours_elapsed(&start, &end, schedule),
        _ => 0.0,
    }
}

/// Render hours as `"Xh Ym"`, carrying a rounded 60 minutes into the hour.
pub fn format_duration(hours: f64) -> String {
    if !hours.is_finite() || hours <= 0.0 {
        return "0h 0m".to_string();
    }
    let mut whole = hours.floor() as i64;
    let mut minutes = ((hours - hours.floor()) * 60.0).round() as i64;
    if minutes == 60 {
        whole += 1;
        minutes = 0;
    }
    format!("{whole}h {minutes}m")
}

// Nonexistent local times (DST gaps) move forward an hour; ambiguous ones take the earlier instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        })
}
