//! The fixed multi-day challenge window.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::Serialize;

/// Where `now` falls relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "day", rename_all = "camelCase")]
pub enum WindowPhase {
    NotStarted,
    /// Zero-based day index.
    Day(u32),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DayState {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStatus {
    pub index: u32,
    pub date: NaiveDate,
    pub label: String,
    pub state: DayState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowView {
    pub start: NaiveDate,
    pub length_days: u32,
    pub phase: WindowPhase,
    pub days: Vec<DayStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeWindow {
    start: NaiveDate,
    length_days: u32,
}

impl ChallengeWindow {
    pub fn new(start: NaiveDate, length_days: u32) -> Self {
        Self {
            start,
            length_days: length_days.max(1),
        }
    }

    /// Window starting on the Monday of the week containing `today`.
    pub fn starting_this_week(today: NaiveDate, length_days: u32) -> Self {
        let back = today.weekday().num_days_from_monday() as i64;
        Self::new(today - Duration::days(back), length_days)
    }

    /// Midnight UTC on the first day.
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        let elapsed = (now.date_naive() - self.start).num_days();
        if elapsed < 0 {
            WindowPhase::NotStarted
        } else if elapsed >= self.length_days as i64 {
            WindowPhase::Finished
        } else {
            WindowPhase::Day(elapsed as u32)
        }
    }

    pub fn days(&self, now: DateTime<Utc>) -> Vec<DayStatus> {
        let phase = self.phase(now);
        (0..self.length_days)
            .map(|index| {
                let date = self.start + Duration::days(index as i64);
                let state = match phase {
                    WindowPhase::NotStarted => DayState::Upcoming,
                    WindowPhase::Finished => DayState::Completed,
                    WindowPhase::Day(current) if index < current => DayState::Completed,
                    WindowPhase::Day(current) if index == current => DayState::Current,
                    WindowPhase::Day(_) => DayState::Upcoming,
                };
                DayStatus {
                    index,
                    date,
                    label: weekday_label(date.weekday()).to_string(),
                    state,
                }
            })
            .collect()
    }

    pub fn view(&self, now: DateTime<Utc>) -> WindowView {
        WindowView {
            start: self.start,
            length_days: self.length_days,
            phase: self.phase(now),
            days: self.days(now),
        }
    }
}

fn weekday_label(day: Weekday) -> &'static str {
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
