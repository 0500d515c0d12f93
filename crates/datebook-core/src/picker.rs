//! Scroll-wheel style time and date selectors.
//!
//! Each wheel is seeded once from an initial string and afterwards owns its
//! selection; every change recomposes the full value and hands it to the
//! optional change listener as well as returning it.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::datetime::{
    Meridiem, compose_date, compose_time, days_in_month, month_abbrev, parse_date_parts,
    parse_time, to_twelve_hour, to_twenty_four_hour,
};
use crate::error::RecordError;

pub const MINUTE_STEP: u32 = 5;
pub const YEAR_SPAN: i32 = 10;

type Listener = Box<dyn FnMut(&str)>;

fn invalid(field: &'static str, value: impl Into<i64>) -> RecordError {
    RecordError::InvalidSelection {
        field,
        value: value.into(),
    }
}

pub struct TimeWheel {
    hour: u32,
    minute: u32,
    meridiem: Meridiem,
    listener: Option<Listener>,
}

impl fmt::Debug for TimeWheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeWheel")
            .field("hour", &self.hour)
            .field("minute", &self.minute)
            .field("meridiem", &self.meridiem)
            .finish_non_exhaustive()
    }
}

impl TimeWheel {
    /// Seeds from a 24-hour `HH:MM`; blank or unparseable input starts at 9:00 AM.
    pub fn open(initial: &str) -> Self {
        let (hour, minute, meridiem) = match parse_time(initial) {
            Ok((hour24, minute)) => {
                let (display, meridiem) = to_twelve_hour(hour24);
                (display, minute, meridiem)
            }
            Err(_) => (9, 0, Meridiem::Am),
        };

        Self {
            hour,
            minute,
            meridiem,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: impl FnMut(&str) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Display hours `01..12`. The meridiem column supplies the half of the
    /// day, so a 24-hour list here would allow impossible pairs like `15 PM`
    /// and break the parse/compose round trip.
    pub fn hours() -> Vec<String> {
        (1..=12).map(|h| format!("{h:02}")).collect()
    }

    pub fn minutes() -> Vec<String> {
        (0..60)
            .step_by(MINUTE_STEP as usize)
            .map(|m| format!("{m:02}"))
            .collect()
    }

    pub fn meridiems() -> [Meridiem; 2] {
        [Meridiem::Am, Meridiem::Pm]
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn meridiem(&self) -> Meridiem {
        self.meridiem
    }

    /// The composed 24-hour `HH:MM`.
    pub fn value(&self) -> String {
        compose_time(to_twenty_four_hour(self.hour, self.meridiem), self.minute)
    }

    pub fn select_hour(&mut self, hour: u32) -> Result<String, RecordError> {
        if !(1..=12).contains(&hour) {
            return Err(invalid("hour", hour));
        }
        self.hour = hour;
        Ok(self.changed())
    }

    pub fn select_minute(&mut self, minute: u32) -> Result<String, RecordError> {
        if minute >= 60 || minute % MINUTE_STEP != 0 {
            return Err(invalid("minute", minute));
        }
        self.minute = minute;
        Ok(self.changed())
    }

    pub fn select_meridiem(&mut self, meridiem: Meridiem) -> String {
        self.meridiem = meridiem;
        self.changed()
    }

    fn changed(&mut self) -> String {
        let value = self.value();
        if let Some(listener) = self.listener.as_mut() {
            listener(&value);
        }
        value
    }
}

pub struct DateWheel {
    year: i32,
    month: u32,
    day: u32,
    current_year: i32,
    listener: Option<Listener>,
}

impl fmt::Debug for DateWheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateWheel")
            .field("year", &self.year)
            .field("month", &self.month)
            .field("day", &self.day)
            .field("current_year", &self.current_year)
            .finish_non_exhaustive()
    }
}

impl DateWheel {
    /// Seeds from `YYYY-MM-DD`; blank or unparseable input starts at `today`.
    pub fn open(initial: &str, today: NaiveDate) -> Self {
        let (year, month, day) = parse_date_parts(initial)
            .unwrap_or_else(|_| (today.year(), today.month(), today.day()));

        Self {
            year,
            month,
            day,
            current_year: today.year(),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: impl FnMut(&str) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn years(&self) -> Vec<i32> {
        ((self.current_year - YEAR_SPAN)..=(self.current_year + YEAR_SPAN)).collect()
    }

    /// `("01", "Jan")` through `("12", "Dec")`.
    pub fn months() -> Vec<(String, &'static str)> {
        (1..=12)
            .filter_map(|m| month_abbrev(m).map(|name| (format!("{m:02}"), name)))
            .collect()
    }

    pub fn days(&self) -> Vec<String> {
        (1..=days_in_month(self.year, self.month))
            .map(|d| format!("{d:02}"))
            .collect()
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn value(&self) -> String {
        compose_date(self.year, self.month, self.day)
    }

    pub fn select_year(&mut self, year: i32) -> Result<String, RecordError> {
        if !self.years().contains(&year) {
            return Err(invalid("year", year));
        }
        self.year = year;
        self.clamp_day();
        Ok(self.changed())
    }

    pub fn select_month(&mut self, month: u32) -> Result<String, RecordError> {
        if !(1..=12).contains(&month) {
            return Err(invalid("month", month));
        }
        self.month = month;
        self.clamp_day();
        Ok(self.changed())
    }

    pub fn select_day(&mut self, day: u32) -> Result<String, RecordError> {
        if day == 0 || day > days_in_month(self.year, self.month) {
            return Err(invalid("day", day));
        }
        self.day = day;
        Ok(self.changed())
    }

    fn clamp_day(&mut self) {
        self.day = self.day.min(days_in_month(self.year, self.month));
    }

    fn changed(&mut self) -> String {
        let value = self.value();
        if let Some(listener) = self.listener.as_mut() {
            listener(&value);
        }
        value
    }
}
