use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::error::RecordError;

const TIMEZONE_CONFIG_FILE: &str =
  "datebook-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DATEBOOK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DATEBOOK_TIME_CONFIG";

const MONTH_ABBREVS: [&str; 12] = [
  "Jan", "Feb", "Mar", "Apr", "May",
  "Jun", "Jul", "Aug", "Sep", "Oct",
  "Nov", "Dec"
];

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Meridiem {
  Am,
  Pm
}

impl Meridiem {
  pub fn label(self) -> &'static str {
    match self {
      | Meridiem::Am => "AM",
      | Meridiem::Pm => "PM"
    }
  }
}

impl fmt::Display for Meridiem {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Zone used to decide what "today" is.
/// `None` means the system local zone.
pub fn project_timezone()
-> Option<&'static Tz> {
  static PROJECT_TZ: OnceLock<
    Option<Tz>
  > = OnceLock::new();
  PROJECT_TZ
    .get_or_init(
      resolve_project_timezone
    )
    .as_ref()
}

#[must_use]
pub fn today(
  now: DateTime<Utc>
) -> NaiveDate {
  match project_timezone() {
    | Some(tz) => {
      now.with_timezone(tz).date_naive()
    }
    | None => {
      now
        .with_timezone(&Local)
        .date_naive()
    }
  }
}

fn resolve_project_timezone()
-> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
  {
    return Some(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Some(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local zone"
  );
  None
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Splits a 24-hour `HH:MM` string.
pub fn parse_time(
  time: &str
) -> Result<(u32, u32), RecordError> {
  let invalid = || {
    RecordError::InvalidTime(
      time.to_string()
    )
  };

  let clock_re = Regex::new(
    r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$"
  )
  .map_err(|_| invalid())?;
  let captures = clock_re
    .captures(time.trim())
    .ok_or_else(invalid)?;

  let hour: u32 = captures["hour"]
    .parse()
    .map_err(|_| invalid())?;
  let minute: u32 = captures["minute"]
    .parse()
    .map_err(|_| invalid())?;

  if hour > 23 || minute > 59 {
    return Err(invalid());
  }

  Ok((hour, minute))
}

#[must_use]
pub fn compose_time(
  hour: u32,
  minute: u32
) -> String {
  format!("{hour:02}:{minute:02}")
}

#[must_use]
pub fn to_twelve_hour(
  hour: u32
) -> (u32, Meridiem) {
  let meridiem = if hour >= 12 {
    Meridiem::Pm
  } else {
    Meridiem::Am
  };
  let display = match hour {
    | 0 => 12,
    | h if h > 12 => h - 12,
    | h => h
  };
  (display, meridiem)
}

#[must_use]
pub fn to_twenty_four_hour(
  display_hour: u32,
  meridiem: Meridiem
) -> u32 {
  match (meridiem, display_hour) {
    | (Meridiem::Am, 12) => 0,
    | (Meridiem::Pm, 12) => 12,
    | (Meridiem::Pm, h) => h + 12,
    | (Meridiem::Am, h) => h
  }
}

/// `"13:05"` becomes `"1:05 PM"`.
pub fn format_time(
  time: &str
) -> Result<String, RecordError> {
  let (hour, minute) =
    parse_time(time)?;
  let (display, meridiem) =
    to_twelve_hour(hour);
  Ok(format!(
    "{display}:{minute:02} {meridiem}"
  ))
}

pub fn parse_date_parts(
  date: &str
) -> Result<(i32, u32, u32), RecordError>
{
  let parsed =
    NaiveDate::parse_from_str(
      date.trim(),
      "%Y-%m-%d"
    )
    .map_err(|_| {
      RecordError::InvalidDate(
        date.to_string()
      )
    })?;
  Ok((
    parsed.year(),
    parsed.month(),
    parsed.day()
  ))
}

#[must_use]
pub fn compose_date(
  year: i32,
  month: u32,
  day: u32
) -> String {
  format!(
    "{year:04}-{month:02}-{day:02}"
  )
}

#[must_use]
pub fn date_key(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

/// Zero for a month outside `1..=12`.
#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  if !(1..=12).contains(&month) {
    return 0;
  }
  let (next_year, next_month) =
    if month == 12 {
      (year + 1, 1)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .map(|last| last.day())
  .unwrap_or(0)
}

#[must_use]
pub fn month_abbrev(
  month: u32
) -> Option<&'static str> {
  let idx =
    usize::try_from(month).ok()?;
  MONTH_ABBREVS
    .get(idx.checked_sub(1)?)
    .copied()
}

pub fn format_long_date(
  date: &str
) -> Result<String, RecordError> {
  let (year, month, day) =
    parse_date_parts(date)?;
  let parsed =
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .ok_or_else(|| {
      RecordError::InvalidDate(
        date.to_string()
      )
    })?;
  Ok(
    parsed
      .format("%a, %b %-d %Y")
      .to_string()
  )
}

/// Resolves `today`, `tomorrow`, `yesterday` or an explicit
/// `YYYY-MM-DD` into a record map key.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<String> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let base = today(now);

  let resolved = match lower.as_str()
  {
    | "today" => base,
    | "tomorrow" => {
      base + Duration::days(1)
    }
    | "yesterday" => {
      base - Duration::days(1)
    }
    | _ => {
      let (year, month, day) =
        parse_date_parts(token)?;
      NaiveDate::from_ymd_opt(
        year, month, day
      )
      .ok_or_else(|| {
        anyhow!(
          "invalid date: {token}"
        )
      })?
    }
  };

  Ok(date_key(resolved))
}
