use anyhow::anyhow;
use chrono::Utc;
use tracing::instrument;

use crate::datetime::parse_date_expr;
use crate::editor::{
  EventForm,
  RatingField,
  SimpleTaskForm,
  TaskForm,
  TimeField
};
use crate::record::FrequencyPattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Mod {
  Start(String),
  End(String),
  AllDay(bool),
  Notes(String),
  Time(String),
  Priority(u32),
  Performance(u32),
  Recur(FrequencyPattern),
  Every(u32),
  TypeAdd(String),
  TypeRemove(String),
  Sub(String),
  Estimate(u32),
  Actual(u32),
  Until(String),
  Done(bool),
  Yes(bool)
}

/// Splits `words key:value ...` into the title and its modifiers.
/// Everything after a literal `--` is title text.
#[instrument(skip(args, now))]
pub(super) fn parse_title_and_mods(
  args: &[String],
  now: chrono::DateTime<Utc>
) -> anyhow::Result<(String, Vec<Mod>)>
{
  let mut title_parts = Vec::new();
  let mut mods = Vec::new();

  let mut literal = false;
  for arg in args {
    if arg == "--" {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, now)?
    {
      mods.push(one_mod);
      continue;
    }

    title_parts.push(arg.clone());
  }

  Ok((title_parts.join(" "), mods))
}

fn parse_bool(
  key: &str,
  value: &str
) -> anyhow::Result<bool> {
  match value
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Ok(true),
    | "0" | "n" | "no" | "off"
    | "false" => Ok(false),
    | other => {
      Err(anyhow!(
        "{key}: expected yes/no, got \
         {other}"
      ))
    }
  }
}

fn parse_number(
  key: &str,
  value: &str
) -> anyhow::Result<u32> {
  value.trim().parse::<u32>().map_err(
    |_| {
      anyhow!(
        "{key}: expected a whole \
         number, got {value}"
      )
    }
  )
}

fn parse_one_mod(
  tok: &str,
  now: chrono::DateTime<Utc>
) -> anyhow::Result<Option<Mod>> {
  if let Some(tag) = tok.strip_prefix('+')
    && !tag.is_empty()
  {
    return Ok(Some(Mod::TypeAdd(
      tag.to_string()
    )));
  }
  if let Some(tag) = tok.strip_prefix('-')
    && !tag.is_empty()
    && !tag.starts_with('-')
  {
    return Ok(Some(Mod::TypeRemove(
      tag.to_string()
    )));
  }
  if tok == "--yes" {
    return Ok(Some(Mod::Yes(true)));
  }

  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };
  let key = key.to_ascii_lowercase();

  let parsed = match key.as_str() {
    | "start" => {
      Mod::Start(value.to_string())
    }
    | "end" => Mod::End(value.to_string()),
    | "time" => {
      Mod::Time(value.to_string())
    }
    | "allday" => {
      Mod::AllDay(parse_bool(&key, value)?)
    }
    | "notes" => {
      Mod::Notes(value.to_string())
    }
    | "priority" | "pri" => {
      Mod::Priority(parse_number(
        &key, value
      )?)
    }
    | "performance" | "perf" => {
      Mod::Performance(parse_number(
        &key, value
      )?)
    }
    | "recur" => {
      Mod::Recur(value.parse()?)
    }
    | "every" => {
      Mod::Every(parse_number(
        &key, value
      )?)
    }
    | "type" => {
      Mod::TypeAdd(value.to_string())
    }
    | "sub" => Mod::Sub(value.to_string()),
    | "estimate" => {
      Mod::Estimate(parse_number(
        &key, value
      )?)
    }
    | "actual" => {
      Mod::Actual(parse_number(
        &key, value
      )?)
    }
    | "until" => {
      Mod::Until(parse_date_expr(
        value, now
      )?)
    }
    | "done" => {
      Mod::Done(parse_bool(&key, value)?)
    }
    | "yes" => {
      Mod::Yes(parse_bool(&key, value)?)
    }
    | _ => return Ok(None)
  };

  Ok(Some(parsed))
}

pub(super) fn wants_yes(
  mods: &[Mod]
) -> bool {
  mods.iter().any(|m| m == &Mod::Yes(true))
}

pub(super) fn apply_event_mods(
  form: &mut EventForm,
  mods: &[Mod]
) -> anyhow::Result<()> {
  for one_mod in mods {
    match one_mod {
      | Mod::AllDay(all_day) => {
        if form.draft().all_day
          != *all_day
        {
          form.toggle_all_day();
        }
      }
      | Mod::Start(value) => {
        if form.draft().all_day {
          form.toggle_all_day();
        }
        form.set_time(
          TimeField::Start,
          value
        )?;
      }
      | Mod::End(value) => {
        if form.draft().all_day {
          form.toggle_all_day();
        }
        form
          .set_time(TimeField::End, value)?;
      }
      | Mod::Notes(notes) => {
        form.set_notes(notes)
      }
      | Mod::Yes(_) => {}
      | other => {
        return Err(anyhow!(
          "{other:?} does not apply to \
           events"
        ));
      }
    }
  }
  Ok(())
}

pub(super) fn apply_quick_mods(
  form: &mut SimpleTaskForm,
  mods: &[Mod]
) -> anyhow::Result<()> {
  for one_mod in mods {
    match one_mod {
      | Mod::Time(value)
      | Mod::Start(value) => {
        form.select_time(value)?
      }
      | Mod::Notes(notes) => {
        form.set_notes(notes)
      }
      | Mod::Yes(_) => {}
      | other => {
        return Err(anyhow!(
          "{other:?} does not apply to \
           quick tasks"
        ));
      }
    }
  }
  Ok(())
}

pub(super) fn apply_task_mods(
  form: &mut TaskForm,
  mods: &[Mod]
) -> anyhow::Result<()> {
  for one_mod in mods {
    match one_mod {
      | Mod::AllDay(all_day) => {
        if form.draft().all_day
          != *all_day
        {
          form.toggle_all_day();
        }
      }
      | Mod::Start(value)
      | Mod::Time(value) => {
        if form.draft().all_day {
          form.toggle_all_day();
        }
        form.set_time(
          TimeField::Start,
          value
        )?;
      }
      | Mod::End(value) => {
        if form.draft().all_day {
          form.toggle_all_day();
        }
        form
          .set_time(TimeField::End, value)?;
      }
      | Mod::Notes(notes) => {
        form.set_notes(notes)
      }
      | Mod::Priority(value) => {
        form.set_rating(
          RatingField::Priority,
          *value
        )
      }
      | Mod::Performance(value) => {
        form.set_rating(
          RatingField::Performance,
          *value
        )
      }
      | Mod::Recur(pattern) => {
        let count =
          form.draft().frequency_count;
        form.set_frequency(*pattern, count);
      }
      | Mod::Every(count) => {
        let mut pattern =
          form.draft().frequency_pattern;
        if pattern
          == FrequencyPattern::None
        {
          pattern = FrequencyPattern::Daily;
        }
        form.set_frequency(pattern, *count);
      }
      | Mod::TypeAdd(tag) => {
        form.add_type(tag);
      }
      | Mod::TypeRemove(tag) => {
        form.remove_type(tag);
      }
      | Mod::Sub(title) => {
        form.add_subtask(title);
      }
      | Mod::Estimate(minutes) => {
        form.set_estimated_duration(Some(
          *minutes
        ))
      }
      | Mod::Actual(minutes) => {
        form.set_actual_duration(Some(
          *minutes
        ))
      }
      | Mod::Until(date) => {
        form.set_end_date(date)?
      }
      | Mod::Done(done) => {
        form.set_completed(*done)
      }
      | Mod::Yes(_) => {}
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    Mod,
    apply_event_mods,
    apply_task_mods,
    parse_title_and_mods
  };
  use crate::editor::{
    EventDraft,
    EventForm,
    TaskDraft,
    TaskForm
  };
  use crate::record::FrequencyPattern;

  fn args(words: &[&str]) -> Vec<String> {
    words
      .iter()
      .map(|w| w.to_string())
      .collect()
  }

  fn now() -> chrono::DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2024, 6, 1, 9, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn title_words_and_modifiers_split() {
    let (title, mods) =
      parse_title_and_mods(
        &args(&[
          "Lunch",
          "with",
          "Sam",
          "start:12:00",
          "+social",
          "--",
          "notes:kept"
        ]),
        now()
      )
      .expect("parse");
    assert_eq!(
      title,
      "Lunch with Sam notes:kept"
    );
    assert_eq!(
      mods,
      vec![
        Mod::Start("12:00".to_string()),
        Mod::TypeAdd(
          "social".to_string()
        )
      ]
    );
  }

  #[test]
  fn unknown_keys_stay_in_the_title() {
    let (title, mods) =
      parse_title_and_mods(
        &args(&["Re:", "budget"]),
        now()
      )
      .expect("parse");
    assert_eq!(title, "Re: budget");
    assert!(mods.is_empty());
  }

  #[test]
  fn bad_numbers_are_errors() {
    assert!(
      parse_title_and_mods(
        &args(&["x", "priority:high"]),
        now()
      )
      .is_err()
    );
  }

  #[test]
  fn start_time_switches_off_all_day() {
    let mut form = EventForm::open(
      EventDraft::default()
    );
    apply_event_mods(
      &mut form,
      &[
        Mod::AllDay(true),
        Mod::Start("10:30".to_string())
      ]
    )
    .expect("apply");
    assert!(!form.draft().all_day);
    assert_eq!(
      form.draft().start_time,
      "10:30"
    );
  }

  #[test]
  fn task_only_modifiers_are_rejected_for_events() {
    let mut form = EventForm::open(
      EventDraft::default()
    );
    assert!(
      apply_event_mods(
        &mut form,
        &[Mod::Priority(3)]
      )
      .is_err()
    );
  }

  #[test]
  fn every_implies_daily_recurrence() {
    let mut form = TaskForm::open(
      TaskDraft::for_date("2024-06-01")
    );
    apply_task_mods(
      &mut form,
      &[Mod::Every(3)]
    )
    .expect("apply");
    assert_eq!(
      form.draft().frequency_pattern,
      FrequencyPattern::Daily
    );
    assert_eq!(
      form.draft().frequency_count,
      3
    );
    assert!(form.draft().recurring);
  }
}
