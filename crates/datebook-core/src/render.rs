use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{compose_date, days_in_month, format_long_date, format_time, month_abbrev};
use crate::record::{Event, SimpleTask, Task};
use crate::screen::PerformanceSummary;
use crate::tabs::TabNavigator;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

fn display_time(raw: &str) -> String {
    format_time(raw).unwrap_or_else(|_| raw.to_string())
}

fn time_range(all_day: bool, start: Option<&str>, end: Option<&str>) -> String {
    if all_day {
        return "all day".to_string();
    }
    match (start.filter(|s| !s.is_empty()), end.filter(|s| !s.is_empty())) {
        (Some(start), Some(end)) => format!("{} - {}", display_time(start), display_time(end)),
        (Some(start), None) => display_time(start),
        (None, Some(end)) => format!("until {}", display_time(end)),
        (None, None) => String::new(),
    }
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn heading(&self, out: &mut impl Write, date: &str, count: usize) -> anyhow::Result<()> {
        let long = format_long_date(date).unwrap_or_else(|_| date.to_string());
        writeln!(out, "{} ({count})", self.paint(&long, "1"))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, events))]
    pub fn write_events(
        &self,
        out: &mut impl Write,
        date: &str,
        events: &[Event],
    ) -> anyhow::Result<()> {
        self.heading(out, date, events.len())?;
        if events.is_empty() {
            writeln!(out, "No events yet")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Time".to_string(),
            "Title".to_string(),
            "Notes".to_string(),
        ];
        let rows = events
            .iter()
            .enumerate()
            .map(|(idx, event)| {
                vec![
                    self.paint(&idx.to_string(), "33"),
                    time_range(
                        event.all_day,
                        event.start_time.as_deref(),
                        event.end_time.as_deref(),
                    ),
                    event.title.clone(),
                    event.notes.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, tasks))]
    pub fn write_tasks(&self, out: &mut impl Write, date: &str, tasks: &[Task]) -> anyhow::Result<()> {
        self.heading(out, date, tasks.len())?;
        if tasks.is_empty() {
            writeln!(out, "No tasks yet")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Time".to_string(),
            "Title".to_string(),
            "P".to_string(),
            "Perf".to_string(),
            "Repeat".to_string(),
            "Types".to_string(),
            "Subtasks".to_string(),
        ];
        let rows = tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let done = if task.completed {
                    self.paint("x", "32")
                } else {
                    String::new()
                };
                let repeat = if task.recurring {
                    format!("{} x{}", task.frequency_pattern.as_str(), task.frequency_count)
                } else {
                    String::new()
                };
                let subtasks = if task.sub_tasks.is_empty() {
                    String::new()
                } else {
                    let finished = task.sub_tasks.iter().filter(|s| s.completed).count();
                    format!("{finished}/{}", task.sub_tasks.len())
                };
                vec![
                    self.paint(&idx.to_string(), "33"),
                    done,
                    time_range(
                        task.all_day,
                        task.start_time.as_deref(),
                        task.end_time.as_deref(),
                    ),
                    task.title.clone(),
                    task.priority_rating.value().to_string(),
                    task.performance_rating.value().to_string(),
                    repeat,
                    task.types.join(", "),
                    subtasks,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_task_detail(&self, out: &mut impl Write, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "dates       {} .. {}", task.start_date, task.end_date)?;
        writeln!(
            out,
            "time        {}",
            time_range(task.all_day, task.start_time.as_deref(), task.end_time.as_deref())
        )?;
        writeln!(out, "priority    {}", task.priority_rating.value())?;
        writeln!(out, "performance {}", task.performance_rating.value())?;
        writeln!(out, "completed   {}", if task.completed { "yes" } else { "no" })?;
        if task.recurring {
            writeln!(
                out,
                "repeats     {} every {}",
                task.frequency_pattern.as_str(),
                task.frequency_count
            )?;
        }
        if let Some(minutes) = task.estimated_duration {
            writeln!(out, "estimate    {minutes} min")?;
        }
        if let Some(minutes) = task.actual_duration {
            writeln!(out, "actual      {minutes} min")?;
        }
        if !task.types.is_empty() {
            writeln!(out, "types       {}", task.types.join(", "))?;
        }
        if let Some(notes) = &task.notes {
            writeln!(out, "notes       {notes}")?;
        }
        for sub in &task.sub_tasks {
            let mark = if sub.completed { "x" } else { " " };
            writeln!(out, "  [{mark}] {}. {}", sub.order + 1, sub.title)?;
        }
        Ok(())
    }

    pub fn write_quick_tasks(
        &self,
        out: &mut impl Write,
        date: &str,
        tasks: &[SimpleTask],
    ) -> anyhow::Result<()> {
        self.heading(out, date, tasks.len())?;
        for (idx, task) in tasks.iter().enumerate() {
            writeln!(
                out,
                "{} {:>8}  {}",
                self.paint(&idx.to_string(), "33"),
                display_time(&task.time),
                task.title
            )?;
        }
        Ok(())
    }

    /// Monday-first month grid; dates with records get a `*`, the selected
    /// date is bracketed.
    #[tracing::instrument(skip(self, out, marked))]
    pub fn write_month(
        &self,
        out: &mut impl Write,
        year: i32,
        month: u32,
        marked: &BTreeSet<String>,
        selected: Option<&str>,
    ) -> anyhow::Result<()> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!("invalid month: {year}-{month:02}"))?;
        let name = month_abbrev(month).unwrap_or("???");

        writeln!(out, "{name} {year}")?;
        writeln!(out, " Mo   Tu   We   Th   Fr   Sa   Su")?;

        let lead = first.weekday().num_days_from_monday() as usize;
        let mut line = "     ".repeat(lead);
        for day in 1..=days_in_month(year, month) {
            let key = compose_date(year, month, day);
            let mark = if marked.contains(&key) { "*" } else { " " };
            let cell = if selected == Some(key.as_str()) {
                format!("[{day:>2}]")
            } else {
                format!(" {day:>2}{mark}")
            };
            let cell = if marked.contains(&key) {
                self.paint(&cell, "36")
            } else {
                cell
            };
            line.push_str(&cell);

            let weekday = NaiveDate::from_ymd_opt(year, month, day).map(|d| d.weekday());
            if weekday == Some(Weekday::Sun) {
                writeln!(out, "{}", line.trim_end())?;
                line.clear();
            } else {
                line.push(' ');
            }
        }
        if !line.trim().is_empty() {
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    pub fn write_tabs(&self, out: &mut impl Write, nav: &TabNavigator) -> anyhow::Result<()> {
        let cells: Vec<String> = nav
            .tabs()
            .map(|(tab, focused)| {
                let label = format!("{} ({})", tab.title(), tab.command());
                if focused {
                    self.paint(&format!("[{label}]"), "34")
                } else {
                    format!(" {label} ")
                }
            })
            .collect();
        writeln!(out, "{}", cells.join(" "))?;
        Ok(())
    }

    pub fn write_performance(
        &self,
        out: &mut impl Write,
        summary: &PerformanceSummary,
    ) -> anyhow::Result<()> {
        writeln!(out, "tasks       {}", summary.total)?;
        writeln!(out, "completed   {}", summary.completed)?;
        if let Some(rate) = summary.completion_rate() {
            writeln!(out, "rate        {:.0}%", rate * 100.0)?;
        }
        writeln!(out, "recurring   {}", summary.recurring)?;
        if let Some(avg) = summary.average_priority {
            writeln!(out, "priority    {avg:.1}")?;
        }
        if let Some(avg) = summary.average_performance {
            writeln!(out, "performance {avg:.1}")?;
        }
        writeln!(
            out,
            "subtasks    {}/{}",
            summary.subtasks_completed, summary.subtasks_total
        )?;
        for (kind, count) in &summary.by_type {
            writeln!(out, "  {kind}: {count}")?;
        }
        Ok(())
    }

    pub fn write_settings(&self, out: &mut impl Write, cfg: &Config) -> anyhow::Result<()> {
        let rows = cfg
            .entries()
            .into_iter()
            .map(|(k, v)| vec![k.to_string(), v.to_string()])
            .collect();
        write_table(out, vec!["Setting".to_string(), "Value".to_string()], rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
