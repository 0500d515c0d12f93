mod modifiers;

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, instrument, warn};

use self::modifiers::{
    apply_event_mods, apply_quick_mods, apply_task_mods, parse_title_and_mods, wants_yes,
};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{date_key, month_abbrev, parse_date_expr, today};
use crate::editor::{
    DEFAULT_END, DEFAULT_START, EventDraft, EventForm, SimpleTaskForm, TaskDraft, TaskForm,
};
use crate::record::{Event, SimpleTask, Task};
use crate::render::Renderer;
use crate::screen::{DayScreen, Editable, PerformanceSummary, SaveOutcome};
use crate::storage::{FileStore, KeyValueStore};
use crate::tabs::{Tab, TabNavigator};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show",
        "add",
        "edit",
        "delete",
        "month",
        "dates",
        "task",
        "quick",
        "performance",
        "settings",
        "tabs",
        "help",
        "version",
        "_commands",
    ]
}

const TASK_SUBCOMMANDS: [&str; 9] = [
    "show", "add", "edit", "done", "undone", "check", "uncheck", "info", "delete",
];

const QUICK_SUBCOMMANDS: [&str; 4] = ["show", "add", "edit", "delete"];

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Runs one command against the file store, printing to stdout and reading
/// confirmations from stdin.
#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &FileStore,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let stdin = io::stdin();
    dispatch_to(
        store.clone(),
        cfg,
        renderer,
        inv,
        stdout.lock(),
        stdin.lock(),
        Utc::now(),
    )
}

pub fn dispatch_to<S, W, R>(
    backend: S,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    out: W,
    input: R,
    now: DateTime<Utc>,
) -> anyhow::Result<()>
where
    S: KeyValueStore + Clone,
    W: Write,
    R: BufRead,
{
    debug!(command = %inv.command, args = ?inv.command_args, "dispatching command");

    let mut session = Session {
        backend,
        cfg,
        renderer,
        out,
        input,
        now,
    };
    let args = inv.command_args.as_slice();

    match inv.command.as_str() {
        "show" => session.show_events(args),
        "add" => session.add_event(args),
        "edit" => session.edit_event(args),
        "delete" => session.delete_record::<Event>(args),
        "month" => session.month(args),
        "dates" => session.dates(),
        "task" => session.task(args),
        "quick" => session.quick(args),
        "performance" => session.performance(),
        "settings" => session.settings(),
        "tabs" => session.tabs(args),
        "help" => session.help(),
        "version" => {
            writeln!(session.out, "datebook {}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        "_commands" => {
            for name in known_command_names() {
                writeln!(session.out, "{name}")?;
            }
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

struct Session<'a, S, W, R> {
    backend: S,
    cfg: &'a Config,
    renderer: &'a Renderer,
    out: W,
    input: R,
    now: DateTime<Utc>,
}

impl<S, W, R> Session<'_, S, W, R>
where
    S: KeyValueStore + Clone,
    W: Write,
    R: BufRead,
{
    fn mount<T: Editable>(&self) -> anyhow::Result<DayScreen<S, T>> {
        DayScreen::mount(self.backend.clone())
            .with_context(|| format!("failed to load '{}' records", T::STORAGE_KEY))
    }

    fn today_key(&self) -> String {
        date_key(today(self.now))
    }

    fn date_or_today(&self, arg: Option<&String>) -> anyhow::Result<String> {
        match arg {
            Some(raw) => parse_date_expr(raw, self.now),
            None => Ok(self.today_key()),
        }
    }

    fn date_and_index<'x>(
        &self,
        args: &'x [String],
        usage: &str,
    ) -> anyhow::Result<(String, usize, &'x [String])> {
        let [date, index, rest @ ..] = args else {
            bail!("usage: {usage}");
        };
        let date = parse_date_expr(date, self.now)?;
        let index = index
            .parse::<usize>()
            .map_err(|_| anyhow!("expected a record number, got '{index}'"))?;
        Ok((date, index, rest))
    }

    fn report_save(&mut self, date: &str, outcome: SaveOutcome) -> anyhow::Result<()> {
        match outcome {
            SaveOutcome::Saved { index } => writeln!(self.out, "Saved record {index} on {date}.")?,
            SaveOutcome::Discarded => writeln!(self.out, "Title was blank; nothing saved.")?,
        }
        Ok(())
    }

    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        write!(self.out, "{prompt} (yes/no) ")?;
        self.out.flush()?;

        let mut answer = String::new();
        let read = self
            .input
            .read_line(&mut answer)
            .context("failed reading confirmation")?;
        if read == 0 {
            warn!("no confirmation on input, treating as no");
            return Ok(false);
        }
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }

    fn event_form(&self, draft: EventDraft) -> anyhow::Result<EventForm> {
        let start = self.cfg.get_time("event.start", DEFAULT_START);
        let end = self.cfg.get_time("event.end", DEFAULT_END);
        Ok(EventForm::open(draft).with_default_times(&start, &end)?)
    }

    fn task_form(&self, draft: TaskDraft) -> anyhow::Result<TaskForm> {
        let start = self.cfg.get_time("event.start", DEFAULT_START);
        let end = self.cfg.get_time("event.end", DEFAULT_END);
        Ok(TaskForm::open(draft).with_default_times(&start, &end)?)
    }

    #[instrument(skip(self))]
    fn show_events(&mut self, args: &[String]) -> anyhow::Result<()> {
        let date = self.date_or_today(args.first())?;
        let mut screen = self.mount::<Event>()?;
        screen.select_date(&date)?;
        self.renderer
            .write_events(&mut self.out, &date, screen.selected_records())
    }

    #[instrument(skip(self))]
    fn add_event(&mut self, args: &[String]) -> anyhow::Result<()> {
        info!("command add");
        let Some((date, rest)) = args.split_first() else {
            bail!("usage: add DATE TITLE.. [start:HH:MM] [end:HH:MM] [allday:yes] [notes:TEXT]");
        };
        let date = parse_date_expr(date, self.now)?;
        let (title, mods) = parse_title_and_mods(rest, self.now)?;

        let mut screen = self.mount::<Event>()?;
        screen.select_date(&date)?;
        let draft = screen.open_add()?;
        let draft = EventDraft {
            start_time: self.cfg.get_time("event.start", DEFAULT_START),
            end_time: self.cfg.get_time("event.end", DEFAULT_END),
            ..draft
        };
        let mut form = self.event_form(draft)?;
        if !title.is_empty() {
            form.set_title(&title);
        }
        apply_event_mods(&mut form, &mods)?;

        let outcome = screen.save(form.submit(), self.now)?;
        self.report_save(&date, outcome)
    }

    #[instrument(skip(self))]
    fn edit_event(&mut self, args: &[String]) -> anyhow::Result<()> {
        info!("command edit");
        let (date, index, rest) = self.date_and_index(args, "edit DATE INDEX [TITLE..] [mods..]")?;
        let (title, mods) = parse_title_and_mods(rest, self.now)?;

        let mut screen = self.mount::<Event>()?;
        screen.select_date(&date)?;
        let mut form = self.event_form(screen.open_edit(index)?)?;
        if !title.is_empty() {
            form.set_title(&title);
        }
        apply_event_mods(&mut form, &mods)?;

        let outcome = screen.save(form.submit(), self.now)?;
        self.report_save(&date, outcome)
    }

    #[instrument(skip(self), fields(key = T::STORAGE_KEY))]
    fn delete_record<T: Editable>(&mut self, args: &[String]) -> anyhow::Result<()> {
        info!("command delete");
        let (date, index, rest) = self.date_and_index(args, "delete DATE INDEX [--yes]")?;
        let (_, mods) = parse_title_and_mods(rest, self.now)?;

        let mut screen = self.mount::<T>()?;
        screen.select_date(&date)?;
        let pending = screen.request_delete(index)?;

        let ask = self.cfg.get_bool("confirmation").unwrap_or(true) && !wants_yes(&mods);
        if ask && !self.confirm(&pending.prompt())? {
            writeln!(self.out, "Nothing deleted.")?;
            return Ok(());
        }

        let title = pending.title.clone();
        screen.confirm_delete(pending)?;
        writeln!(self.out, "Deleted \"{title}\" from {date}.")?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn month(&mut self, args: &[String]) -> anyhow::Result<()> {
        let today = today(self.now);
        let (year, month) = match args.first() {
            Some(raw) => parse_year_month(raw)?,
            None => (today.year(), today.month()),
        };

        let screen = self.mount::<Event>()?;
        let marked: BTreeSet<String> = screen
            .marked_dates()
            .into_iter()
            .map(str::to_string)
            .collect();
        let selected = date_key(today);
        self.renderer
            .write_month(&mut self.out, year, month, &marked, Some(&selected))
    }

    fn dates(&mut self) -> anyhow::Result<()> {
        let screen = self.mount::<Event>()?;
        for date in screen.marked_dates() {
            writeln!(self.out, "{date}  {}", screen.records().get(date).len())?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn task(&mut self, args: &[String]) -> anyhow::Result<()> {
        let (sub, rest) = match args.split_first() {
            Some((first, rest)) => match expand_command_abbrev(first, &TASK_SUBCOMMANDS) {
                Some(sub) => (sub, rest),
                None => ("show", args),
            },
            None => ("show", args),
        };
        debug!(sub, "task subcommand");

        match sub {
            "show" => {
                let date = self.date_or_today(rest.first())?;
                let mut screen = self.mount::<Task>()?;
                screen.select_date(&date)?;
                self.renderer
                    .write_tasks(&mut self.out, &date, screen.selected_records())
            }
            "add" => self.add_task(rest),
            "edit" => self.edit_task(rest),
            "done" => self.set_task_completed(rest, true),
            "undone" => self.set_task_completed(rest, false),
            "check" => self.set_subtask_completed(rest, true),
            "uncheck" => self.set_subtask_completed(rest, false),
            "info" => {
                let (date, index, _) = self.date_and_index(rest, "task info DATE INDEX")?;
                let screen = self.mount::<Task>()?;
                let task = screen.records().get(&date).get(index).ok_or_else(|| {
                    anyhow!("no task {index} on {date}")
                })?;
                self.renderer.write_task_detail(&mut self.out, task)
            }
            "delete" => self.delete_record::<Task>(rest),
            other => Err(anyhow!("unknown task subcommand: {other}")),
        }
    }

    fn add_task(&mut self, args: &[String]) -> anyhow::Result<()> {
        info!("command task add");
        let Some((date, rest)) = args.split_first() else {
            bail!("usage: task add DATE TITLE.. [priority:N] [recur:PATTERN] [sub:TITLE] ..");
        };
        let date = parse_date_expr(date, self.now)?;
        let (title, mods) = parse_title_and_mods(rest, self.now)?;

        let mut screen = self.mount::<Task>()?;
        screen.select_date(&date)?;
        let draft = screen.open_add()?;
        let draft = TaskDraft {
            start_time: self.cfg.get_time("event.start", DEFAULT_START),
            end_time: self.cfg.get_time("event.end", DEFAULT_END),
            ..draft
        };
        let mut form = self.task_form(draft)?;
        form.set_title(&title);
        apply_task_mods(&mut form, &mods)?;

        let draft = form.submit()?;
        let outcome = screen.save(draft, self.now)?;
        self.report_save(&date, outcome)
    }

    fn edit_task(&mut self, args: &[String]) -> anyhow::Result<()> {
        info!("command task edit");
        let (date, index, rest) =
            self.date_and_index(args, "task edit DATE INDEX [TITLE..] [mods..]")?;
        let (title, mods) = parse_title_and_mods(rest, self.now)?;

        let mut screen = self.mount::<Task>()?;
        screen.select_date(&date)?;
        let mut form = self.task_form(screen.open_edit(index)?)?;
        if !title.is_empty() {
            form.set_title(&title);
        }
        apply_task_mods(&mut form, &mods)?;

        let draft = form.submit()?;
        let outcome = screen.save(draft, self.now)?;
        self.report_save(&date, outcome)
    }

    fn set_task_completed(&mut self, args: &[String], completed: bool) -> anyhow::Result<()> {
        let (date, index, _) = self.date_and_index(args, "task done DATE INDEX")?;
        let mut screen = self.mount::<Task>()?;
        screen.update_record(&date, index, |task| task.completed = completed)?;

        let state = if completed { "done" } else { "open" };
        writeln!(self.out, "Marked task {index} on {date} {state}.")?;
        Ok(())
    }

    fn set_subtask_completed(&mut self, args: &[String], completed: bool) -> anyhow::Result<()> {
        let (date, index, rest) = self.date_and_index(args, "task check DATE INDEX SUBTASK")?;
        let sub = rest
            .first()
            .ok_or_else(|| anyhow!("usage: task check DATE INDEX SUBTASK"))?
            .parse::<usize>()
            .map_err(|_| anyhow!("expected a subtask number"))?;

        let mut screen = self.mount::<Task>()?;
        screen.select_date(&date)?;
        let mut form = self.task_form(screen.open_edit(index)?)?;
        if !form.set_subtask_completed(sub, completed) {
            screen.cancel();
            bail!("task {index} on {date} has no subtask {sub}");
        }

        let draft = form.submit()?;
        let outcome = screen.save(draft, self.now)?;
        self.report_save(&date, outcome)
    }

    #[instrument(skip(self))]
    fn quick(&mut self, args: &[String]) -> anyhow::Result<()> {
        let (sub, rest) = match args.split_first() {
            Some((first, rest)) => match expand_command_abbrev(first, &QUICK_SUBCOMMANDS) {
                Some(sub) => (sub, rest),
                None => ("show", args),
            },
            None => ("show", args),
        };

        match sub {
            "show" => {
                let date = self.date_or_today(rest.first())?;
                let mut screen = self.mount::<SimpleTask>()?;
                screen.select_date(&date)?;
                self.renderer
                    .write_quick_tasks(&mut self.out, &date, screen.selected_records())
            }
            "add" => {
                let Some((date, rest)) = rest.split_first() else {
                    bail!("usage: quick add DATE TITLE.. [time:HH:MM] [notes:TEXT]");
                };
                let date = parse_date_expr(date, self.now)?;
                let (title, mods) = parse_title_and_mods(rest, self.now)?;

                let mut screen = self.mount::<SimpleTask>()?;
                screen.select_date(&date)?;
                let mut form = SimpleTaskForm::open(screen.open_add()?);
                form.set_title(&title);
                apply_quick_mods(&mut form, &mods)?;

                let outcome = screen.save(form.submit(), self.now)?;
                self.report_save(&date, outcome)
            }
            "edit" => {
                let (date, index, rest) =
                    self.date_and_index(rest, "quick edit DATE INDEX [TITLE..] [mods..]")?;
                let (title, mods) = parse_title_and_mods(rest, self.now)?;

                let mut screen = self.mount::<SimpleTask>()?;
                screen.select_date(&date)?;
                let mut form = SimpleTaskForm::open(screen.open_edit(index)?);
                if !title.is_empty() {
                    form.set_title(&title);
                }
                apply_quick_mods(&mut form, &mods)?;

                let outcome = screen.save(form.submit(), self.now)?;
                self.report_save(&date, outcome)
            }
            "delete" => self.delete_record::<SimpleTask>(rest),
            other => Err(anyhow!("unknown quick subcommand: {other}")),
        }
    }

    fn performance(&mut self) -> anyhow::Result<()> {
        let screen = self.mount::<Task>()?;
        let summary = PerformanceSummary::from_tasks(screen.records());
        self.renderer.write_performance(&mut self.out, &summary)
    }

    fn settings(&mut self) -> anyhow::Result<()> {
        self.renderer.write_settings(&mut self.out, self.cfg)
    }

    fn tabs(&mut self, args: &[String]) -> anyhow::Result<()> {
        let mut nav = TabNavigator::new();
        if let Some(name) = args.first() {
            let tab = Tab::from_name(name).ok_or_else(|| anyhow!("unknown tab: {name}"))?;
            nav.select(tab);
        }
        self.renderer.write_tabs(&mut self.out, &nav)
    }

    fn help(&mut self) -> anyhow::Result<()> {
        writeln!(self.out, "{HELP}")?;
        Ok(())
    }
}

fn parse_year_month(raw: &str) -> anyhow::Result<(i32, u32)> {
    let (year, month) = raw
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got '{raw}'"))?;
    let year = year
        .parse::<i32>()
        .map_err(|_| anyhow!("invalid year in '{raw}'"))?;
    let month = month
        .parse::<u32>()
        .map_err(|_| anyhow!("invalid month in '{raw}'"))?;
    if month_abbrev(month).is_none() {
        bail!("month out of range in '{raw}'");
    }
    Ok((year, month))
}

const HELP: &str = "\
usage: datebook [-v] [-q] [--rc key=value] [--datebookrc PATH] [--data DIR] <command> [args]

calendar
  show [DATE]                         events on a date (default today)
  add DATE TITLE.. [mods]             add an event
  edit DATE INDEX [TITLE..] [mods]    change an event
  delete DATE INDEX [--yes]           remove an event
  month [YYYY-MM]                     month grid, marked dates starred
  dates                               dates that have events

tasks
  task [show] [DATE]
  task add DATE TITLE.. [mods]
  task edit DATE INDEX [TITLE..] [mods]
  task done|undone DATE INDEX
  task check|uncheck DATE INDEX SUBTASK
  task info DATE INDEX
  task delete DATE INDEX [--yes]
  quick [show|add|edit|delete] ...    time-of-day task list

other
  performance  settings  tabs [NAME]  help  version

modifiers
  start:HH:MM end:HH:MM time:HH:MM allday:yes notes:TEXT
  priority:N performance:N recur:daily|weekly|monthly|yearly|none every:N
  type:TAG +TAG -TAG sub:TITLE estimate:MIN actual:MIN until:DATE done:yes yes:yes

DATE is YYYY-MM-DD, today, tomorrow or yesterday.";
