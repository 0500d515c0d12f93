//! View-controller state for the per-date screens.
//!
//! A screen owns the in-memory record map for one storage key. It moves
//! between `Idle` (no date picked), `DateSelected` and `Editing`, and every
//! add, edit or delete writes the whole map back through its `RecordStore`.

use std::collections::BTreeMap;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument};

use crate::datetime::{compose_date, parse_date_parts};
use crate::editor::{EventDraft, SimpleTaskDraft, TaskDraft};
use crate::error::{EditorError, RecordError};
use crate::record::{Event, RecordId, RecordMap, Schedulable, SimpleTask, Task};
use crate::storage::{EVENT_KEY, KeyValueStore, RecordStore, TASK_KEY, TASK_LIST_KEY};

/// A record type that can be edited through a form draft.
pub trait Editable: Schedulable + Clone + Serialize + DeserializeOwned {
    type Draft: Clone;

    const STORAGE_KEY: &'static str;

    /// When true a blank title closes the form without saving; otherwise
    /// it is a validation failure.
    const BLANK_TITLE_CANCELS: bool;

    fn new_draft(date: &str) -> Self::Draft;

    fn to_draft(&self) -> Self::Draft;

    fn from_draft(draft: Self::Draft, id: RecordId) -> Self;

    fn draft_title(draft: &Self::Draft) -> &str;
}

impl Editable for Event {
    type Draft = EventDraft;

    const STORAGE_KEY: &'static str = EVENT_KEY;
    const BLANK_TITLE_CANCELS: bool = true;

    fn new_draft(_date: &str) -> EventDraft {
        EventDraft::default()
    }

    fn to_draft(&self) -> EventDraft {
        EventDraft::from_event(self)
    }

    fn from_draft(draft: EventDraft, id: RecordId) -> Self {
        draft.into_event(id)
    }

    fn draft_title(draft: &EventDraft) -> &str {
        &draft.title
    }
}

impl Editable for SimpleTask {
    type Draft = SimpleTaskDraft;

    const STORAGE_KEY: &'static str = TASK_LIST_KEY;
    const BLANK_TITLE_CANCELS: bool = true;

    fn new_draft(_date: &str) -> SimpleTaskDraft {
        SimpleTaskDraft::default()
    }

    fn to_draft(&self) -> SimpleTaskDraft {
        SimpleTaskDraft::from_task(self)
    }

    fn from_draft(draft: SimpleTaskDraft, id: RecordId) -> Self {
        draft.into_task(id)
    }

    fn draft_title(draft: &SimpleTaskDraft) -> &str {
        &draft.title
    }
}

impl Editable for Task {
    type Draft = TaskDraft;

    const STORAGE_KEY: &'static str = TASK_KEY;
    const BLANK_TITLE_CANCELS: bool = false;

    fn new_draft(date: &str) -> TaskDraft {
        TaskDraft::for_date(date)
    }

    fn to_draft(&self) -> TaskDraft {
        TaskDraft::from_task(self)
    }

    fn from_draft(draft: TaskDraft, id: RecordId) -> Self {
        draft.into_task(id)
    }

    fn draft_title(draft: &TaskDraft) -> &str {
        &draft.title
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenState {
    Idle,
    DateSelected,
    Editing { edit_index: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { index: usize },
    Discarded,
}

/// A delete awaiting the user's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub date: String,
    pub index: usize,
    pub title: String,
}

impl PendingDelete {
    pub fn prompt(&self) -> String {
        format!("Delete \"{}\" on {}? Are you sure?", self.title, self.date)
    }
}

#[derive(Debug)]
pub struct DayScreen<S, T> {
    store: RecordStore<S, T>,
    records: RecordMap<T>,
    selected_date: Option<String>,
    state: ScreenState,
}

pub type CalendarScreen<S> = DayScreen<S, Event>;
pub type TaskScreen<S> = DayScreen<S, Task>;
pub type QuickTaskScreen<S> = DayScreen<S, SimpleTask>;

impl<S, T> DayScreen<S, T>
where
    S: KeyValueStore,
    T: Editable,
{
    /// Loads the full map once.
    #[instrument(skip(backend), fields(key = T::STORAGE_KEY))]
    pub fn mount(backend: S) -> anyhow::Result<Self> {
        let store = RecordStore::new(backend, T::STORAGE_KEY);
        let records = match store.load() {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "failed to load records");
                return Err(err);
            }
        };
        debug!(dates = records.len(), "screen mounted");
        Ok(Self {
            store,
            records,
            selected_date: None,
            state: ScreenState::Idle,
        })
    }

    pub fn state(&self) -> ScreenState {
        self.state
    }

    pub fn records(&self) -> &RecordMap<T> {
        &self.records
    }

    pub fn store(&self) -> &RecordStore<S, T> {
        &self.store
    }

    pub fn selected_date(&self) -> Option<&str> {
        self.selected_date.as_deref()
    }

    pub fn selected_records(&self) -> &[T] {
        self.selected_date
            .as_deref()
            .map(|date| self.records.get(date))
            .unwrap_or(&[])
    }

    pub fn marked_dates(&self) -> Vec<&str> {
        self.records.dates().collect()
    }

    /// Picking a date closes any open editor. The date is kept in canonical
    /// `YYYY-MM-DD` form since it becomes the map key.
    pub fn select_date(&mut self, date: &str) -> Result<(), RecordError> {
        let (year, month, day) = parse_date_parts(date)?;
        self.selected_date = Some(compose_date(year, month, day));
        self.state = ScreenState::DateSelected;
        Ok(())
    }

    pub fn open_add(&mut self) -> anyhow::Result<T::Draft> {
        let date = self.require_date()?.to_string();
        self.state = ScreenState::Editing { edit_index: None };
        Ok(T::new_draft(&date))
    }

    pub fn open_edit(&mut self, index: usize) -> anyhow::Result<T::Draft> {
        let date = self.require_date()?;
        let record = self
            .records
            .get(date)
            .get(index)
            .ok_or_else(|| RecordError::IndexOutOfRange {
                date: date.to_string(),
                index,
            })?;
        let draft = record.to_draft();
        self.state = ScreenState::Editing {
            edit_index: Some(index),
        };
        Ok(draft)
    }

    pub fn cancel(&mut self) {
        self.state = if self.selected_date.is_some() {
            ScreenState::DateSelected
        } else {
            ScreenState::Idle
        };
    }

    /// Applies the open editor's draft to the selected date and persists the
    /// map. The in-memory map keeps the change even if the write fails; the
    /// write error is logged and returned.
    #[instrument(skip(self, draft, now), fields(key = T::STORAGE_KEY))]
    pub fn save(&mut self, draft: T::Draft, now: DateTime<Utc>) -> anyhow::Result<SaveOutcome> {
        let ScreenState::Editing { edit_index } = self.state else {
            return Err(anyhow!("no editor is open"));
        };
        let date = self.require_date()?.to_string();

        if T::draft_title(&draft).trim().is_empty() {
            if T::BLANK_TITLE_CANCELS {
                info!(date = %date, "blank title, closing editor without saving");
                self.cancel();
                return Ok(SaveOutcome::Discarded);
            }
            return Err(EditorError::EmptyTitle.into());
        }

        let id = match edit_index {
            Some(index) => self
                .records
                .get(&date)
                .get(index)
                .map(|r| r.id().clone())
                .ok_or(RecordError::IndexOutOfRange {
                    date: date.clone(),
                    index,
                })?,
            None => RecordId::from_timestamp(now),
        };

        let record = T::from_draft(draft, id);
        let index = self.records.upsert(&date, edit_index, record)?;
        self.cancel();
        self.persist()?;

        info!(date = %date, index, "record saved");
        Ok(SaveOutcome::Saved { index })
    }

    pub fn request_delete(&self, index: usize) -> anyhow::Result<PendingDelete> {
        let date = self.require_date()?;
        let record = self
            .records
            .get(date)
            .get(index)
            .ok_or_else(|| RecordError::IndexOutOfRange {
                date: date.to_string(),
                index,
            })?;
        Ok(PendingDelete {
            date: date.to_string(),
            index,
            title: record.title().to_string(),
        })
    }

    #[instrument(skip(self), fields(key = T::STORAGE_KEY))]
    pub fn confirm_delete(&mut self, pending: PendingDelete) -> anyhow::Result<()> {
        let current = std::mem::take(&mut self.records);
        let fallback = current.clone();
        match self.store.delete(current, &pending.date, pending.index) {
            Ok(updated) => {
                self.records = updated;
                info!(date = %pending.date, index = pending.index, "record deleted");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to delete record");
                self.records = fallback;
                Err(err)
            }
        }
    }

    /// Rewrites one record in place on `date` and persists.
    pub fn update_record(
        &mut self,
        date: &str,
        index: usize,
        change: impl FnOnce(&mut T),
    ) -> anyhow::Result<()> {
        let mut record = self
            .records
            .get(date)
            .get(index)
            .cloned()
            .ok_or_else(|| RecordError::IndexOutOfRange {
                date: date.to_string(),
                index,
            })?;
        change(&mut record);
        self.records.upsert(date, Some(index), record)?;
        self.persist()
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        if let Err(err) = self.store.save(&self.records) {
            error!(error = %err, "failed to save records; memory and storage now differ");
            return Err(err);
        }
        Ok(())
    }

    fn require_date(&self) -> anyhow::Result<&str> {
        self.selected_date
            .as_deref()
            .ok_or_else(|| anyhow!("select a date first"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub total: usize,
    pub completed: usize,
    pub recurring: usize,
    pub average_priority: Option<f64>,
    pub average_performance: Option<f64>,
    pub subtasks_total: usize,
    pub subtasks_completed: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl PerformanceSummary {
    pub fn from_tasks(tasks: &RecordMap<Task>) -> Self {
        let mut summary = Self::default();
        let mut priority_sum = 0_u64;
        let mut performance_sum = 0_u64;

        for (_, records) in tasks.iter() {
            for task in records {
                summary.total += 1;
                if task.completed {
                    summary.completed += 1;
                }
                if task.recurring {
                    summary.recurring += 1;
                }
                priority_sum += u64::from(task.priority_rating.value());
                performance_sum += u64::from(task.performance_rating.value());
                summary.subtasks_total += task.sub_tasks.len();
                summary.subtasks_completed += task.sub_tasks.iter().filter(|s| s.completed).count();
                for kind in &task.types {
                    *summary.by_type.entry(kind.clone()).or_default() += 1;
                }
            }
        }

        if summary.total > 0 {
            let n = summary.total as f64;
            summary.average_priority = Some(priority_sum as f64 / n);
            summary.average_performance = Some(performance_sum as f64 / n);
        }
        summary
    }

    pub fn completion_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.completed as f64 / self.total as f64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::storage::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0)
            .single()
            .expect("valid now")
    }

    fn timed(title: &str, start: &str) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            start_time: start.to_string(),
            ..EventDraft::default()
        }
    }

    /// Refuses every write.
    #[derive(Debug, Default)]
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("storage is read-only: {key}"))
        }

        fn remove(&mut self, _key: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn state_machine_walks_through_add() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        assert_eq!(screen.state(), ScreenState::Idle);
        assert!(screen.open_add().is_err());

        screen.select_date("2024-06-01").unwrap();
        assert_eq!(screen.state(), ScreenState::DateSelected);

        let draft = screen.open_add().unwrap();
        assert_eq!(screen.state(), ScreenState::Editing { edit_index: None });

        screen.save(draft, now()).unwrap();
        assert_eq!(screen.state(), ScreenState::DateSelected);
        assert_eq!(screen.selected_records().len(), 1);
    }

    #[test]
    fn save_without_open_editor_fails() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        assert!(screen.save(EventDraft::default(), now()).is_err());
    }

    #[test]
    fn blank_event_title_discards_the_save() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        let mut draft = screen.open_add().unwrap();
        draft.title.clear();

        let outcome = screen.save(draft, now()).unwrap();
        assert_eq!(outcome, SaveOutcome::Discarded);
        assert!(screen.records().is_empty());
        assert_eq!(screen.state(), ScreenState::DateSelected);
        assert!(screen.store().backend().get(EVENT_KEY).unwrap().is_none());
    }

    #[test]
    fn blank_quick_task_title_discards_the_save() {
        let mut screen = QuickTaskScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        let draft = screen.open_add().unwrap();
        assert_eq!(screen.save(draft, now()).unwrap(), SaveOutcome::Discarded);
        assert!(screen.records().is_empty());
    }

    #[test]
    fn blank_extended_task_title_is_rejected_and_editor_stays_open() {
        let mut screen = TaskScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        let draft = screen.open_add().unwrap();
        let err = screen.save(draft, now()).unwrap_err();
        assert_eq!(err.downcast_ref::<EditorError>(), Some(&EditorError::EmptyTitle));
        assert_eq!(screen.state(), ScreenState::Editing { edit_index: None });
    }

    #[test]
    fn records_are_sorted_after_each_save() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        for (title, start) in [("late", "10:00"), ("early", "09:00")] {
            screen.open_add().unwrap();
            screen.save(timed(title, start), now()).unwrap();
        }
        let starts: Vec<_> = screen
            .selected_records()
            .iter()
            .filter_map(|e| e.start_time.as_deref())
            .collect();
        assert_eq!(starts, vec!["09:00", "10:00"]);
    }

    #[test]
    fn edit_keeps_id_and_position() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        screen.open_add().unwrap();
        screen.save(timed("Lunch", "12:00"), now()).unwrap();
        let id = screen.selected_records()[0].id.clone();

        let mut draft = screen.open_edit(0).unwrap();
        draft.title = "Lunch with Sam".to_string();
        let outcome = screen.save(draft, now()).unwrap();

        assert_eq!(outcome, SaveOutcome::Saved { index: 0 });
        assert_eq!(screen.selected_records()[0].id, id);
        assert_eq!(screen.selected_records()[0].title, "Lunch with Sam");
    }

    #[test]
    fn delete_goes_through_confirmation() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        screen.open_add().unwrap();
        screen.save(timed("Lunch", "12:00"), now()).unwrap();

        let pending = screen.request_delete(0).unwrap();
        assert_eq!(pending.title, "Lunch");
        assert!(pending.prompt().contains("Lunch"));
        assert!(screen.request_delete(5).is_err());

        screen.confirm_delete(pending).unwrap();
        assert!(screen.records().is_empty());
        assert!(screen.marked_dates().is_empty());
    }

    #[test]
    fn failed_write_keeps_memory_change_and_reports() {
        let mut screen = CalendarScreen::mount(ReadOnlyStore).unwrap();
        screen.select_date("2024-06-01").unwrap();
        screen.open_add().unwrap();
        assert!(screen.save(timed("Lunch", "12:00"), now()).is_err());
        assert_eq!(screen.selected_records().len(), 1);
        assert_eq!(screen.state(), ScreenState::DateSelected);
    }

    #[test]
    fn failed_delete_leaves_map_intact() {
        let mut backend = MemoryStore::new();
        backend
            .set(EVENT_KEY, r#"{"2024-06-01":[{"id":"1","title":"x"}]}"#)
            .unwrap();
        let mut screen = CalendarScreen::mount(backend).unwrap();
        screen.select_date("2024-06-01").unwrap();
        let pending = screen.request_delete(0).unwrap();

        let mut read_only = CalendarScreen::mount(ReadOnlyStore).unwrap();
        read_only.records = screen.records().clone();
        read_only.select_date("2024-06-01").unwrap();
        assert!(read_only.confirm_delete(pending).is_err());
        assert_eq!(read_only.records().record_count(), 1);
    }

    #[test]
    fn task_completion_updates_in_place() {
        let mut screen = TaskScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        let mut draft = screen.open_add().unwrap();
        draft.title = "Report".to_string();
        screen.save(draft, now()).unwrap();

        screen
            .update_record("2024-06-01", 0, |task| task.completed = true)
            .unwrap();
        assert!(screen.selected_records()[0].completed);
        assert!(screen.update_record("2024-06-01", 4, |_| {}).is_err());
    }

    #[test]
    fn performance_summary_averages_ratings() {
        let mut screen = TaskScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        for (title, done, kind) in [("a", true, "work"), ("b", false, "home")] {
            let mut draft = screen.open_add().unwrap();
            draft.title = title.to_string();
            draft.completed = done;
            draft.types = vec![kind.to_string()];
            draft.priority_rating = crate::record::Rating::new(if done { 80 } else { 40 });
            screen.save(draft, now()).unwrap();
        }

        let summary = PerformanceSummary::from_tasks(screen.records());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.completion_rate(), Some(0.5));
        assert_eq!(summary.average_priority, Some(60.0));
        assert_eq!(summary.by_type.get("work"), Some(&1));
        assert_eq!(PerformanceSummary::default().completion_rate(), None);
    }

    #[test]
    fn selected_dates_are_keyed_canonically() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        for (date, title) in [(" 2024-06-01", "a"), ("2024-6-1", "b"), ("2024-06-01", "c")] {
            screen.select_date(date).unwrap();
            assert_eq!(screen.selected_date(), Some("2024-06-01"));
            let mut draft = screen.open_add().unwrap();
            draft.title = title.to_string();
            screen.save(draft, now()).unwrap();
        }

        assert_eq!(screen.marked_dates(), vec!["2024-06-01"]);
        assert_eq!(screen.records().get("2024-06-01").len(), 3);
    }

    #[test]
    fn saved_index_is_right_when_ids_collide() {
        let mut screen = CalendarScreen::mount(MemoryStore::new()).unwrap();
        screen.select_date("2024-06-01").unwrap();
        screen.open_add().unwrap();
        screen.save(timed("b", "10:00"), now()).unwrap();
        screen.open_add().unwrap();
        let outcome = screen.save(timed("a", "11:00"), now()).unwrap();

        assert_eq!(outcome, SaveOutcome::Saved { index: 1 });
        assert_eq!(screen.selected_records()[1].title, "a");
    }

    #[test]
    fn unreadable_storage_fails_the_mount() {
        let mut backend = MemoryStore::new();
        backend.set(EVENT_KEY, "not json").unwrap();
        assert!(CalendarScreen::mount(backend).is_err());
    }
}
