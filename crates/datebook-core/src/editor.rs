//! Form state behind the add/edit sheets.
//!
//! A form is created fresh by `open` for every invocation and owns its fields
//! until `submit` hands back a draft. Nothing here touches storage.

use crate::datetime::{compose_date, compose_time, parse_date_parts, parse_time};
use crate::error::{EditorError, RecordError};
use crate::picker::TimeWheel;
use crate::record::{Event, FrequencyPattern, Rating, RecordId, SimpleTask, SubTask, Task};

pub const DEFAULT_START: &str = "08:00";
pub const DEFAULT_END: &str = "09:00";
pub const DEFAULT_SIMPLE_TIME: &str = "09:00";
pub const DEFAULT_EVENT_TITLE: &str = "New Event";

fn validated_time(value: &str) -> Result<String, RecordError> {
    let (hour, minute) = parse_time(value)?;
    Ok(compose_time(hour, minute))
}

fn validated_date(value: &str) -> Result<String, RecordError> {
    let (year, month, day) = parse_date_parts(value)?;
    Ok(compose_date(year, month, day))
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub all_day: bool,
    pub start_time: String,
    pub end_time: String,
    pub notes: String,
}

impl Default for EventDraft {
    fn default() -> Self {
        Self {
            title: DEFAULT_EVENT_TITLE.to_string(),
            all_day: false,
            start_time: DEFAULT_START.to_string(),
            end_time: DEFAULT_END.to_string(),
            notes: String::new(),
        }
    }
}

impl EventDraft {
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            all_day: event.all_day,
            start_time: event.start_time.clone().unwrap_or_default(),
            end_time: event.end_time.clone().unwrap_or_default(),
            notes: event.notes.clone().unwrap_or_default(),
        }
    }

    pub fn into_event(self, id: RecordId) -> Event {
        let (start_time, end_time) = if self.all_day {
            (None, None)
        } else {
            (optional(&self.start_time), optional(&self.end_time))
        };
        Event {
            id,
            title: self.title,
            all_day: self.all_day,
            start_time,
            end_time,
            notes: optional(&self.notes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventForm {
    draft: EventDraft,
    default_start: String,
    default_end: String,
    active_picker: Option<TimeField>,
}

impl EventForm {
    pub fn open(initial: EventDraft) -> Self {
        Self {
            draft: initial,
            default_start: DEFAULT_START.to_string(),
            default_end: DEFAULT_END.to_string(),
            active_picker: None,
        }
    }

    /// Times restored when all-day is switched back off.
    pub fn with_default_times(mut self, start: &str, end: &str) -> Result<Self, RecordError> {
        self.default_start = validated_time(start)?;
        self.default_end = validated_time(end)?;
        Ok(self)
    }

    pub fn draft(&self) -> &EventDraft {
        &self.draft
    }

    pub fn set_title(&mut self, title: &str) {
        self.draft.title = title.to_string();
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.draft.notes = notes.to_string();
    }

    pub fn set_time(&mut self, field: TimeField, value: &str) -> Result<(), RecordError> {
        let value = validated_time(value)?;
        match field {
            TimeField::Start => self.draft.start_time = value,
            TimeField::End => self.draft.end_time = value,
        }
        Ok(())
    }

    pub fn toggle_all_day(&mut self) {
        self.draft.all_day = !self.draft.all_day;
        if self.draft.all_day {
            self.draft.start_time.clear();
            self.draft.end_time.clear();
        } else {
            self.draft.start_time = self.default_start.clone();
            self.draft.end_time = self.default_end.clone();
        }
        self.active_picker = None;
    }

    /// Opens the wheel for `field`, closing the other one, or closes it if
    /// it was already showing.
    pub fn toggle_picker(&mut self, field: TimeField) -> Option<TimeWheel> {
        if self.draft.all_day || self.active_picker == Some(field) {
            self.active_picker = None;
            return None;
        }
        self.active_picker = Some(field);
        let current = match field {
            TimeField::Start => &self.draft.start_time,
            TimeField::End => &self.draft.end_time,
        };
        Some(TimeWheel::open(current))
    }

    pub fn active_picker(&self) -> Option<TimeField> {
        self.active_picker
    }

    pub fn submit(&self) -> EventDraft {
        self.draft.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTaskDraft {
    pub title: String,
    pub time: String,
    pub notes: String,
}

impl Default for SimpleTaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            time: DEFAULT_SIMPLE_TIME.to_string(),
            notes: String::new(),
        }
    }
}

impl SimpleTaskDraft {
    pub fn from_task(task: &SimpleTask) -> Self {
        Self {
            title: task.title.clone(),
            time: task.time.clone(),
            notes: task.notes.clone().unwrap_or_default(),
        }
    }

    pub fn into_task(self, id: RecordId) -> SimpleTask {
        SimpleTask {
            id,
            title: self.title,
            time: self.time,
            notes: optional(&self.notes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimpleTaskForm {
    draft: SimpleTaskDraft,
    dropdown_open: bool,
}

impl SimpleTaskForm {
    pub fn open(initial: SimpleTaskDraft) -> Self {
        Self {
            draft: initial,
            dropdown_open: false,
        }
    }

    /// Half-hour slots across the day.
    pub fn time_options() -> Vec<String> {
        (0..24)
            .flat_map(|hour| [0, 30].map(|minute| compose_time(hour, minute)))
            .collect()
    }

    pub fn draft(&self) -> &SimpleTaskDraft {
        &self.draft
    }

    pub fn set_title(&mut self, title: &str) {
        self.draft.title = title.to_string();
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.draft.notes = notes.to_string();
    }

    pub fn toggle_dropdown(&mut self) -> bool {
        self.dropdown_open = !self.dropdown_open;
        self.dropdown_open
    }

    pub fn select_time(&mut self, time: &str) -> Result<(), RecordError> {
        self.draft.time = validated_time(time)?;
        self.dropdown_open = false;
        Ok(())
    }

    pub fn submit(&self) -> SimpleTaskDraft {
        self.draft.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTaskDraft {
    pub id: Option<RecordId>,
    pub title: String,
    pub priority_rating: Rating,
    pub performance_rating: Rating,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub notes: String,
    pub all_day: bool,
    pub start_time: String,
    pub end_time: String,
    pub priority_rating: Rating,
    pub performance_rating: Rating,
    pub completed: bool,
    pub start_date: String,
    pub end_date: String,
    pub recurring: bool,
    pub frequency_pattern: FrequencyPattern,
    pub frequency_count: u32,
    pub sub_tasks: Vec<SubTaskDraft>,
    pub types: Vec<String>,
    pub estimated_duration: Option<u32>,
    pub actual_duration: Option<u32>,
}

impl TaskDraft {
    pub fn for_date(date: &str) -> Self {
        Self {
            title: String::new(),
            notes: String::new(),
            all_day: false,
            start_time: DEFAULT_START.to_string(),
            end_time: DEFAULT_END.to_string(),
            priority_rating: Rating::new(50),
            performance_rating: Rating::new(50),
            completed: false,
            start_date: date.to_string(),
            end_date: date.to_string(),
            recurring: false,
            frequency_pattern: FrequencyPattern::None,
            frequency_count: 1,
            sub_tasks: vec![],
            types: vec![],
            estimated_duration: None,
            actual_duration: None,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            notes: task.notes.clone().unwrap_or_default(),
            all_day: task.all_day,
            start_time: task.start_time.clone().unwrap_or_default(),
            end_time: task.end_time.clone().unwrap_or_default(),
            priority_rating: task.priority_rating,
            performance_rating: task.performance_rating,
            completed: task.completed,
            start_date: task.start_date.clone(),
            end_date: task.end_date.clone(),
            recurring: task.recurring,
            frequency_pattern: task.frequency_pattern,
            frequency_count: task.frequency_count,
            sub_tasks: task
                .sub_tasks
                .iter()
                .map(|sub| SubTaskDraft {
                    id: Some(sub.id.clone()),
                    title: sub.title.clone(),
                    priority_rating: sub.priority_rating,
                    performance_rating: sub.performance_rating,
                    completed: sub.completed,
                })
                .collect(),
            types: task.types.clone(),
            estimated_duration: task.estimated_duration,
            actual_duration: task.actual_duration,
        }
    }

    /// Subtasks without an id get `<task id>-<n>`, numbered past any
    /// existing suffix.
    pub fn into_task(self, id: RecordId) -> Task {
        let mut next_suffix = self
            .sub_tasks
            .iter()
            .filter_map(|sub| sub.id.as_ref())
            .filter_map(|sub_id| {
                sub_id
                    .as_str()
                    .strip_prefix(&format!("{id}-"))
                    .and_then(|n| n.parse::<u32>().ok())
            })
            .max()
            .map_or(0, |n| n + 1);

        let sub_tasks = self
            .sub_tasks
            .into_iter()
            .enumerate()
            .map(|(order, sub)| {
                let sub_id = sub.id.unwrap_or_else(|| {
                    let fresh = RecordId::from(format!("{id}-{next_suffix}"));
                    next_suffix += 1;
                    fresh
                });
                SubTask {
                    id: sub_id,
                    task_id: id.clone(),
                    title: sub.title,
                    date: self.start_date.clone(),
                    order: u32::try_from(order).unwrap_or(u32::MAX),
                    priority_rating: sub.priority_rating,
                    performance_rating: sub.performance_rating,
                    completed: sub.completed,
                }
            })
            .collect();

        let (start_time, end_time) = if self.all_day {
            (None, None)
        } else {
            (optional(&self.start_time), optional(&self.end_time))
        };

        Task {
            id,
            title: self.title,
            all_day: self.all_day,
            start_time,
            end_time,
            notes: optional(&self.notes),
            priority_rating: self.priority_rating,
            performance_rating: self.performance_rating,
            completed: self.completed,
            start_date: self.start_date,
            end_date: self.end_date,
            frequency_pattern: self.frequency_pattern,
            frequency_count: self.frequency_count,
            sub_tasks,
            types: self.types,
            estimated_duration: self.estimated_duration,
            actual_duration: self.actual_duration,
            recurring: self.recurring,
        }
    }
}

/// Drag-to-set numeric control over a measured horizontal track.
#[derive(Debug, Clone, PartialEq)]
pub struct Slider {
    minimum: f64,
    maximum: f64,
    step: f64,
    value: f64,
    track_origin: f64,
    track_width: f64,
    dragging: bool,
}

impl Slider {
    pub fn new(minimum: f64, maximum: f64, step: f64, value: f64) -> Self {
        let mut slider = Self {
            minimum,
            maximum,
            step,
            value: minimum,
            track_origin: 0.0,
            track_width: 0.0,
            dragging: false,
        };
        slider.value = slider.quantize(value);
        slider
    }

    /// Records the track's laid-out position.
    pub fn measure(&mut self, origin: f64, width: f64) {
        self.track_origin = origin;
        self.track_width = width;
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) -> f64 {
        self.value = self.quantize(value);
        self.value
    }

    /// The enclosing scroll view must not scroll while a drag is live.
    pub fn scroll_enabled(&self) -> bool {
        !self.dragging
    }

    pub fn begin_drag(&mut self, x: f64) -> f64 {
        self.dragging = true;
        self.drag_to(x)
    }

    pub fn drag_to(&mut self, x: f64) -> f64 {
        if let Some(value) = self.value_at(x) {
            self.value = value;
        }
        self.value
    }

    pub fn end_drag(&mut self) -> f64 {
        self.dragging = false;
        self.value
    }

    /// `None` until the track has been measured.
    pub fn value_at(&self, x: f64) -> Option<f64> {
        if self.track_width <= 0.0 {
            return None;
        }
        let ratio = ((x - self.track_origin) / self.track_width).clamp(0.0, 1.0);
        Some(self.quantize(self.minimum + ratio * (self.maximum - self.minimum)))
    }

    fn quantize(&self, raw: f64) -> f64 {
        let clamped = raw.clamp(self.minimum, self.maximum);
        if self.step <= 0.0 {
            return clamped;
        }
        let steps = ((clamped - self.minimum) / self.step).round();
        (self.minimum + steps * self.step).clamp(self.minimum, self.maximum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingField {
    Priority,
    Performance,
}

#[derive(Debug, Clone)]
pub struct TaskForm {
    draft: TaskDraft,
    default_start: String,
    default_end: String,
    priority: Slider,
    performance: Slider,
}

fn rating_slider(rating: Rating) -> Slider {
    Slider::new(0.0, f64::from(Rating::MAX), 1.0, f64::from(rating.value()))
}

fn slider_rating(value: f64) -> Rating {
    Rating::new(value.round().max(0.0) as u32)
}

impl TaskForm {
    pub fn open(initial: TaskDraft) -> Self {
        Self {
            priority: rating_slider(initial.priority_rating),
            performance: rating_slider(initial.performance_rating),
            draft: initial,
            default_start: DEFAULT_START.to_string(),
            default_end: DEFAULT_END.to_string(),
        }
    }

    /// Times restored when all-day is switched back off.
    pub fn with_default_times(mut self, start: &str, end: &str) -> Result<Self, RecordError> {
        self.default_start = validated_time(start)?;
        self.default_end = validated_time(end)?;
        Ok(self)
    }

    pub fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    pub fn set_title(&mut self, title: &str) {
        self.draft.title = title.to_string();
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.draft.notes = notes.to_string();
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.draft.completed = completed;
    }

    pub fn toggle_all_day(&mut self) {
        self.draft.all_day = !self.draft.all_day;
        if self.draft.all_day {
            self.draft.start_time.clear();
            self.draft.end_time.clear();
        } else {
            self.draft.start_time = self.default_start.clone();
            self.draft.end_time = self.default_end.clone();
        }
    }

    pub fn set_time(&mut self, field: TimeField, value: &str) -> Result<(), RecordError> {
        let value = validated_time(value)?;
        match field {
            TimeField::Start => self.draft.start_time = value,
            TimeField::End => self.draft.end_time = value,
        }
        Ok(())
    }

    /// Moving the start past the end drags the end along.
    pub fn set_start_date(&mut self, date: &str) -> Result<(), RecordError> {
        let date = validated_date(date)?;
        if self.draft.end_date < date {
            self.draft.end_date = date.clone();
        }
        self.draft.start_date = date;
        Ok(())
    }

    pub fn set_end_date(&mut self, date: &str) -> Result<(), RecordError> {
        self.draft.end_date = validated_date(date)?;
        Ok(())
    }

    pub fn toggle_recurring(&mut self) {
        self.draft.recurring = !self.draft.recurring;
        self.draft.frequency_pattern = if self.draft.recurring {
            FrequencyPattern::Daily
        } else {
            FrequencyPattern::None
        };
    }

    pub fn set_frequency(&mut self, pattern: FrequencyPattern, count: u32) {
        self.draft.frequency_pattern = pattern;
        self.draft.frequency_count = count.max(1);
        self.draft.recurring = pattern != FrequencyPattern::None;
    }

    /// Blank titles are ignored. Returns whether a subtask was added.
    pub fn add_subtask(&mut self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        self.draft.sub_tasks.push(SubTaskDraft {
            id: None,
            title: title.to_string(),
            priority_rating: Rating::default(),
            performance_rating: Rating::default(),
            completed: false,
        });
        true
    }

    pub fn remove_subtask(&mut self, index: usize) -> Option<SubTaskDraft> {
        if index < self.draft.sub_tasks.len() {
            Some(self.draft.sub_tasks.remove(index))
        } else {
            None
        }
    }

    pub fn set_subtask_completed(&mut self, index: usize, completed: bool) -> bool {
        match self.draft.sub_tasks.get_mut(index) {
            Some(sub) => {
                sub.completed = completed;
                true
            }
            None => false,
        }
    }

    /// Trimmed, blank ignored, duplicates ignored.
    pub fn add_type(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.draft.types.iter().any(|t| t == tag) {
            return false;
        }
        self.draft.types.push(tag.to_string());
        true
    }

    pub fn remove_type(&mut self, tag: &str) -> bool {
        let before = self.draft.types.len();
        self.draft.types.retain(|t| t != tag.trim());
        self.draft.types.len() != before
    }

    pub fn set_estimated_duration(&mut self, minutes: Option<u32>) {
        self.draft.estimated_duration = minutes;
    }

    pub fn set_actual_duration(&mut self, minutes: Option<u32>) {
        self.draft.actual_duration = minutes;
    }

    pub fn set_rating(&mut self, field: RatingField, value: u32) {
        let slider = self.slider_mut(field);
        let value = slider.set_value(f64::from(value));
        self.store_rating(field, value);
    }

    pub fn measure_rating_track(&mut self, field: RatingField, origin: f64, width: f64) {
        self.slider_mut(field).measure(origin, width);
    }

    pub fn begin_rating_drag(&mut self, field: RatingField, x: f64) -> Rating {
        let value = self.slider_mut(field).begin_drag(x);
        self.store_rating(field, value)
    }

    pub fn drag_rating(&mut self, field: RatingField, x: f64) -> Rating {
        let value = self.slider_mut(field).drag_to(x);
        self.store_rating(field, value)
    }

    pub fn end_rating_drag(&mut self, field: RatingField) -> Rating {
        let value = self.slider_mut(field).end_drag();
        self.store_rating(field, value)
    }

    pub fn scroll_enabled(&self) -> bool {
        self.priority.scroll_enabled() && self.performance.scroll_enabled()
    }

    pub fn submit(&self) -> Result<TaskDraft, EditorError> {
        if self.draft.title.trim().is_empty() {
            return Err(EditorError::EmptyTitle);
        }
        Ok(self.draft.clone())
    }

    fn slider_mut(&mut self, field: RatingField) -> &mut Slider {
        match field {
            RatingField::Priority => &mut self.priority,
            RatingField::Performance => &mut self.performance,
        }
    }

    fn store_rating(&mut self, field: RatingField, value: f64) -> Rating {
        let rating = slider_rating(value);
        match field {
            RatingField::Priority => self.draft.priority_rating = rating,
            RatingField::Performance => self.draft.performance_rating = rating,
        }
        rating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_form_defaults() {
        let form = EventForm::open(EventDraft::default());
        let draft = form.submit();
        assert_eq!(draft.title, "New Event");
        assert_eq!(draft.start_time, "08:00");
        assert_eq!(draft.end_time, "09:00");
        assert!(!draft.all_day);
    }

    #[test]
    fn all_day_toggle_clears_and_restores_times() {
        let mut form = EventForm::open(EventDraft::default());
        form.set_time(TimeField::Start, "10:15").unwrap();
        form.toggle_all_day();
        assert!(form.draft().start_time.is_empty());
        assert!(form.draft().end_time.is_empty());

        form.toggle_all_day();
        assert_eq!(form.draft().start_time, "08:00");
        assert_eq!(form.draft().end_time, "09:00");
    }

    #[test]
    fn custom_default_times_are_restored() {
        let mut form = EventForm::open(EventDraft::default())
            .with_default_times("07:30", "08:30")
            .unwrap();
        form.toggle_all_day();
        form.toggle_all_day();
        assert_eq!(form.draft().start_time, "07:30");
    }

    #[test]
    fn only_one_time_picker_is_open() {
        let mut form = EventForm::open(EventDraft::default());
        let wheel = form.toggle_picker(TimeField::Start).expect("opens");
        assert_eq!(wheel.value(), "08:00");
        assert!(form.toggle_picker(TimeField::End).is_some());
        assert_eq!(form.active_picker(), Some(TimeField::End));
        assert!(form.toggle_picker(TimeField::End).is_none());
        assert_eq!(form.active_picker(), None);
    }

    #[test]
    fn event_form_submits_empty_title() {
        let mut form = EventForm::open(EventDraft::default());
        form.set_title("");
        assert_eq!(form.submit().title, "");
    }

    #[test]
    fn all_day_draft_drops_times_on_conversion() {
        let mut form = EventForm::open(EventDraft::default());
        form.toggle_all_day();
        let event = form.submit().into_event(RecordId::from("1"));
        assert!(event.all_day);
        assert_eq!(event.start_time, None);
        assert_eq!(event.notes, None);
    }

    #[test]
    fn simple_task_time_options_cover_the_day() {
        let options = SimpleTaskForm::time_options();
        assert_eq!(options.len(), 48);
        assert_eq!(options[0], "00:00");
        assert_eq!(options[47], "23:30");

        let mut form = SimpleTaskForm::open(SimpleTaskDraft::default());
        assert!(form.toggle_dropdown());
        form.select_time("14:30").unwrap();
        assert_eq!(form.submit().time, "14:30");
        assert!(form.select_time("25:00").is_err());
    }

    #[test]
    fn extended_form_requires_title() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.set_title("   ");
        assert_eq!(form.submit(), Err(EditorError::EmptyTitle));
        form.set_title("Write report");
        assert!(form.submit().is_ok());
    }

    #[test]
    fn recurring_toggle_sets_frequency() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.toggle_recurring();
        assert_eq!(form.draft().frequency_pattern, FrequencyPattern::Daily);
        form.toggle_recurring();
        assert_eq!(form.draft().frequency_pattern, FrequencyPattern::None);
    }

    #[test]
    fn types_are_deduplicated_and_removed_by_value() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        assert!(form.add_type("work"));
        assert!(!form.add_type(" work "));
        assert!(!form.add_type(""));
        assert!(form.add_type("deep"));
        assert!(form.remove_type("work"));
        assert_eq!(form.draft().types, vec!["deep"]);
    }

    #[test]
    fn subtasks_get_ids_and_orders_on_conversion() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.set_title("Move house");
        form.add_subtask("pack");
        form.add_subtask("  ");
        form.add_subtask("clean");
        form.add_subtask("ship");
        form.remove_subtask(1);

        let task = form.submit().unwrap().into_task(RecordId::from("42"));
        let ids: Vec<_> = task.sub_tasks.iter().map(|s| s.id.as_str()).collect();
        let orders: Vec<_> = task.sub_tasks.iter().map(|s| s.order).collect();
        assert_eq!(ids, vec!["42-0", "42-1"]);
        assert_eq!(orders, vec![0, 1]);
        assert!(task.sub_tasks.iter().all(|s| s.task_id.as_str() == "42"));
        assert_eq!(task.sub_tasks[1].title, "ship");
    }

    #[test]
    fn existing_subtask_ids_survive_an_edit() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.set_title("t");
        form.add_subtask("a");
        let task = form.submit().unwrap().into_task(RecordId::from("9"));

        let mut again = TaskForm::open(TaskDraft::from_task(&task));
        again.add_subtask("b");
        let edited = again.submit().unwrap().into_task(task.id.clone());
        assert_eq!(edited.sub_tasks[0].id.as_str(), "9-0");
        assert_eq!(edited.sub_tasks[1].id.as_str(), "9-1");
    }

    #[test]
    fn start_date_pushes_end_date() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.set_start_date("2024-06-05").unwrap();
        assert_eq!(form.draft().end_date, "2024-06-05");
        assert!(form.set_end_date("2024-13-01").is_err());
    }

    #[test]
    fn slider_maps_position_linearly_and_quantizes() {
        let mut slider = Slider::new(0.0, 100.0, 5.0, 50.0);
        assert_eq!(slider.value_at(10.0), None);

        slider.measure(20.0, 200.0);
        assert_eq!(slider.begin_drag(20.0), 0.0);
        assert!(!slider.scroll_enabled());
        assert_eq!(slider.drag_to(120.0), 50.0);
        assert_eq!(slider.drag_to(124.0), 50.0);
        assert_eq!(slider.drag_to(127.0), 55.0);
        assert_eq!(slider.drag_to(5000.0), 100.0);
        assert_eq!(slider.drag_to(-40.0), 0.0);
        slider.end_drag();
        assert!(slider.scroll_enabled());
    }

    #[test]
    fn task_all_day_off_restores_configured_times() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"))
            .with_default_times("07:30", "8:45")
            .unwrap();
        form.toggle_all_day();
        assert!(form.draft().start_time.is_empty());
        form.toggle_all_day();
        assert_eq!(form.draft().start_time, "07:30");
        assert_eq!(form.draft().end_time, "08:45");
        assert!(TaskForm::open(TaskDraft::for_date("2024-06-01"))
            .with_default_times("25:00", "09:00")
            .is_err());
    }

    #[test]
    fn task_dates_are_stored_canonically() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.set_start_date(" 2024-6-3").unwrap();
        assert_eq!(form.draft().start_date, "2024-06-03");
        assert_eq!(form.draft().end_date, "2024-06-03");
        form.set_end_date("2024-6-10").unwrap();
        assert_eq!(form.draft().end_date, "2024-06-10");
    }

    #[test]
    fn rating_drag_updates_draft_and_blocks_scrolling() {
        let mut form = TaskForm::open(TaskDraft::for_date("2024-06-01"));
        form.measure_rating_track(RatingField::Priority, 0.0, 100.0);
        form.begin_rating_drag(RatingField::Priority, 80.0);
        assert!(!form.scroll_enabled());
        assert_eq!(form.drag_rating(RatingField::Priority, 35.4).value(), 35);
        assert_eq!(form.draft().priority_rating.value(), 35);
        form.drag_rating(RatingField::Priority, 80.0);
        let rating = form.end_rating_drag(RatingField::Priority);
        assert_eq!(rating.value(), 80);
        assert_eq!(form.draft().priority_rating.value(), 80);
        assert!(form.scroll_enabled());

        form.set_rating(RatingField::Performance, 300);
        assert_eq!(form.draft().performance_rating.value(), 100);
    }
}
