//! Records attached to calendar dates and the date-keyed map that holds them.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Opaque record identifier, derived from the creation instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn from_timestamp(now: DateTime<Utc>) -> Self {
        Self(now.timestamp_millis().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 0-100 score; out-of-range input is clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Self {
        Self(value.min(Self::MAX) as u8)
    }

    pub fn value(self) -> u32 {
        u32::from(self.0)
    }
}

impl From<u32> for Rating {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Rating> for u32 {
    fn from(value: Rating) -> Self {
        value.value()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyPattern {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl FrequencyPattern {
    pub const ALL: [FrequencyPattern; 6] = [
        FrequencyPattern::None,
        FrequencyPattern::Daily,
        FrequencyPattern::Weekly,
        FrequencyPattern::Monthly,
        FrequencyPattern::Yearly,
        FrequencyPattern::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FrequencyPattern::None => "none",
            FrequencyPattern::Daily => "daily",
            FrequencyPattern::Weekly => "weekly",
            FrequencyPattern::Monthly => "monthly",
            FrequencyPattern::Yearly => "yearly",
            FrequencyPattern::Custom => "custom",
        }
    }
}

impl std::str::FromStr for FrequencyPattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown frequency pattern: {s}"))
    }
}

fn default_frequency_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The single-time task variant used by the quick task form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleTask {
    pub id: RecordId,
    pub title: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: RecordId,
    pub task_id: RecordId,
    pub title: String,
    pub date: String,
    pub order: u32,
    #[serde(default)]
    pub priority_rating: Rating,
    #[serde(default)]
    pub performance_rating: Rating,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub priority_rating: Rating,
    #[serde(default)]
    pub performance_rating: Rating,
    #[serde(default)]
    pub completed: bool,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub frequency_pattern: FrequencyPattern,
    #[serde(default = "default_frequency_count")]
    pub frequency_count: u32,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<u32>,
    #[serde(default)]
    pub recurring: bool,
}

/// What the map and the screens need to know about any record type.
pub trait Schedulable {
    fn id(&self) -> &RecordId;

    fn title(&self) -> &str;

    /// Start time used for ordering; `None` sorts after timed records.
    fn start_time(&self) -> Option<&str>;

    /// Builds a record from a bare title in the oldest stored shape
    /// (`date -> [string]`). Types that cannot be upgraded return `None`.
    fn from_legacy_title(_id: RecordId, _title: String) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Schedulable for Event {
    fn id(&self) -> &RecordId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn start_time(&self) -> Option<&str> {
        non_empty(&self.start_time)
    }

    fn from_legacy_title(id: RecordId, title: String) -> Option<Self> {
        Some(Self {
            id,
            title,
            all_day: true,
            start_time: None,
            end_time: None,
            notes: None,
        })
    }
}

impl Schedulable for SimpleTask {
    fn id(&self) -> &RecordId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn start_time(&self) -> Option<&str> {
        Some(self.time.as_str())
    }

    fn from_legacy_title(id: RecordId, title: String) -> Option<Self> {
        Some(Self {
            id,
            title,
            time: String::new(),
            notes: None,
        })
    }
}

impl Schedulable for Task {
    fn id(&self) -> &RecordId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn start_time(&self) -> Option<&str> {
        non_empty(&self.start_time)
    }
}

pub fn compare_records<T: Schedulable>(a: &T, b: &T) -> Ordering {
    match (a.start_time(), b.start_time()) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.title().cmp(b.title())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.title().cmp(b.title()),
    }
}

/// Date string (`YYYY-MM-DD`) to the records on that date.
///
/// A date key exists only while its sequence is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordMap<T> {
    entries: BTreeMap<String, Vec<T>>,
}

impl<T> Default for RecordMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> RecordMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: &str) -> &[T] {
        self.entries.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_date(&self, date: &str) -> bool {
        self.entries.contains_key(date)
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(date, records)| (date.as_str(), records.as_slice()))
    }

    /// Number of dates with at least one record.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Removes the record at `index` on `date`, dropping the date once empty.
    /// Absent dates and out-of-range indexes leave the map untouched.
    pub fn remove_at(&mut self, date: &str, index: usize) -> Option<T> {
        let records = self.entries.get_mut(date)?;
        if index >= records.len() {
            return None;
        }
        let removed = records.remove(index);
        if records.is_empty() {
            self.entries.remove(date);
        }
        Some(removed)
    }
}

impl<T: Schedulable> RecordMap<T> {
    /// Replaces the record at `edit_index` (or appends when `None`), then
    /// re-sorts the date. Returns the record's position after sorting.
    pub fn upsert(
        &mut self,
        date: &str,
        edit_index: Option<usize>,
        record: T,
    ) -> Result<usize, RecordError> {
        let records = self.entries.entry(date.to_string()).or_default();

        let target = match edit_index {
            Some(index) if index < records.len() => {
                records[index] = record;
                index
            }
            Some(index) => {
                if records.is_empty() {
                    self.entries.remove(date);
                }
                return Err(RecordError::IndexOutOfRange {
                    date: date.to_string(),
                    index,
                });
            }
            None => {
                records.push(record);
                records.len() - 1
            }
        };

        // Ids may collide within a millisecond, so track the slot through
        // the sort instead of looking the id up afterwards.
        let mut tagged: Vec<(usize, T)> = std::mem::take(records).into_iter().enumerate().collect();
        tagged.sort_by(|(_, a), (_, b)| compare_records(a, b));
        let position = tagged
            .iter()
            .position(|(slot, _)| *slot == target)
            .unwrap_or_default();
        records.extend(tagged.into_iter().map(|(_, record)| record));
        Ok(position)
    }
}

impl<T> FromIterator<(String, Vec<T>)> for RecordMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, Vec<T>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .filter(|(_, records)| !records.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, title: &str, start: Option<&str>) -> Event {
        Event {
            id: RecordId::from(id),
            title: title.to_string(),
            all_day: start.is_none(),
            start_time: start.map(str::to_string),
            end_time: None,
            notes: None,
        }
    }

    #[test]
    fn upsert_reports_the_sorted_slot_for_duplicate_ids() {
        let mut map = RecordMap::new();
        let first = map
            .upsert("2024-06-01", None, event("1", "b", Some("10:00")))
            .expect("append");
        let second = map
            .upsert("2024-06-01", None, event("1", "a", Some("09:00")))
            .expect("append");
        assert_eq!((first, second), (0, 0));

        let edited = map
            .upsert("2024-06-01", Some(0), event("1", "a", Some("11:00")))
            .expect("edit");
        assert_eq!(edited, 1);
        assert_eq!(map.get("2024-06-01")[1].title, "a");
    }

    #[test]
    fn timed_records_sort_by_start_time() {
        let mut map = RecordMap::new();
        map.upsert("2024-06-01", None, event("1", "b", Some("10:00")))
            .expect("append");
        map.upsert("2024-06-01", None, event("2", "a", Some("09:00")))
            .expect("append");

        let starts: Vec<_> = map
            .get("2024-06-01")
            .iter()
            .map(|e| e.start_time.clone().unwrap_or_default())
            .collect();
        assert_eq!(starts, vec!["09:00", "10:00"]);
    }

    #[test]
    fn untimed_records_sort_by_title_after_timed() {
        let mut map = RecordMap::new();
        map.upsert("d", None, event("1", "zebra", None)).unwrap();
        map.upsert("d", None, event("2", "apple", None)).unwrap();
        map.upsert("d", None, event("3", "mid", Some("23:00"))).unwrap();

        let titles: Vec<_> = map.get("d").iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["mid", "apple", "zebra"]);
    }

    #[test]
    fn empty_start_time_counts_as_untimed() {
        let mut blank = event("1", "b", None);
        blank.start_time = Some(String::new());
        let timed = event("2", "a", Some("07:00"));
        assert_eq!(compare_records(&timed, &blank), Ordering::Less);
    }

    #[test]
    fn simple_tasks_sort_by_time_string() {
        let mut map = RecordMap::new();
        for (id, time) in [("1", "14:30"), ("2", "08:00")] {
            map.upsert(
                "d",
                None,
                SimpleTask {
                    id: RecordId::from(id),
                    title: "t".to_string(),
                    time: time.to_string(),
                    notes: None,
                },
            )
            .unwrap();
        }
        assert_eq!(map.get("d")[0].time, "08:00");
    }

    #[test]
    fn upsert_replaces_in_place_and_keeps_id() {
        let mut map = RecordMap::new();
        map.upsert("d", None, event("1", "Lunch", Some("12:00"))).unwrap();
        let pos = map
            .upsert("d", Some(0), event("1", "Lunch with Sam", Some("12:00")))
            .unwrap();
        assert_eq!(pos, 0);
        assert_eq!(map.get("d").len(), 1);
        assert_eq!(map.get("d")[0].title, "Lunch with Sam");
        assert_eq!(map.get("d")[0].id.as_str(), "1");
    }

    #[test]
    fn upsert_with_bad_index_leaves_no_empty_key() {
        let mut map: RecordMap<Event> = RecordMap::new();
        let err = map.upsert("d", Some(3), event("1", "x", None)).unwrap_err();
        assert_eq!(
            err,
            RecordError::IndexOutOfRange {
                date: "d".to_string(),
                index: 3
            }
        );
        assert!(!map.contains_date("d"));
    }

    #[test]
    fn removing_last_record_drops_the_date() {
        let mut map = RecordMap::new();
        map.upsert("d", None, event("1", "x", None)).unwrap();
        assert!(map.remove_at("d", 0).is_some());
        assert!(!map.contains_date("d"));
        assert!(map.is_empty());
        assert!(map.remove_at("missing", 0).is_none());
    }

    #[test]
    fn ratings_clamp_and_serialize_as_numbers() {
        assert_eq!(Rating::new(250).value(), 100);
        let json = serde_json::to_string(&Rating::new(40)).unwrap();
        assert_eq!(json, "40");
        let parsed: Rating = serde_json::from_str("130").unwrap();
        assert_eq!(parsed.value(), 100);
    }

    #[test]
    fn event_serializes_in_camel_case() {
        let json = serde_json::to_value(event("7", "Lunch", Some("12:00"))).unwrap();
        assert_eq!(json["startTime"], "12:00");
        assert_eq!(json["allDay"], false);
        assert!(json.get("endTime").is_none());
    }

    #[test]
    fn frequency_pattern_parses_lowercase_names() {
        assert_eq!(
            "Weekly".parse::<FrequencyPattern>().unwrap(),
            FrequencyPattern::Weekly
        );
        assert!("hourly".parse::<FrequencyPattern>().is_err());
        assert_eq!(
            serde_json::to_string(&FrequencyPattern::None).unwrap(),
            "\"none\""
        );
    }
}
