use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::RecordError;
use crate::record::{RecordId, RecordMap, Schedulable};

pub const EVENT_KEY: &str = "event";
pub const TASK_KEY: &str = "task";
pub const TASK_LIST_KEY: &str = "tasks_list";

/// String key-value persistence, one value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// Stores each key as `<key>.json` under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(anyhow!("invalid storage key: {key:?}"));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, value)
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// Volatile store used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// A record map persisted as one JSON document under a fixed key.
/// Every save rewrites the whole map.
#[derive(Debug)]
pub struct RecordStore<S, T> {
    backend: S,
    key: &'static str,
    _records: PhantomData<T>,
}

impl<S, T> RecordStore<S, T>
where
    S: KeyValueStore,
    T: Schedulable + Serialize + DeserializeOwned,
{
    pub fn new(backend: S, key: &'static str) -> Self {
        Self {
            backend,
            key,
            _records: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// An absent or blank value loads as an empty map.
    #[tracing::instrument(skip(self), fields(key = self.key))]
    pub fn load(&self) -> anyhow::Result<RecordMap<T>> {
        let raw = self
            .backend
            .get(self.key)
            .with_context(|| format!("failed to load '{}'", self.key))?;
        let Some(raw) = raw else {
            debug!("nothing stored, starting empty");
            return Ok(RecordMap::new());
        };

        let map = decode_map(self.key, &raw)?;
        info!(dates = map.len(), records = map.record_count(), "loaded record map");
        Ok(map)
    }

    #[tracing::instrument(skip(self, map), fields(key = self.key, dates = map.len()))]
    pub fn save(&mut self, map: &RecordMap<T>) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(map)
            .with_context(|| format!("failed to serialize '{}'", self.key))?;
        self.backend
            .set(self.key, &serialized)
            .with_context(|| format!("failed to save '{}'", self.key))?;
        debug!(records = map.record_count(), "saved record map");
        Ok(())
    }

    /// Removes `map[date][index]`, drops the date if it empties, persists and
    /// returns the result. An unknown date returns the map unchanged without
    /// writing.
    #[tracing::instrument(skip(self, map), fields(key = self.key))]
    pub fn delete(
        &mut self,
        mut map: RecordMap<T>,
        date: &str,
        index: usize,
    ) -> anyhow::Result<RecordMap<T>> {
        if !map.contains_date(date) {
            debug!("date not present, nothing to delete");
            return Ok(map);
        }

        if map.remove_at(date, index).is_none() {
            warn!("index out of range, map unchanged");
        }
        self.save(&map)?;
        Ok(map)
    }
}

fn decode_map<T>(key: &str, raw: &str) -> anyhow::Result<RecordMap<T>>
where
    T: Schedulable + DeserializeOwned,
{
    if raw.trim().is_empty() {
        return Ok(RecordMap::new());
    }

    let current = serde_json::from_str::<Option<BTreeMap<String, Vec<T>>>>(raw);
    let current_err = match current {
        Ok(entries) => return Ok(entries.unwrap_or_default().into_iter().collect()),
        Err(err) => err,
    };

    // Oldest layout stored bare titles per date.
    let Ok(legacy) = serde_json::from_str::<BTreeMap<String, Vec<String>>>(raw) else {
        return Err(anyhow!(current_err))
            .context(RecordError::UnsupportedShape(key.to_string()));
    };

    let base = RecordId::from_timestamp(Utc::now());
    let mut seq = 0_usize;
    let mut upgraded = BTreeMap::new();
    for (date, titles) in legacy {
        let mut records = Vec::with_capacity(titles.len());
        for title in titles {
            let id = RecordId::from(format!("{base}-{seq}"));
            seq += 1;
            let record = T::from_legacy_title(id, title)
                .ok_or_else(|| anyhow!(RecordError::UnsupportedShape(key.to_string())))?;
            records.push(record);
        }
        upgraded.insert(date, records);
    }

    warn!(key, records = seq, "upgraded legacy title-only records");
    Ok(upgraded.into_iter().collect())
}

#[tracing::instrument(skip(path, contents))]
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::record::{Event, Task};

    fn event(id: &str, title: &str) -> Event {
        Event {
            id: RecordId::from(id),
            title: title.to_string(),
            all_day: true,
            start_time: None,
            end_time: None,
            notes: None,
        }
    }

    #[test]
    fn missing_value_loads_empty() {
        let store: RecordStore<_, Event> = RecordStore::new(MemoryStore::new(), EVENT_KEY);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn blank_and_null_values_load_empty() {
        let mut backend = MemoryStore::new();
        backend.set(EVENT_KEY, "null").unwrap();
        let store: RecordStore<_, Event> = RecordStore::new(backend, EVENT_KEY);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_roundtrip() {
        let temp = tempdir().expect("tempdir");
        let backend = FileStore::open(temp.path()).expect("open");
        let mut store: RecordStore<_, Event> = RecordStore::new(backend, EVENT_KEY);

        let mut map = RecordMap::new();
        map.upsert("2024-06-01", None, event("1", "Lunch")).unwrap();
        store.save(&map).expect("save");

        assert!(temp.path().join("event.json").exists());
        assert_eq!(store.load().expect("load"), map);
    }

    #[test]
    fn delete_last_record_removes_date_from_storage() {
        let mut store: RecordStore<_, Event> = RecordStore::new(MemoryStore::new(), EVENT_KEY);
        let mut map = RecordMap::new();
        map.upsert("2024-06-01", None, event("1", "Lunch")).unwrap();
        map.upsert("2024-06-02", None, event("2", "Gym")).unwrap();
        store.save(&map).unwrap();

        let map = store.delete(map, "2024-06-01", 0).unwrap();
        assert!(!map.contains_date("2024-06-01"));

        let raw = store.backend().get(EVENT_KEY).unwrap().unwrap();
        assert!(!raw.contains("2024-06-01"));
        assert!(raw.contains("2024-06-02"));
    }

    #[test]
    fn delete_unknown_date_skips_write() {
        let mut store: RecordStore<_, Event> = RecordStore::new(MemoryStore::new(), EVENT_KEY);
        let map = RecordMap::new();
        let out = store.delete(map.clone(), "2030-01-01", 0).unwrap();
        assert_eq!(out, map);
        assert!(store.backend().get(EVENT_KEY).unwrap().is_none());
    }

    #[test]
    fn stored_empty_dates_are_dropped_on_load() {
        let mut backend = MemoryStore::new();
        backend
            .set(EVENT_KEY, r#"{"2024-01-01":[],"2024-01-02":[{"id":"1","title":"x"}]}"#)
            .unwrap();
        let store: RecordStore<_, Event> = RecordStore::new(backend, EVENT_KEY);
        let map = store.load().unwrap();
        assert_eq!(map.dates().collect::<Vec<_>>(), vec!["2024-01-02"]);
    }

    #[test]
    fn legacy_title_lists_upgrade_to_all_day_events() {
        let mut backend = MemoryStore::new();
        backend
            .set(EVENT_KEY, r#"{"2024-01-01":["Dentist","Call mom"]}"#)
            .unwrap();
        let store: RecordStore<_, Event> = RecordStore::new(backend, EVENT_KEY);
        let map = store.load().unwrap();
        let records = map.get("2024-01-01");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|e| e.all_day));
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn legacy_titles_cannot_become_extended_tasks() {
        let mut backend = MemoryStore::new();
        backend.set(TASK_KEY, r#"{"2024-01-01":["Dentist"]}"#).unwrap();
        let store: RecordStore<_, Task> = RecordStore::new(backend, TASK_KEY);
        let err = store.load().unwrap_err();
        assert!(format!("{err:#}").contains("unsupported stored shape"));
    }

    #[test]
    fn rejects_path_like_keys() {
        let temp = tempdir().expect("tempdir");
        let backend = FileStore::open(temp.path()).expect("open");
        assert!(backend.path_for("../escape").is_err());
        assert!(backend.path_for(TASK_LIST_KEY).is_ok());
    }
}
