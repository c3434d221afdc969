//! List-shaped collections: `{ "<key>": [ <record>, ... ] }`.

use super::file::{read_section, write_section};
use super::CollectionSpec;
use crate::error::{StoreError, StoreResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A record stored in a [`JsonCollection`].
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Name of the identifier field in the serialised record.
    const ID_FIELD: &'static str = "id";

    /// Fields a partial update never overwrites.
    const PROTECTED_FIELDS: &'static [&'static str] = &["id", "created_at"];

    /// Timestamp field stamped on every partial update, if the schema has one.
    const MODIFIED_FIELD: Option<&'static str> = None;

    fn id(&self) -> &str;
}

/// Shallow-merges `patch` into `target`, skipping `protected` keys.
///
/// Keys absent from `patch` keep their previous values.
pub fn merge_fields(target: &mut Map<String, Value>, patch: &Map<String, Value>, protected: &[&str]) {
    for (key, value) in patch {
        if protected.contains(&key.as_str()) {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Returns a copy of `record` with `edit` applied to its JSON object form.
///
/// The id field is restored after the edit and [`Record::MODIFIED_FIELD`] is stamped.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPatch`] if the edited object no longer deserialises as `T`.
pub fn patched<T: Record>(
    record: &T,
    edit: impl FnOnce(&mut Map<String, Value>) -> StoreResult<()>,
) -> StoreResult<T> {
    let mut value = serde_json::to_value(record).map_err(StoreError::Serialization)?;
    let Value::Object(object) = &mut value else {
        return Err(StoreError::InvalidPatch("record is not a JSON object".into()));
    };

    edit(object)?;
    // An edit must never re-key the record.
    object.insert(T::ID_FIELD.to_string(), Value::String(record.id().to_string()));
    if let Some(field) = T::MODIFIED_FIELD {
        let now = serde_json::to_value(Utc::now()).map_err(StoreError::Serialization)?;
        object.insert(field.to_string(), now);
    }

    serde_json::from_value(value).map_err(|e| StoreError::InvalidPatch(e.to_string()))
}

/// A collection of records persisted as one JSON file.
///
/// Lookups are linear scans in insertion order; the first match wins.
#[derive(Debug)]
pub struct JsonCollection<T> {
    spec: CollectionSpec,
    path: PathBuf,
    seed: fn() -> Vec<T>,
    lock: Mutex<()>,
}

impl<T: Record> JsonCollection<T> {
    /// Creates a collection backed by `<data_dir>/<spec.file_name>`.
    ///
    /// No I/O happens until the first operation.
    pub fn new(data_dir: &Path, spec: CollectionSpec) -> Self {
        Self {
            spec,
            path: data_dir.join(spec.file_name),
            seed: Vec::new,
            lock: Mutex::new(()),
        }
    }

    /// Sets the records written when the backing file does not exist yet.
    pub fn with_seed(mut self, seed: fn() -> Vec<T>) -> Self {
        self.seed = seed;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn spec(&self) -> CollectionSpec {
        self.spec
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a poisoned lock is still safe to reuse.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_locked(&self) -> StoreResult<Vec<T>> {
        match read_section(&self.path, self.spec.key)? {
            Some(records) => Ok(records),
            None => {
                let records = (self.seed)();
                write_section(&self.path, self.spec.key, &records)?;
                tracing::info!(
                    "initialised collection {} with {} record(s)",
                    self.path.display(),
                    records.len()
                );
                Ok(records)
            }
        }
    }

    fn save_locked(&self, records: &[T]) -> StoreResult<()> {
        write_section(&self.path, self.spec.key, records)
    }

    /// Loads the full collection, creating the backing file with its seed records if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageCorruption`] for malformed contents and
    /// [`StoreError::StorageUnavailable`] for I/O failures. A missing file is never an error.
    pub fn load_or_init(&self) -> StoreResult<Vec<T>> {
        let _guard = self.guard();
        self.load_locked()
    }

    pub fn list(&self) -> StoreResult<Vec<T>> {
        self.load_or_init()
    }

    /// Returns the first record whose id equals `id`, or `None`.
    pub fn get(&self, id: &str) -> StoreResult<Option<T>> {
        self.find(|record| record.id() == id)
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> StoreResult<Option<T>> {
        Ok(self.load_or_init()?.into_iter().find(|r| pred(r)))
    }

    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> StoreResult<Vec<T>> {
        Ok(self
            .load_or_init()?
            .into_iter()
            .filter(|r| pred(r))
            .collect())
    }

    /// Runs `f` over the loaded records and persists the result.
    ///
    /// The whole load, mutate, save cycle happens under the collection lock.
    pub fn transact<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> StoreResult<R> {
        let _guard = self.guard();
        let mut records = self.load_locked()?;
        let out = f(&mut records);
        self.save_locked(&records)?;
        Ok(out)
    }

    /// Like [`transact`](Self::transact), but only persists when `f` returns `Ok(Some(_))`.
    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> StoreResult<Option<R>>,
    ) -> StoreResult<Option<R>> {
        let _guard = self.guard();
        let mut records = self.load_locked()?;
        let out = f(&mut records)?;
        if out.is_some() {
            self.save_locked(&records)?;
        }
        Ok(out)
    }

    /// Formats the identifier following the highest sequence number present.
    ///
    /// Deriving the sequence from the maximum rather than the record count means deleted ids
    /// are never handed out again.
    pub fn next_id(&self, records: &[T]) -> String {
        let prefix = self.spec.id_prefix;
        let max_seq = records
            .iter()
            .filter_map(|r| r.id().strip_prefix(prefix))
            .filter_map(|seq| seq.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("{prefix}{:04}", max_seq + 1)
    }

    /// Appends a record built around a freshly generated identifier.
    pub fn create(&self, build: impl FnOnce(String) -> T) -> StoreResult<T> {
        self.transact(|records| {
            let record = build(self.next_id(records));
            records.push(record.clone());
            record
        })
    }

    /// Appends a record that carries its own (natural) key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordExists`] if a record with the same id is already stored.
    pub fn insert(&self, record: T) -> StoreResult<T> {
        let inserted = self.mutate(|records| {
            if records.iter().any(|r| r.id() == record.id()) {
                return Err(StoreError::RecordExists(record.id().to_string()));
            }
            records.push(record.clone());
            Ok(Some(record))
        })?;
        inserted.ok_or_else(|| StoreError::InvalidPatch("insert produced no record".into()))
    }

    /// Replaces the record with the same id, or appends it.
    pub fn upsert(&self, record: T) -> StoreResult<T> {
        self.transact(|records| {
            match records.iter_mut().find(|r| r.id() == record.id()) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
            record
        })
    }

    /// Applies a partial field-merge to the record with `id`.
    ///
    /// Only keys present in `patch` change; [`Record::PROTECTED_FIELDS`] are ignored.
    /// Returns `None` if no record matches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPatch`] if the merged record no longer fits the schema
    /// (for example a string supplied where a number is expected). Nothing is written then.
    pub fn update(&self, id: &str, patch: &Map<String, Value>) -> StoreResult<Option<T>> {
        self.update_with(id, |object| {
            merge_fields(object, patch, T::PROTECTED_FIELDS);
            Ok(())
        })
    }

    /// Edits the JSON object form of the record with `id`, then re-validates it.
    pub fn update_with(
        &self,
        id: &str,
        edit: impl FnOnce(&mut Map<String, Value>) -> StoreResult<()>,
    ) -> StoreResult<Option<T>> {
        self.mutate(|records| {
            let Some(slot) = records.iter_mut().find(|r| r.id() == id) else {
                return Ok(None);
            };
            let updated = patched(slot, edit)?;
            *slot = updated.clone();
            Ok(Some(updated))
        })
    }

    /// Runs `f` on the record with `id` and persists the collection.
    ///
    /// Returns `None` (and writes nothing) if no record matches.
    pub fn modify<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> StoreResult<Option<R>> {
        self.mutate(|records| Ok(records.iter_mut().find(|r| r.id() == id).map(f)))
    }

    /// Removes the record with `id`. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let removed = self.mutate(|records| {
            let before = records.len();
            records.retain(|r| r.id() != id);
            Ok((records.len() < before).then_some(()))
        })?;
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    const TEST_PATIENTS: CollectionSpec = CollectionSpec::new("patients_db.json", "patients", "PT");

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct TestPatient {
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        age: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified_at: Option<chrono::DateTime<Utc>>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    }

    impl Record for TestPatient {
        const MODIFIED_FIELD: Option<&'static str> = Some("modified_at");

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn patient(id: String, name: &str, age: Option<u32>) -> TestPatient {
        TestPatient {
            id,
            name: name.into(),
            age,
            modified_at: None,
            extra: Map::new(),
        }
    }

    fn collection(dir: &Path) -> JsonCollection<TestPatient> {
        JsonCollection::new(dir, TEST_PATIENTS)
    }

    #[test]
    fn test_load_or_init_is_idempotent_on_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());

        let first = patients.load_or_init().expect("first load should succeed");
        assert!(first.is_empty());

        let path = temp_dir.path().join("patients_db.json");
        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("file should exist"))
                .expect("file should be JSON");
        assert_eq!(on_disk, json!({ "patients": [] }));

        let second = patients.load_or_init().expect("second load should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_seed_records_written_once() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path())
            .with_seed(|| vec![patient("PT0001".into(), "Seeded", None)]);

        assert_eq!(patients.list().expect("list").len(), 1);
        patients.delete("PT0001").expect("delete");
        assert!(
            patients.list().expect("list").is_empty(),
            "seed must not be re-applied once the file exists"
        );
    }

    #[test]
    fn test_create_round_trip_with_generated_ids() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());

        let first = patients
            .create(|id| patient(id, "A", Some(30)))
            .expect("create should succeed");
        assert_eq!(first.id, "PT0001");

        let second = patients
            .create(|id| patient(id, "B", None))
            .expect("create should succeed");
        assert_eq!(second.id, "PT0002");

        // A fresh handle reads what the first one wrote.
        let reread = collection(temp_dir.path())
            .get("PT0001")
            .expect("get should succeed")
            .expect("record should exist");
        assert_eq!(reread, first);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());

        patients.create(|id| patient(id, "A", None)).expect("create");
        patients.create(|id| patient(id, "B", None)).expect("create");
        assert!(patients.delete("PT0001").expect("delete"));

        let third = patients.create(|id| patient(id, "C", None)).expect("create");
        assert_eq!(third.id, "PT0003");
    }

    #[test]
    fn test_concurrent_creates_yield_unique_ids() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = Arc::new(collection(temp_dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let patients = Arc::clone(&patients);
                std::thread::spawn(move || {
                    patients
                        .create(|id| patient(id, &format!("P{i}"), None))
                        .expect("create should succeed")
                        .id
                })
            })
            .collect();

        let mut ids: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8, "every create should get its own id");
    }

    #[test]
    fn test_partial_update_preserves_untouched_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());
        patients
            .create(|id| patient(id, "A", Some(30)))
            .expect("create should succeed");

        let patch = json!({ "age": 31, "id": "PT9999" });
        let updated = patients
            .update("PT0001", patch.as_object().expect("object"))
            .expect("update should succeed")
            .expect("record should exist");

        assert_eq!(updated.id, "PT0001", "id is protected");
        assert_eq!(updated.name, "A");
        assert_eq!(updated.age, Some(31));
        assert!(updated.modified_at.is_some());

        let stored = patients.get("PT0001").expect("get").expect("exists");
        assert_eq!(stored, updated);
    }

    #[test]
    fn test_update_keeps_unknown_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("patients_db.json");
        fs::write(
            &path,
            r#"{"patients": [{"id": "PT0001", "name": "A", "blood_type": "O+"}]}"#,
        )
        .expect("should write");

        let patients = collection(temp_dir.path());
        let patch = json!({ "name": "B" });
        let updated = patients
            .update("PT0001", patch.as_object().expect("object"))
            .expect("update")
            .expect("exists");
        assert_eq!(updated.extra.get("blood_type"), Some(&json!("O+")));
    }

    #[test]
    fn test_invalid_patch_writes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());
        patients.create(|id| patient(id, "A", Some(30))).expect("create");

        let patch = json!({ "age": "thirty" });
        let err = patients
            .update("PT0001", patch.as_object().expect("object"))
            .expect_err("type mismatch should fail");
        assert!(matches!(err, StoreError::InvalidPatch(_)));

        let stored = patients.get("PT0001").expect("get").expect("exists");
        assert_eq!(stored.age, Some(30));
    }

    #[test]
    fn test_not_found_is_a_sentinel() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());

        assert!(patients.get("PT0404").expect("get").is_none());
        let patch = json!({ "age": 1 });
        assert!(patients
            .update("PT0404", patch.as_object().expect("object"))
            .expect("update")
            .is_none());
        assert!(patients.modify("PT0404", |p| p.age = Some(2)).expect("modify").is_none());
        assert!(!patients.delete("PT0404").expect("delete"));
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());

        patients.insert(patient("X1".into(), "A", None)).expect("insert");
        let err = patients
            .insert(patient("X1".into(), "B", None))
            .expect_err("duplicate should fail");
        assert!(matches!(err, StoreError::RecordExists(id) if id == "X1"));
    }

    #[test]
    fn test_duplicate_ids_resolve_to_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("patients_db.json"),
            r#"{"patients": [{"id": "PT0001", "name": "first"}, {"id": "PT0001", "name": "second"}]}"#,
        )
        .expect("should write");

        let patients = collection(temp_dir.path());
        let found = patients.get("PT0001").expect("get").expect("exists");
        assert_eq!(found.name, "first");
    }

    #[test]
    fn test_upsert_replaces_or_appends() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = collection(temp_dir.path());

        patients.upsert(patient("PT0001".into(), "A", None)).expect("upsert");
        patients.upsert(patient("PT0001".into(), "A2", None)).expect("upsert");
        patients.upsert(patient("PT0002".into(), "B", None)).expect("upsert");

        let all = patients.list().expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "A2");
    }

    #[test]
    fn test_corrupt_file_fails_fast() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("patients_db.json"), "[[[").expect("should write");

        let err = collection(temp_dir.path())
            .list()
            .expect_err("corrupt file should fail");
        assert!(matches!(err, StoreError::StorageCorruption { .. }));
    }
}
