//! Per-user keyed collections: `{ "users": { "<username>": <value> } }`.

use super::file::{read_section, write_section};
use crate::constants::KEYED_COLLECTION_KEY;
use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One value per username, persisted as a single JSON file.
#[derive(Debug)]
pub struct KeyedCollection<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> KeyedCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(data_dir: &Path, file_name: &str) -> Self {
        Self {
            path: data_dir.join(file_name),
            lock: Mutex::new(()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_locked(&self) -> StoreResult<BTreeMap<String, T>> {
        match read_section(&self.path, KEYED_COLLECTION_KEY)? {
            Some(entries) => Ok(entries),
            None => {
                let entries = BTreeMap::new();
                write_section(&self.path, KEYED_COLLECTION_KEY, &entries)?;
                Ok(entries)
            }
        }
    }

    fn save_locked(&self, entries: &BTreeMap<String, T>) -> StoreResult<()> {
        write_section(&self.path, KEYED_COLLECTION_KEY, entries)
    }

    /// Loads every entry, creating `{ "users": {} }` if the file is absent.
    pub fn load_or_init(&self) -> StoreResult<BTreeMap<String, T>> {
        let _guard = self.guard();
        self.load_locked()
    }

    pub fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.load_or_init()?.into_keys().collect())
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<T>> {
        Ok(self.load_or_init()?.remove(key))
    }

    /// Returns the entry for `key`, inserting and persisting `init()` first if absent.
    ///
    /// The boolean is `true` when the entry was created by this call.
    pub fn get_or_insert_with(&self, key: &str, init: impl FnOnce() -> T) -> StoreResult<(T, bool)> {
        let _guard = self.guard();
        let mut entries = self.load_locked()?;
        if let Some(existing) = entries.get(key) {
            return Ok((existing.clone(), false));
        }

        let value = init();
        entries.insert(key.to_string(), value.clone());
        self.save_locked(&entries)?;
        Ok((value, true))
    }

    pub fn put(&self, key: &str, value: T) -> StoreResult<()> {
        let _guard = self.guard();
        let mut entries = self.load_locked()?;
        entries.insert(key.to_string(), value);
        self.save_locked(&entries)
    }

    /// Runs `f` on the entry for `key` and persists. `None` if there is no such entry.
    pub fn modify<R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> StoreResult<Option<R>> {
        let _guard = self.guard();
        let mut entries = self.load_locked()?;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        let out = f(entry);
        self.save_locked(&entries)?;
        Ok(Some(out))
    }

    /// Runs `f` on the entry for `key`, inserting `init()` first if absent, and persists.
    pub fn modify_or_insert_with<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> R,
    ) -> StoreResult<R> {
        let _guard = self.guard();
        let mut entries = self.load_locked()?;
        let entry = entries.entry(key.to_string()).or_insert_with(init);
        let out = f(entry);
        self.save_locked(&entries)?;
        Ok(out)
    }

    /// Like [`Self::modify_or_insert_with`], but nothing is persisted when `f` fails.
    pub fn try_modify_or_insert_with<R, E>(
        &self,
        key: &str,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let _guard = self.guard();
        let mut entries = self.load_locked()?;
        let mut entry = entries.remove(key).unwrap_or_else(init);
        let out = f(&mut entry)?;
        entries.insert(key.to_string(), entry);
        self.save_locked(&entries)?;
        Ok(out)
    }
}
