//! Save/load with expiry over a pluggable key-value store.
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::constants::{ENDINGS_KEY, SAVE_KEY, SAVE_MAX_AGE_HOURS};
use crate::state::GameState;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String-valued storage keyed by name.
///
/// Platform-specific implementations should provide this.
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Delete the value under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be modified.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-process store; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Directory-backed store writing one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    type Error = PersistenceError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Storage keys and save lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveConfig {
    pub save_key: String,
    pub endings_key: String,
    /// Saves older than this are discarded. Serialized as whole seconds.
    #[serde(with = "seconds")]
    pub max_age: TimeDelta,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            save_key: SAVE_KEY.to_string(),
            endings_key: ENDINGS_KEY.to_string(),
            max_age: TimeDelta::try_hours(SAVE_MAX_AGE_HOURS).unwrap_or(TimeDelta::MAX),
        }
    }
}

mod seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        TimeDelta::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("max age {secs}s out of range")))
    }
}

/// Persisted snapshot of a run in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    pub state: GameState,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl SavedGame {
    #[must_use]
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: TimeDelta) -> bool {
        self.saved_at()
            .is_none_or(|saved_at| now.signed_duration_since(saved_at) > max_age)
    }
}

/// Save slot for the run in progress.
///
/// Failures never reach the caller: they are logged and an unreadable save
/// is reported as absent.
#[derive(Debug, Clone)]
pub struct SaveManager<S: KeyValueStore> {
    store: S,
    config: SaveConfig,
}

impl<S: KeyValueStore> SaveManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, SaveConfig::default())
    }

    pub const fn with_config(store: S, config: SaveConfig) -> Self {
        Self { store, config }
    }

    pub const fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    fn write(&self, record: &SavedGame) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(record)?;
        self.store
            .set(&self.config.save_key, &json)
            .map_err(|err| PersistenceError::Storage(err.to_string()))
    }

    /// Snapshot `state` with the current time.
    pub fn save_game(&self, state: &GameState) {
        self.save_game_at(state, Utc::now());
    }

    pub fn save_game_at(&self, state: &GameState, now: DateTime<Utc>) {
        let record = SavedGame {
            state: state.clone(),
            timestamp: now.timestamp_millis(),
        };
        if let Err(err) = self.write(&record) {
            log::error!("failed to save game: {err}");
        }
    }

    /// Load the saved run, if a fresh and well-formed one exists.
    pub fn load_game(&self) -> Option<SavedGame> {
        self.load_game_at(Utc::now())
    }

    /// [`SaveManager::load_game`] against an explicit clock.
    ///
    /// Malformed and expired records are removed from the store.
    pub fn load_game_at(&self, now: DateTime<Utc>) -> Option<SavedGame> {
        let raw = match self.store.get(&self.config.save_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::error!("failed to load game: {err}");
                return None;
            }
        };

        let record: SavedGame = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("discarding unreadable save: {err}");
                self.clear_save();
                return None;
            }
        };

        if record.is_expired(now, self.config.max_age) {
            log::warn!(
                "discarding save older than {}h",
                self.config.max_age.num_hours()
            );
            self.clear_save();
            return None;
        }

        Some(record)
    }

    pub fn clear_save(&self) {
        if let Err(err) = self.store.remove(&self.config.save_key) {
            log::error!("failed to clear save: {err}");
        }
    }

    #[must_use]
    pub fn has_saved_game(&self) -> bool {
        self.load_game().is_some()
    }
}
