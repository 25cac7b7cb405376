//! Persistent record of every ending a player has reached.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{Ending, EndingType, Rarity};
use crate::persistence::{KeyValueStore, SaveConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedEnding {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EndingType,
    #[serde(default)]
    pub rarity: Rarity,
    /// Milliseconds since the Unix epoch.
    pub unlocked_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub by_rarity: BTreeMap<Rarity, usize>,
}

/// Unlocked endings kept under a single store key.
#[derive(Debug, Clone)]
pub struct EndingCollection<S: KeyValueStore> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> EndingCollection<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, SaveConfig::default().endings_key)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Every unlocked ending, oldest first. Unreadable data reads as empty.
    pub fn unlocked(&self) -> Vec<UnlockedEnding> {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("ignoring unreadable ending collection: {err}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                log::error!("failed to read ending collection: {err}");
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn is_unlocked(&self, ending_id: &str) -> bool {
        self.unlocked().iter().any(|entry| entry.id == ending_id)
    }

    /// Record `ending`; a second unlock of the same id is a no-op.
    pub fn save_unlocked(&self, ending: &Ending) {
        let mut entries = self.unlocked();
        if entries.iter().any(|entry| entry.id == ending.id) {
            return;
        }
        entries.push(UnlockedEnding {
            id: ending.id.clone(),
            title: ending.title.clone(),
            kind: ending.kind,
            rarity: ending.rarity,
            unlocked_at: Utc::now().timestamp_millis(),
        });
        let json = match serde_json::to_string(&entries) {
            Ok(json) => json,
            Err(err) => {
                log::error!("failed to encode ending collection: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.key, &json) {
            log::error!("failed to save unlocked ending {}: {err}", ending.id);
        }
    }

    pub fn stats(&self) -> CollectionStats {
        self.unlocked()
            .iter()
            .fold(CollectionStats::default(), |mut stats, entry| {
                stats.total += 1;
                match entry.kind {
                    EndingType::Positive => stats.positive += 1,
                    EndingType::Negative => stats.negative += 1,
                }
                *stats.by_rarity.entry(entry.rarity).or_default() += 1;
                stats
            })
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.remove(&self.key) {
            log::error!("failed to clear ending collection: {err}");
        }
    }
}
