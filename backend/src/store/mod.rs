//! Per-user persistence for meal records and wheel preferences.
//!
//! Two interchangeable backends sit behind [`RecordStore`]: an in-process
//! document store and a local fallback that keeps one JSON file per user.
//! Every write republishes the user's full sorted record list to live
//! subscribers through [`SnapshotHub`].

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::meal_record::{sort_records, MealRecord};
use shared::wheel_prefs::{PrefsError, WheelPrefs};
use tokio::sync::{watch, Mutex};

pub mod document;
pub mod local_file;

pub use document::DocumentStore;
pub use local_file::LocalFileStore;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    DocumentTooLarge { bytes: usize, limit: usize },
    QuotaExceeded { bytes: usize, quota: usize },
    StalePrefs(PrefsError),
    InvalidKey(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Storage I/O error: {}", e),
            Self::Serialization(e) => write!(f, "Storage serialization error: {}", e),
            Self::DocumentTooLarge { bytes, limit } => {
                write!(f, "Record is {} bytes, the limit is {} bytes", bytes, limit)
            }
            Self::QuotaExceeded { bytes, quota } => {
                write!(f, "Storage quota exceeded: {} of {} bytes", bytes, quota)
            }
            Self::StalePrefs(e) => write!(f, "{}", e),
            Self::InvalidKey(key) => write!(f, "Invalid user key: {:?}", key),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::StalePrefs(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<PrefsError> for StoreError {
    fn from(err: PrefsError) -> Self {
        Self::StalePrefs(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of a user, newest day first.
    async fn list_records(&self, uid: &str) -> StoreResult<Vec<MealRecord>>;

    async fn get_record(&self, uid: &str, id: &str) -> StoreResult<Option<MealRecord>>;

    /// Merge write: an incoming record without an image keeps the stored one.
    async fn upsert_record(&self, uid: &str, record: MealRecord) -> StoreResult<MealRecord>;

    /// Overwrites the stored record as given.
    async fn replace_record(&self, uid: &str, record: MealRecord) -> StoreResult<MealRecord>;

    /// Returns false when no record had that id.
    async fn remove_record(&self, uid: &str, id: &str) -> StoreResult<bool>;

    async fn wheel_prefs(&self, uid: &str) -> StoreResult<WheelPrefs>;

    /// Normalizes and stamps `updated_at`. Writes based on an older version fail.
    async fn save_wheel_prefs(&self, uid: &str, prefs: WheelPrefs) -> StoreResult<WheelPrefs>;

    /// Receiver seeded with the current list and updated after every write.
    async fn subscribe_records(&self, uid: &str) -> StoreResult<watch::Receiver<Vec<MealRecord>>>;
}

/// User keys end up in file names, so only a conservative alphabet is accepted.
pub fn check_key(uid: &str) -> StoreResult<()> {
    let valid = !uid.is_empty()
        && uid.len() <= 128
        && uid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(uid.to_string()))
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Everything stored for one user.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct UserDocument {
    #[serde(default)]
    pub records: Vec<MealRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel_prefs: Option<WheelPrefs>,
}

impl UserDocument {
    pub fn get(&self, id: &str) -> Option<&MealRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn upsert(&mut self, record: MealRecord) -> MealRecord {
        let record = match self.get(&record.id) {
            Some(existing) => record.merged_over(existing),
            None => record,
        };
        self.replace(record)
    }

    pub fn replace(&mut self, record: MealRecord) -> MealRecord {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record.clone(),
            None => self.records.push(record.clone()),
        }
        sort_records(&mut self.records);
        record
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    pub fn prefs(&self) -> WheelPrefs {
        self.wheel_prefs.clone().unwrap_or_default()
    }

    pub fn save_prefs(&mut self, prefs: WheelPrefs, now: i64) -> StoreResult<WheelPrefs> {
        prefs.check_fresh(self.wheel_prefs.as_ref())?;
        let mut next = prefs.normalized();
        // never move the version backwards, even if the clock does
        let floor = self.wheel_prefs.as_ref().and_then(|p| p.updated_at).unwrap_or(i64::MIN);
        next.updated_at = Some(now.max(floor));
        self.wheel_prefs = Some(next.clone());
        Ok(next)
    }
}

/// Fans out record snapshots per user over `watch` channels. Channels are
/// created on first subscribe and dropped once nobody listens.
#[derive(Default)]
pub struct SnapshotHub {
    channels: Mutex<HashMap<String, watch::Sender<Vec<MealRecord>>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// `current` seeds the channel when this is the first subscriber. Callers
    /// hold their store lock so no write can slip in between.
    pub async fn subscribe(&self, uid: &str, current: Vec<MealRecord>) -> watch::Receiver<Vec<MealRecord>> {
        let mut channels = self.channels.lock().await;
        match channels.get(uid) {
            Some(tx) if tx.receiver_count() > 0 => tx.subscribe(),
            _ => {
                let (tx, rx) = watch::channel(current);
                channels.insert(uid.to_string(), tx);
                rx
            }
        }
    }

    pub async fn publish(&self, uid: &str, snapshot: Vec<MealRecord>) {
        let mut channels = self.channels.lock().await;
        if let Some(tx) = channels.get(uid) {
            if tx.receiver_count() == 0 {
                channels.remove(uid);
            } else {
                tx.send_replace(snapshot);
            }
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}
