use std::collections::HashMap;

use async_trait::async_trait;
use shared::meal_record::MealRecord;
use shared::wheel_prefs::WheelPrefs;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::{check_key, now_millis, RecordStore, SnapshotHub, StoreError, StoreResult, UserDocument};

/// Size ceiling of a single stored document.
pub const DOCUMENT_LIMIT_BYTES: usize = 1024 * 1024;

/// Document store held in process memory, one document per user.
pub struct DocumentStore {
    documents: RwLock<HashMap<String, UserDocument>>,
    hub: SnapshotHub,
    document_limit: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_limit(DOCUMENT_LIMIT_BYTES)
    }

    pub fn with_limit(document_limit: usize) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            hub: SnapshotHub::new(),
            document_limit,
        }
    }

    fn check_size(&self, record: &MealRecord) -> StoreResult<()> {
        let bytes = serde_json::to_vec(record)?.len();
        if bytes > self.document_limit {
            return Err(StoreError::DocumentTooLarge { bytes, limit: self.document_limit });
        }
        Ok(())
    }

    async fn write_record(&self, uid: &str, record: MealRecord, merge: bool) -> StoreResult<MealRecord> {
        check_key(uid)?;
        let mut documents = self.documents.write().await;
        let doc = documents.entry(uid.to_string()).or_default();

        let record = match doc.get(&record.id) {
            Some(existing) if merge => record.merged_over(existing),
            _ => record,
        };
        self.check_size(&record)?;

        let stored = doc.replace(record);
        debug!("Stored record {} for {} ({} total)", stored.id, uid, doc.records.len());
        self.hub.publish(uid, doc.records.clone()).await;
        Ok(stored)
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    async fn list_records(&self, uid: &str) -> StoreResult<Vec<MealRecord>> {
        check_key(uid)?;
        let documents = self.documents.read().await;
        Ok(documents.get(uid).map(|d| d.records.clone()).unwrap_or_default())
    }

    async fn get_record(&self, uid: &str, id: &str) -> StoreResult<Option<MealRecord>> {
        check_key(uid)?;
        let documents = self.documents.read().await;
        Ok(documents.get(uid).and_then(|d| d.get(id)).cloned())
    }

    async fn upsert_record(&self, uid: &str, record: MealRecord) -> StoreResult<MealRecord> {
        self.write_record(uid, record, true).await
    }

    async fn replace_record(&self, uid: &str, record: MealRecord) -> StoreResult<MealRecord> {
        self.write_record(uid, record, false).await
    }

    async fn remove_record(&self, uid: &str, id: &str) -> StoreResult<bool> {
        check_key(uid)?;
        let mut documents = self.documents.write().await;
        let Some(doc) = documents.get_mut(uid) else {
            return Ok(false);
        };
        let removed = doc.remove(id);
        if removed {
            debug!("Removed record {} for {}", id, uid);
            self.hub.publish(uid, doc.records.clone()).await;
        }
        Ok(removed)
    }

    async fn wheel_prefs(&self, uid: &str) -> StoreResult<WheelPrefs> {
        check_key(uid)?;
        let documents = self.documents.read().await;
        Ok(documents.get(uid).map(UserDocument::prefs).unwrap_or_default())
    }

    async fn save_wheel_prefs(&self, uid: &str, prefs: WheelPrefs) -> StoreResult<WheelPrefs> {
        check_key(uid)?;
        let mut documents = self.documents.write().await;
        documents.entry(uid.to_string()).or_default().save_prefs(prefs, now_millis())
    }

    async fn subscribe_records(&self, uid: &str) -> StoreResult<watch::Receiver<Vec<MealRecord>>> {
        check_key(uid)?;
        // read lock keeps writers out until the channel exists
        let documents = self.documents.read().await;
        let current = documents.get(uid).map(|d| d.records.clone()).unwrap_or_default();
        Ok(self.hub.subscribe(uid, current).await)
    }
}
