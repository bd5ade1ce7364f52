use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared::meal_record::MealRecord;
use shared::wheel_prefs::WheelPrefs;
use tokio::fs;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::{check_key, now_millis, RecordStore, SnapshotHub, StoreError, StoreResult, UserDocument};

pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Fallback store that keeps each user's document as `<dir>/<uid>.json`.
/// The byte quota mirrors what a browser grants local storage.
pub struct LocalFileStore {
    dir: PathBuf,
    quota: usize,
    // serializes read-modify-write cycles across all users
    write_lock: Mutex<()>,
    hub: SnapshotHub,
}

impl LocalFileStore {
    pub async fn open(dir: impl Into<PathBuf>, quota: usize) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!("Local store at {:?} with a {} byte quota", dir, quota);
        Ok(Self {
            dir,
            quota,
            write_lock: Mutex::new(()),
            hub: SnapshotHub::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, uid: &str) -> StoreResult<PathBuf> {
        check_key(uid)?;
        Ok(self.dir.join(format!("{}.json", uid)))
    }

    async fn load(&self, uid: &str) -> StoreResult<UserDocument> {
        let path = self.path_for(uid)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(UserDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, uid: &str, doc: &UserDocument) -> StoreResult<()> {
        let path = self.path_for(uid)?;
        let bytes = serde_json::to_vec(doc)?;
        if bytes.len() > self.quota {
            warn!("Local store quota exceeded for {}: {} bytes", uid, bytes.len());
            return Err(StoreError::QuotaExceeded { bytes: bytes.len(), quota: self.quota });
        }

        // write then rename so a crash never leaves a half-written document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn modify<T>(
        &self,
        uid: &str,
        publish: bool,
        f: impl FnOnce(&mut UserDocument) -> StoreResult<T> + Send,
    ) -> StoreResult<T>
    where
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load(uid).await?;
        let result = f(&mut doc)?;
        self.save(uid, &doc).await?;
        if publish {
            self.hub.publish(uid, doc.records).await;
        }
        Ok(result)
    }
}

#[async_trait]
impl RecordStore for LocalFileStore {
    async fn list_records(&self, uid: &str) -> StoreResult<Vec<MealRecord>> {
        Ok(self.load(uid).await?.records)
    }

    async fn get_record(&self, uid: &str, id: &str) -> StoreResult<Option<MealRecord>> {
        Ok(self.load(uid).await?.get(id).cloned())
    }

    async fn upsert_record(&self, uid: &str, record: MealRecord) -> StoreResult<MealRecord> {
        self.modify(uid, true, |doc| Ok(doc.upsert(record))).await
    }

    async fn replace_record(&self, uid: &str, record: MealRecord) -> StoreResult<MealRecord> {
        self.modify(uid, true, |doc| Ok(doc.replace(record))).await
    }

    async fn remove_record(&self, uid: &str, id: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load(uid).await?;
        if !doc.remove(id) {
            return Ok(false);
        }
        self.save(uid, &doc).await?;
        self.hub.publish(uid, doc.records).await;
        Ok(true)
    }

    async fn wheel_prefs(&self, uid: &str) -> StoreResult<WheelPrefs> {
        Ok(self.load(uid).await?.prefs())
    }

    async fn save_wheel_prefs(&self, uid: &str, prefs: WheelPrefs) -> StoreResult<WheelPrefs> {
        self.modify(uid, false, |doc| doc.save_prefs(prefs, now_millis())).await
    }

    async fn subscribe_records(&self, uid: &str) -> StoreResult<watch::Receiver<Vec<MealRecord>>> {
        let _guard = self.write_lock.lock().await;
        let current = self.load(uid).await?.records;
        Ok(self.hub.subscribe(uid, current).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::record;
    use tempfile::TempDir;

    async fn store(quota: usize) -> (TempDir, LocalFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::open(dir.path().join("meals"), quota).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let (dir, store) = store(DEFAULT_QUOTA_BYTES).await;
        store.upsert_record("u1", record("1", "2024-05-01", "Ramen Ya")).await.unwrap();
        store
            .save_wheel_prefs("u1", WheelPrefs::default().add_custom("Taco Stand"))
            .await
            .unwrap();
        assert!(store.dir().join("u1.json").exists());
        assert!(!store.dir().join("u1.json.tmp").exists());

        let reopened = LocalFileStore::open(dir.path().join("meals"), DEFAULT_QUOTA_BYTES)
            .await
            .unwrap();
        let records = reopened.list_records("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shop_name, "Ramen Ya");
        assert_eq!(reopened.wheel_prefs("u1").await.unwrap().custom_shops, vec!["Taco Stand"]);
    }

    #[tokio::test]
    async fn test_missing_user_is_empty() {
        let (_dir, store) = store(DEFAULT_QUOTA_BYTES).await;
        assert!(store.list_records("nobody").await.unwrap().is_empty());
        assert!(!store.remove_record("nobody", "1").await.unwrap());
        assert!(!store.dir().join("nobody.json").exists());
    }

    #[tokio::test]
    async fn test_quota_rejects_and_keeps_old_state() {
        let (_dir, store) = store(2048).await;
        store.upsert_record("u1", record("1", "2024-05-01", "Ramen Ya")).await.unwrap();

        let mut big = record("2", "2024-05-02", "Curry Club");
        big.image = Some(format!("data:image/jpeg;base64,{}", "A".repeat(4096)));
        let err = store.upsert_record("u1", big).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { quota: 2048, .. }));
        assert_eq!(store.list_records("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_can_clear_image() {
        let (_dir, store) = store(DEFAULT_QUOTA_BYTES).await;
        let mut with_image = record("1", "2024-05-01", "Ramen Ya");
        with_image.image = Some("data:image/jpeg;base64,AAAA".to_string());
        store.upsert_record("u1", with_image).await.unwrap();

        let merged = store.upsert_record("u1", record("1", "2024-05-01", "Ramen Ya")).await.unwrap();
        assert!(merged.image.is_some());

        let replaced = store.replace_record("u1", record("1", "2024-05-01", "Ramen Ya")).await.unwrap();
        assert!(replaced.image.is_none());
        assert!(store.get_record("u1", "1").await.unwrap().unwrap().image.is_none());
    }

    #[tokio::test]
    async fn test_subscription() {
        let (_dir, store) = store(DEFAULT_QUOTA_BYTES).await;
        let mut rx = store.subscribe_records("u1").await.unwrap();
        assert!(rx.borrow_and_update().is_empty());

        store.upsert_record("u1", record("1", "2024-05-01", "A")).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_dir, store) = store(DEFAULT_QUOTA_BYTES).await;
        let err = store.upsert_record("../escape", record("1", "2024-05-01", "A")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
