use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use super::{normalize_email, RecordUpdate, StoreError, UserRecord, UserStore};

/// All user records in one pretty-printed JSON array.
///
/// Every operation reads the whole file and writes it back through a
/// temporary file and a rename. The internal lock serializes operations
/// within this process only.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, UserRecord>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let records: Vec<UserRecord> = serde_json::from_str(&contents)?;
        Ok(records
            .into_iter()
            .map(|record| (normalize_email(&record.email), record))
            .collect())
    }

    async fn write_all(&self, records: &BTreeMap<String, UserRecord>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let list: Vec<&UserRecord> = records.values().collect();
        let contents = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = list.len(), "User store written");
        Ok(())
    }
}

impl UserStore for JsonFileStore {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        Ok(records.remove(&normalize_email(email)))
    }

    async fn insert_user(&self, mut record: UserRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;

        record.email = normalize_email(&record.email);
        if records.contains_key(&record.email) {
            return Err(StoreError::Duplicate(record.email));
        }
        records.insert(record.email.clone(), record);
        self.write_all(&records).await
    }

    async fn update_user(&self, email: &str, update: RecordUpdate) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;

        let Some(record) = records.get_mut(&normalize_email(email)) else {
            return Ok(false);
        };
        record.apply(update);
        self.write_all(&records).await?;
        Ok(true)
    }
}
