use std::collections::HashMap;

use tokio::sync::Mutex;

use super::{normalize_email, RecordUpdate, StoreError, UserRecord, UserStore};

/// Process-local store. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl UserStore for MemoryStore {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.records.lock().await.get(&normalize_email(email)).cloned())
    }

    async fn insert_user(&self, mut record: UserRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        record.email = normalize_email(&record.email);
        if records.contains_key(&record.email) {
            return Err(StoreError::Duplicate(record.email));
        }
        records.insert(record.email.clone(), record);
        Ok(())
    }

    async fn update_user(&self, email: &str, update: RecordUpdate) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&normalize_email(email)) {
            Some(record) => {
                record.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
