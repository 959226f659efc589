use super::{sort_newest_first, RecordStore};
use crate::models::ProductRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone)]
pub struct MockRecordStore {
    records: Arc<Mutex<HashMap<Uuid, ProductRecord>>>,
    save_count: Arc<Mutex<usize>>,
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            save_count: Arc::new(Mutex::new(0)),
            fail_after: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_record(self, record: ProductRecord) -> Self {
        self.records.lock().unwrap().insert(record.id, record);
        self
    }

    /// Let the first `saves` saves succeed and fail every later one.
    pub fn with_save_failure_after(self, saves: usize) -> Self {
        *self.fail_after.lock().unwrap() = Some(saves);
        self
    }

    pub fn get_save_count(&self) -> usize {
        *self.save_count.lock().unwrap()
    }
}

impl Default for MockRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn save(&self, record: &ProductRecord) -> Result<()> {
        let mut count = self.save_count.lock().unwrap();
        *count += 1;

        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if *count > limit {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
        }

        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<ProductRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("record {}", id)))
    }

    async fn list(&self) -> Result<Vec<ProductRecord>> {
        let mut records: Vec<ProductRecord> =
            self.records.lock().unwrap().values().cloned().collect();
        sort_newest_first(&mut records);
        Ok(records)
    }
}
