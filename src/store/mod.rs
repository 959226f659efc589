//! Persistence for product records
//!
//! Records are stored as one JSON document each; listing returns them
//! newest first.

pub mod file;
pub mod mock;

pub use file::FileRecordStore;
pub use mock::MockRecordStore;

use crate::models::ProductRecord;
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record.
    async fn save(&self, record: &ProductRecord) -> Result<()>;
    async fn load(&self, id: Uuid) -> Result<ProductRecord>;
    /// All records, most recently uploaded first.
    async fn list(&self) -> Result<Vec<ProductRecord>>;
}

pub(crate) fn sort_newest_first(records: &mut [ProductRecord]) {
    records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}
