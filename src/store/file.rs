use super::{sort_newest_first, RecordStore};
use crate::models::ProductRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Stores each record as `<id>.json` inside a directory.
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        tracing::debug!("Using record directory {}", dir.display());
        Ok(Self { dir })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn save(&self, record: &ProductRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        let path = self.record_path(record.id);

        // Write then rename so a crash never leaves a half-written record.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved record {} to {}", record.id, path.display());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<ProductRecord> {
        let path = self.record_path(id);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("record {}", id)))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    async fn list(&self) -> Result<Vec<ProductRecord>> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let json = fs::read_to_string(&path).await?;
            match serde_json::from_str::<ProductRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }
}
