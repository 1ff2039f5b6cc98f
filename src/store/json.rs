//! JSON-file tenant store.
//!
//! ```text
//! {work_dir}/
//! └── tenants/
//!     └── {guild_id}.json
//! ```
//!
//! Each write goes to its own uniquely named `.tmp` sibling and is renamed
//! into place, so a crash mid-write never leaves a truncated record behind
//! and concurrent writes to one guild resolve as last-write-wins.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::{EntityStore, StoreFuture, TenantRecord, now_rfc3339};
use crate::error::AppError;

pub struct JsonEntityStore {
    root: PathBuf,
}

impl JsonEntityStore {
    /// Open (creating if needed) the tenant directory under `work_dir`.
    pub async fn open(work_dir: &Path) -> Result<Self, AppError> {
        let root = work_dir.join("tenants");
        fs::create_dir_all(&root)
            .await
            .map_err(|e| AppError::Storage(format!("cannot create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn tenant_path(&self, id: &str) -> Result<PathBuf, AppError> {
        // Guild ids are numeric snowflakes on the platform; refuse anything
        // that could escape the tenant directory.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(AppError::Storage(format!("invalid tenant id: {id:?}")));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

impl EntityStore for JsonEntityStore {
    fn find_tenant<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<TenantRecord>> {
        Box::pin(async move {
            let path = self.tenant_path(id)?;
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(AppError::Storage(format!("cannot read {}: {e}", path.display())));
                }
            };
            let record = serde_json::from_str(&raw)
                .map_err(|e| AppError::Storage(format!("corrupt record {}: {e}", path.display())))?;
            Ok(Some(record))
        })
    }

    fn persist<'a>(&'a self, record: &'a TenantRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.tenant_path(&record.id)?;
            let mut stored = record.clone();
            stored.updated_at = Some(now_rfc3339());
            let data = serde_json::to_string_pretty(&stored)?;

            // One temp file per write; concurrent persists of a guild must
            // not share it. The last rename wins.
            let tmp = self.root.join(format!("{}.{}.json.tmp", record.id, uuid::Uuid::new_v4()));
            if let Err(e) = fs::write(&tmp, data).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(AppError::Storage(format!("cannot write {}: {e}", tmp.display())));
            }
            if let Err(e) = fs::rename(&tmp, &path).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(AppError::Storage(format!("cannot replace {}: {e}", path.display())));
            }

            debug!(tenant = %record.id, path = %path.display(), "tenant persisted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, JsonEntityStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonEntityStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn round_trips_records() {
        let (_dir, store) = setup().await;
        let mut record = TenantRecord::new("1234", "42");
        record.config.sus_chance = 0.25;
        store.persist(&record).await.unwrap();

        let found = store.find_tenant("1234").await.unwrap().unwrap();
        assert_eq!(found.config.sus_chance, 0.25);
        assert_eq!(found.owner_id, "42");
        assert!(found.updated_at.is_some());
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let (_dir, store) = setup().await;
        assert!(store.find_tenant("999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let (_dir, store) = setup().await;
        assert!(store.find_tenant("../etc").await.is_err());
        assert!(store.persist(&TenantRecord::new("a/b", "x")).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_record_is_storage_error() {
        let (dir, store) = setup().await;
        std::fs::write(dir.path().join("tenants").join("77.json"), "{not json").unwrap();
        match store.find_tenant("77").await {
            Err(AppError::Storage(msg)) => assert!(msg.contains("corrupt record")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_tmp_file_left_behind() {
        let (dir, store) = setup().await;
        store.persist(&TenantRecord::new("5", "o")).await.unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path().join("tenants"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["5.json".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_persists_last_write_wins() {
        let (dir, store) = setup().await;
        let store = std::sync::Arc::new(store);

        let mut set = tokio::task::JoinSet::new();
        for i in 0..16 {
            let store = store.clone();
            set.spawn(async move {
                let mut record = TenantRecord::new("g1", "owner");
                record.config.prefix = format!("p{i}");
                store.persist(&record).await
            });
        }
        while let Some(joined) = set.join_next().await {
            joined.unwrap().unwrap();
        }

        let found = store.find_tenant("g1").await.unwrap().unwrap();
        assert!(found.config.prefix.starts_with('p'));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("tenants"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }
}
