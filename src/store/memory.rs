//! In-memory tenant store. Data is discarded when the process exits.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{EntityStore, StoreFuture, TenantRecord, now_rfc3339};

#[derive(Default)]
pub struct MemoryEntityStore {
    tenants: RwLock<HashMap<String, TenantRecord>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`.
    pub fn with_tenants(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        let tenants = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { tenants: RwLock::new(tenants) }
    }

    pub async fn len(&self) -> usize {
        self.tenants.read().await.len()
    }
}

impl EntityStore for MemoryEntityStore {
    fn find_tenant<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<TenantRecord>> {
        Box::pin(async move { Ok(self.tenants.read().await.get(id).cloned()) })
    }

    fn persist<'a>(&'a self, record: &'a TenantRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut stored = record.clone();
            stored.updated_at = Some(now_rfc3339());
            self.tenants.write().await.insert(stored.id.clone(), stored);
            Ok(())
        })
    }
}
