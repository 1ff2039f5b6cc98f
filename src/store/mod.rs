//! Tenant storage: the guild records command handlers read and write.
//!
//! [`EntityStore`] is the capability boundary: guards and handlers only
//! find and persist whole [`TenantRecord`]s. Two backends ship with the bot:
//!
//! - [`memory::MemoryEntityStore`]: process memory, used by tests and the
//!   console when no work dir is writable.
//! - [`json::JsonEntityStore`]: one JSON document per guild under
//!   `{work_dir}/tenants/`.
//!
//! Concurrent writes to the same guild are last-write-wins.

pub mod json;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::settings::ConfigRecord;

/// A boxed, borrowed future returned by [`EntityStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// A guild (tenant) and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    /// Guild owner; always treated as an administrator.
    pub owner_id: String,
    pub config: ConfigRecord,
    /// RFC 3339 timestamp of the last persist, `None` until first saved.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TenantRecord {
    /// A freshly provisioned guild with default configuration.
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            config: ConfigRecord::default(),
            updated_at: None,
        }
    }
}

pub trait EntityStore: Send + Sync {
    /// Look up a guild by id. `Ok(None)` means the guild was never provisioned.
    fn find_tenant<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<TenantRecord>>;

    /// Save `record`, replacing whatever is stored under its id.
    fn persist<'a>(&'a self, record: &'a TenantRecord) -> StoreFuture<'a, ()>;
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
