//! In-process command registry standing in for the chat platform.
//!
//! Holds [`RemoteCommand`]s the way the platform would, assigning a fresh
//! id to every created entry. When opened with a path the catalog is
//! persisted as a JSON array after each change, so successive runs see what
//! earlier runs registered.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use super::{CatalogFuture, CommandScope, DeclaredCommand, RemoteCatalogClient, RemoteCommand};
use crate::error::AppError;

pub struct LocalCatalogClient {
    commands: Mutex<Vec<RemoteCommand>>,
    path: Option<PathBuf>,
}

impl LocalCatalogClient {
    pub fn in_memory() -> Self {
        Self { commands: Mutex::new(Vec::new()), path: None }
    }

    pub fn with_commands(commands: Vec<RemoteCommand>) -> Self {
        Self { commands: Mutex::new(commands), path: None }
    }

    /// Load the catalog from `path`, starting empty if the file is missing.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        let commands = match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                AppError::Upstream(format!("corrupt catalog {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { commands: Mutex::new(commands), path: Some(path.to_path_buf()) })
    }

    /// Current registrations, in insertion order.
    pub async fn snapshot(&self) -> Vec<RemoteCommand> {
        self.commands.lock().await.clone()
    }

    async fn save(&self, commands: &[RemoteCommand]) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(commands)?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| AppError::Upstream(format!("cannot write {}: {e}", path.display())))
    }

    /// Apply `change` to a copy of the catalog, save it, and only then make
    /// it current. A failed change or save leaves the catalog untouched.
    async fn commit<F>(&self, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Vec<RemoteCommand>) -> Result<(), AppError>,
    {
        let mut commands = self.commands.lock().await;
        let mut next = commands.clone();
        change(&mut next)?;
        self.save(&next).await?;
        *commands = next;
        Ok(())
    }
}

impl RemoteCatalogClient for LocalCatalogClient {
    fn fetch_all(&self) -> CatalogFuture<'_, Vec<RemoteCommand>> {
        Box::pin(async move { Ok(self.snapshot().await) })
    }

    fn create<'a>(&'a self, command: &'a DeclaredCommand) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let remote_id = uuid::Uuid::new_v4().to_string();
            let guild_id = match &command.scope {
                CommandScope::Global => None,
                CommandScope::Guild(id) => Some(id.clone()),
            };
            debug!(command = %command.name(), %remote_id, "registering command");
            self.commit(|commands| {
                commands.push(RemoteCommand { remote_id, guild_id, shape: command.shape.clone() });
                Ok(())
            })
            .await
        })
    }

    fn edit<'a>(&'a self, remote_id: &'a str, command: &'a DeclaredCommand) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.commit(|commands| {
                let entry = commands
                    .iter_mut()
                    .find(|c| c.remote_id == remote_id)
                    .ok_or_else(|| AppError::Upstream(format!("unknown command id {remote_id}")))?;
                entry.shape = command.shape.clone();
                Ok(())
            })
            .await
        })
    }

    fn delete<'a>(&'a self, remote_id: &'a str) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.commit(|commands| {
                let before = commands.len();
                commands.retain(|c| c.remote_id != remote_id);
                if commands.len() == before {
                    return Err(AppError::Upstream(format!("unknown command id {remote_id}")));
                }
                Ok(())
            })
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CommandShape;
    use tempfile::TempDir;

    fn declared(name: &str, scope: CommandScope) -> DeclaredCommand {
        DeclaredCommand {
            shape: CommandShape { name: name.into(), description: "d".into(), options: vec![] },
            scope,
        }
    }

    #[tokio::test]
    async fn create_assigns_ids_and_scope() {
        let client = LocalCatalogClient::in_memory();
        client.create(&declared("a", CommandScope::Global)).await.unwrap();
        client.create(&declared("b", CommandScope::Guild("g".into()))).await.unwrap();

        let all = client.fetch_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0].remote_id, all[1].remote_id);
        assert_eq!(all[0].guild_id, None);
        assert_eq!(all[1].guild_id.as_deref(), Some("g"));
    }

    #[tokio::test]
    async fn edit_and_delete_unknown_ids_fail() {
        let client = LocalCatalogClient::in_memory();
        let d = declared("a", CommandScope::Global);
        assert!(client.edit("missing", &d).await.is_err());
        assert!(client.delete("missing").await.is_err());
    }

    #[tokio::test]
    async fn edit_replaces_shape() {
        let client = LocalCatalogClient::in_memory();
        client.create(&declared("a", CommandScope::Global)).await.unwrap();
        let id = client.snapshot().await[0].remote_id.clone();

        let mut changed = declared("a", CommandScope::Global);
        changed.shape.description = "new".into();
        client.edit(&id, &changed).await.unwrap();
        assert_eq!(client.snapshot().await[0].shape.description, "new");
    }

    #[tokio::test]
    async fn failed_save_leaves_catalog_unchanged() {
        let dir = TempDir::new().unwrap();
        let existing = RemoteCommand {
            remote_id: "1".into(),
            guild_id: None,
            shape: declared("a", CommandScope::Global).shape,
        };
        // The parent directory does not exist, so every save fails.
        let client = LocalCatalogClient {
            commands: Mutex::new(vec![existing.clone()]),
            path: Some(dir.path().join("missing").join("catalog.json")),
        };

        let mut changed = declared("a", CommandScope::Global);
        changed.shape.description = "new".into();
        assert!(client.edit("1", &changed).await.is_err());
        assert!(client.delete("1").await.is_err());
        assert!(client.create(&declared("b", CommandScope::Global)).await.is_err());

        assert_eq!(client.snapshot().await, vec![existing]);
    }

    #[tokio::test]
    async fn persists_between_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");

        let client = LocalCatalogClient::open(&path).await.unwrap();
        client.create(&declared("a", CommandScope::Global)).await.unwrap();
        drop(client);

        let reopened = LocalCatalogClient::open(&path).await.unwrap();
        let all = reopened.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name(), "a");
    }
}
