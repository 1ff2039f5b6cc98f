//! Integration tests for command catalog reconciliation.
//!
//! Run with:
//!   cargo test --test test_catalog_sync

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use guildkeeper::catalog::local::LocalCatalogClient;
use guildkeeper::catalog::{
    self, CatalogFuture, CommandScope, CommandShape, DeclaredCommand, RemoteCatalogClient,
    RemoteCommand,
};
use guildkeeper::commands::{self, Registry};
use guildkeeper::error::AppError;
use guildkeeper::guard::GuardChain;
use guildkeeper::store::memory::MemoryEntityStore;

// ── helpers ──────────────────────────────────────────────────────────────────

fn shape(name: &str) -> CommandShape {
    CommandShape { name: name.into(), description: format!("{name} command"), options: vec![] }
}

fn declared(name: &str) -> DeclaredCommand {
    DeclaredCommand { shape: shape(name), scope: CommandScope::Global }
}

fn remote(id: &str, name: &str, guild: Option<&str>) -> RemoteCommand {
    RemoteCommand { remote_id: id.into(), guild_id: guild.map(str::to_string), shape: shape(name) }
}

async fn names(client: &LocalCatalogClient) -> Vec<String> {
    let mut names: Vec<String> =
        client.snapshot().await.iter().map(|c| c.name().to_string()).collect();
    names.sort();
    names
}

/// Delegates to a local catalog but refuses every operation touching `broken`.
struct FlakyClient {
    inner: LocalCatalogClient,
    broken: &'static str,
    calls: AtomicUsize,
}

impl FlakyClient {
    fn refuse(&self, name: &str) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if name == self.broken {
            return Err(AppError::Upstream(format!("platform rejected {name}")));
        }
        Ok(())
    }
}

impl RemoteCatalogClient for FlakyClient {
    fn fetch_all(&self) -> CatalogFuture<'_, Vec<RemoteCommand>> {
        self.inner.fetch_all()
    }

    fn create<'a>(&'a self, command: &'a DeclaredCommand) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.refuse(command.name())?;
            self.inner.create(command).await
        })
    }

    fn edit<'a>(&'a self, remote_id: &'a str, command: &'a DeclaredCommand) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.refuse(command.name())?;
            self.inner.edit(remote_id, command).await
        })
    }

    fn delete<'a>(&'a self, remote_id: &'a str) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let name = self
                .inner
                .snapshot()
                .await
                .into_iter()
                .find(|c| c.remote_id == remote_id)
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            self.refuse(&name)?;
            self.inner.delete(remote_id).await
        })
    }
}

// ── reconcile ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_adds_updates_and_deletes() {
    let client = Arc::new(LocalCatalogClient::with_commands(vec![
        remote("1", "b", None),
        remote("2", "c", None),
    ]));

    let report = catalog::reconcile(client.clone(), &[declared("a"), declared("b")])
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(names(&client).await, vec!["a", "b"]);
}

#[tokio::test]
async fn second_reconcile_only_updates() {
    let client = Arc::new(LocalCatalogClient::in_memory());
    let declared = [declared("a"), declared("b")];

    let first = catalog::reconcile(client.clone(), &declared).await.unwrap();
    assert_eq!(first.created, 2);

    let second = catalog::reconcile(client.clone(), &declared).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(names(&client).await, vec!["a", "b"]);
}

#[tokio::test]
async fn guild_bound_remote_entries_survive() {
    let client = Arc::new(LocalCatalogClient::with_commands(vec![remote("1", "dev", Some("g1"))]));

    let report = catalog::reconcile(client.clone(), &[declared("a")]).await.unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(names(&client).await, vec!["a", "dev"]);
}

#[tokio::test]
async fn failed_operation_does_not_stop_the_rest() {
    let client = Arc::new(FlakyClient {
        inner: LocalCatalogClient::with_commands(vec![
            remote("1", "b", None),
            remote("2", "c", None),
        ]),
        broken: "b",
        calls: AtomicUsize::new(0),
    });

    let report = catalog::reconcile(client.clone(), &[declared("a"), declared("b")])
        .await
        .unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(names(&client.inner).await, vec!["a", "b"]);
}

// ── test guild ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_guild_sync_replaces_guild_commands() {
    let client = Arc::new(LocalCatalogClient::with_commands(vec![
        remote("1", "old", Some("g1")),
        remote("2", "other", Some("g2")),
        remote("3", "a", None),
    ]));

    let report = catalog::sync_test_guild(client.clone(), "g1", &[declared("a"), declared("b")])
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 0);

    let all = client.snapshot().await;
    let mut in_g1: Vec<&str> = all
        .iter()
        .filter(|c| c.guild_id.as_deref() == Some("g1"))
        .map(|c| c.name())
        .collect();
    in_g1.sort();
    assert_eq!(in_g1, vec!["a", "b"]);
    assert!(all.iter().any(|c| c.guild_id.as_deref() == Some("g2")));
    assert!(all.iter().any(|c| c.guild_id.is_none() && c.name() == "a"));
}

// ── registry → catalog ────────────────────────────────────────────────────────

#[tokio::test]
async fn registry_commands_reconcile_into_persisted_catalog() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("catalog.json");

    let mut registry = Registry::new(GuardChain::new());
    commands::config::register(&mut registry, Arc::new(MemoryEntityStore::new()));
    let declared = registry.declared();

    let client = Arc::new(LocalCatalogClient::open(&path).await.unwrap());
    let report = catalog::reconcile(client, &declared).await.unwrap();
    assert_eq!(report.created, 1);

    let reopened = Arc::new(LocalCatalogClient::open(&path).await.unwrap());
    let stored = reopened.snapshot().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].shape, declared[0].shape);

    let subcommands: Vec<&str> = stored[0].shape.options.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(subcommands, vec!["list", "get", "set", "enable", "disable"]);

    let again = catalog::reconcile(reopened, &declared).await.unwrap();
    assert_eq!((again.created, again.updated, again.deleted), (0, 1, 0));
}
