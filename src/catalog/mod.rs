//! Command catalog sync: make the platform's registered commands match the
//! commands this bot declares.
//!
//! # Reconciliation
//!
//! Only global entries take part: remote commands bound to a guild and
//! declared commands scoped to a guild are ignored and left as they are.
//! Entries are matched by name, so no record of earlier registrations is
//! kept between runs:
//!
//! - **added**  : declared names with no remote entry → `create`
//! - **updated**: names present on both sides → `edit`, unconditionally,
//!   even when the shapes are already equal
//! - **deleted**: remote names no longer declared → `delete`
//!
//! [`apply`] runs every operation concurrently. A failed operation is logged
//! and counted; it never cancels the others and nothing is rolled back.

pub mod local;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::AppError;

// ── Shapes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Subcommand,
    String,
}

/// One parameter of a command, or a nested subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
    /// Fixed set of accepted values offered to the user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

impl CommandOption {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: OptionKind::String,
            required: true,
            choices: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }
}

/// The serialized form of a command as the platform stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandShape {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandScope {
    Global,
    /// Registered on one guild only.
    Guild(String),
}

/// A command as authored in this codebase.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredCommand {
    pub shape: CommandShape,
    pub scope: CommandScope,
}

impl DeclaredCommand {
    pub fn name(&self) -> &str {
        &self.shape.name
    }

    pub fn is_global(&self) -> bool {
        self.scope == CommandScope::Global
    }
}

/// A command as currently registered on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub remote_id: String,
    /// `None` for global commands.
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(flatten)]
    pub shape: CommandShape,
}

impl RemoteCommand {
    pub fn name(&self) -> &str {
        &self.shape.name
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// A boxed future returned by [`RemoteCatalogClient`] methods.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// The platform's command registry.
pub trait RemoteCatalogClient: Send + Sync {
    /// Every registered command, global and guild-bound.
    fn fetch_all(&self) -> CatalogFuture<'_, Vec<RemoteCommand>>;

    fn create<'a>(&'a self, command: &'a DeclaredCommand) -> CatalogFuture<'a, ()>;

    fn edit<'a>(&'a self, remote_id: &'a str, command: &'a DeclaredCommand) -> CatalogFuture<'a, ()>;

    fn delete<'a>(&'a self, remote_id: &'a str) -> CatalogFuture<'a, ()>;
}

// ── Plan ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub added: Vec<DeclaredCommand>,
    pub updated: Vec<(RemoteCommand, DeclaredCommand)>,
    pub deleted: Vec<RemoteCommand>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Diff the global part of `remote` against the global part of `declared`.
///
/// When the platform holds several global entries with one name, the first
/// is edited and the rest are left alone.
pub fn plan(remote: &[RemoteCommand], declared: &[DeclaredCommand]) -> ReconcilePlan {
    let existing: Vec<&RemoteCommand> = remote.iter().filter(|c| c.guild_id.is_none()).collect();
    let wanted: Vec<&DeclaredCommand> = declared.iter().filter(|c| c.is_global()).collect();

    let added = wanted
        .iter()
        .filter(|d| !existing.iter().any(|r| r.name() == d.name()))
        .map(|d| (*d).clone())
        .collect();

    let updated = wanted
        .iter()
        .filter_map(|d| {
            existing
                .iter()
                .find(|r| r.name() == d.name())
                .map(|r| ((*r).clone(), (*d).clone()))
        })
        .collect();

    let deleted = existing
        .iter()
        .filter(|r| wanted.iter().all(|d| d.name() != r.name()))
        .map(|r| (*r).clone())
        .collect();

    ReconcilePlan { added, updated, deleted }
}

// ── Apply ─────────────────────────────────────────────────────────────────────

/// Per-group counts of operations that succeeded, plus total failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum OpKind {
    Create,
    Edit,
    Delete,
}

enum Op {
    Create(DeclaredCommand),
    Edit(String, DeclaredCommand),
    Delete(RemoteCommand),
}

impl Op {
    fn kind(&self) -> OpKind {
        match self {
            Op::Create(_) => OpKind::Create,
            Op::Edit(..) => OpKind::Edit,
            Op::Delete(_) => OpKind::Delete,
        }
    }

    fn name(&self) -> String {
        match self {
            Op::Create(d) | Op::Edit(_, d) => d.name().to_string(),
            Op::Delete(r) => r.name().to_string(),
        }
    }

    async fn run(&self, client: &dyn RemoteCatalogClient) -> Result<(), AppError> {
        match self {
            Op::Create(d) => client.create(d).await,
            Op::Edit(id, d) => client.edit(id, d).await,
            Op::Delete(r) => client.delete(&r.remote_id).await,
        }
    }
}

/// Issue every operation in `plan` concurrently and tally the results.
pub async fn apply(client: Arc<dyn RemoteCatalogClient>, plan: ReconcilePlan) -> ReconcileReport {
    let ops = plan
        .added
        .into_iter()
        .map(Op::Create)
        .chain(plan.updated.into_iter().map(|(r, d)| Op::Edit(r.remote_id, d)))
        .chain(plan.deleted.into_iter().map(Op::Delete));

    let mut set: JoinSet<(OpKind, String, Result<(), AppError>)> = JoinSet::new();
    for op in ops {
        let client = client.clone();
        set.spawn(async move {
            let result = op.run(client.as_ref()).await;
            (op.kind(), op.name(), result)
        });
    }

    let mut report = ReconcileReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((kind, _, Ok(()))) => match kind {
                OpKind::Create => report.created += 1,
                OpKind::Edit => report.updated += 1,
                OpKind::Delete => report.deleted += 1,
            },
            Ok((kind, name, Err(e))) => {
                warn!(command = %name, op = ?kind, "catalog operation failed: {e}");
                report.failed += 1;
            }
            Err(e) => {
                error!("catalog operation panicked: {e}");
                report.failed += 1;
            }
        }
    }
    report
}

/// Fetch the remote catalog, diff it against `declared`, and apply the diff.
///
/// Only a failed fetch is an error; individual operation failures are
/// reported through [`ReconcileReport::failed`].
pub async fn reconcile(
    client: Arc<dyn RemoteCatalogClient>,
    declared: &[DeclaredCommand],
) -> Result<ReconcileReport, AppError> {
    let remote = client.fetch_all().await?;
    let plan = plan(&remote, declared);

    info!(
        added = plan.added.len(),
        updated = plan.updated.len(),
        deleted = plan.deleted.len(),
        "reconciling command catalog"
    );

    let report = apply(client, plan).await;
    if report.failed > 0 {
        warn!(failed = report.failed, "command catalog partially applied");
    }
    Ok(report)
}

/// Development mode: replace everything registered on `guild_id` with the
/// global declared commands, scoped to that guild.
///
/// Guild-bound commands register instantly on the platform, unlike global
/// ones, which makes this the fast loop while iterating on command shapes.
pub async fn sync_test_guild(
    client: Arc<dyn RemoteCatalogClient>,
    guild_id: &str,
    declared: &[DeclaredCommand],
) -> Result<ReconcileReport, AppError> {
    let remote = client.fetch_all().await?;

    let cleared = ReconcilePlan {
        deleted: remote
            .into_iter()
            .filter(|c| c.guild_id.as_deref() == Some(guild_id))
            .collect(),
        ..ReconcilePlan::default()
    };
    let mut report = apply(client.clone(), cleared).await;

    let rescoped = ReconcilePlan {
        added: declared
            .iter()
            .filter(|d| d.is_global())
            .map(|d| DeclaredCommand {
                shape: d.shape.clone(),
                scope: CommandScope::Guild(guild_id.to_string()),
            })
            .collect(),
        ..ReconcilePlan::default()
    };
    let created = apply(client, rescoped).await;

    report.created += created.created;
    report.failed += created.failed;
    info!(
        guild = %guild_id,
        deleted = report.deleted,
        created = report.created,
        failed = report.failed,
        "test guild commands re-registered"
    );
    Ok(report)
}
