//! Guard chain: ordered admission checks in front of a command handler.
//!
//! A [`GuardChain`] is an ordered list of [`Guard`] stages. The executor
//! runs them one at a time against a shared [`ExecutionContext`]; each stage
//! either lets the invocation through (possibly after attaching data to the
//! context) or aborts it. The first abort ends the chain: later stages and
//! the handler never run, and the context's accumulator is frozen.
//!
//! Stage order is part of a chain's contract. [`stages::Authorization`] reads
//! the tenant that [`stages::EntityResolution`] attached, so it must come
//! after it.

pub mod stages;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::channel::InvocationChannel;
use crate::error::AppError;
use crate::store::TenantRecord;

// ── Invocation ────────────────────────────────────────────────────────────────

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub user_id: String,
    pub is_bot: bool,
    /// Holds the platform's administrator permission in the guild.
    pub administrator: bool,
}

/// A raw command invocation as received from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Guild the command was issued in; `None` for direct messages.
    pub tenant_id: Option<String>,
    pub invoker: Invoker,
    pub command: String,
    pub subcommand: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl Invocation {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// `"config set"` style route name used for registry lookup and logs.
    pub fn route(&self) -> String {
        match &self.subcommand {
            Some(sub) => format!("{} {sub}", self.command),
            None => self.command.clone(),
        }
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// State the chain resolves incrementally for the handler.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    pub tenant: Option<TenantRecord>,
}

/// The value threaded through every stage and into the handler.
#[derive(Debug)]
pub struct ExecutionContext {
    invocation: Invocation,
    accumulator: Accumulator,
    aborted: bool,
}

impl ExecutionContext {
    pub fn new(invocation: Invocation) -> Self {
        Self { invocation, accumulator: Accumulator::default(), aborted: false }
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn tenant(&self) -> Option<&TenantRecord> {
        self.accumulator.tenant.as_ref()
    }

    /// Mutable access to the accumulator; `None` once the chain aborted.
    pub fn accumulator_mut(&mut self) -> Option<&mut Accumulator> {
        if self.aborted {
            None
        } else {
            Some(&mut self.accumulator)
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

// ── Guard ─────────────────────────────────────────────────────────────────────

/// Why a stage stopped an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Invocation filtered out (bots, direct messages).
    Rejected,
    /// The guild has no record.
    NotFound,
    /// The invoker lacks the required privilege.
    AccessDenied,
    /// Malformed caller input; the stage already replied with details.
    InvalidInput,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortReason::Rejected => "rejected",
            AbortReason::NotFound => "not_found",
            AbortReason::AccessDenied => "access_denied",
            AbortReason::InvalidInput => "invalid_input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Proceed,
    Abort(AbortReason),
}

/// A boxed, borrowed future returned by [`Guard::check`].
pub type GuardFuture<'a> = Pin<Box<dyn Future<Output = Result<Flow, AppError>> + Send + 'a>>;

/// One admission stage.
///
/// Implementations may reply through `channel` and attach resolved state via
/// [`ExecutionContext::accumulator_mut`]. An `Err` means an upstream failure
/// (storage, transport) and stops the chain like an abort.
pub trait Guard: Send + Sync {
    /// Stable identifier used in log messages.
    fn name(&self) -> &str;

    fn check<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> GuardFuture<'a>;
}

// ── GuardChain ────────────────────────────────────────────────────────────────

/// Result of running a chain to completion or to its first stop.
#[derive(Debug)]
pub enum ChainOutcome {
    Proceed,
    Aborted { stage: String, reason: AbortReason },
    Failed { stage: String, error: AppError },
}

impl ChainOutcome {
    pub fn proceeds(&self) -> bool {
        matches!(self, ChainOutcome::Proceed)
    }
}

#[derive(Clone, Default)]
pub struct GuardChain {
    stages: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `guard` as the last stage.
    pub fn with(mut self, guard: impl Guard + 'static) -> Self {
        self.stages.push(Arc::new(guard));
        self
    }

    /// A new chain running `self`'s stages, then `next`'s.
    pub fn then(&self, next: &GuardChain) -> GuardChain {
        let mut stages = self.stages.clone();
        stages.extend(next.stages.iter().cloned());
        GuardChain { stages }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|g| g.name()).collect()
    }

    /// Run every stage in order, stopping at the first abort or failure.
    pub async fn run(
        &self,
        ctx: &mut ExecutionContext,
        channel: &dyn InvocationChannel,
    ) -> ChainOutcome {
        if ctx.is_aborted() {
            return ChainOutcome::Aborted {
                stage: String::new(),
                reason: AbortReason::Rejected,
            };
        }

        for guard in &self.stages {
            match guard.check(ctx, channel).await {
                Ok(Flow::Proceed) => {
                    debug!(stage = guard.name(), route = %ctx.invocation().route(), "guard passed");
                }
                Ok(Flow::Abort(reason)) => {
                    ctx.abort();
                    debug!(stage = guard.name(), %reason, "guard aborted invocation");
                    return ChainOutcome::Aborted { stage: guard.name().to_string(), reason };
                }
                Err(error) => {
                    ctx.abort();
                    warn!(stage = guard.name(), "guard failed: {error}");
                    return ChainOutcome::Failed { stage: guard.name().to_string(), error };
                }
            }
        }
        ChainOutcome::Proceed
    }
}
