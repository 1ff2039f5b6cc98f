//! Command registry: explicit registration and dispatch.
//!
//! Commands are plain records built by start-up code: a name, parameters,
//! an ordered [`GuardChain`] and a [`Handler`]. Grouped commands (`config
//! list`, `config set`, …) are registered one by one and folded into a
//! single top-level command with subcommand options by
//! [`Registry::declared`], which is what catalog sync registers remotely.
//!
//! # Dispatch
//!
//! [`Registry::dispatch`] runs the registry-wide guards, then the command's
//! own guards, then its handler. If nothing replied to the invoker by the
//! end (silent aborts, handler failures, unknown routes) a generic private
//! reply is sent so the platform never shows a dangling interaction.

pub mod config;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::catalog::{CommandOption, CommandScope, CommandShape, DeclaredCommand, OptionKind};
use crate::channel::{InvocationChannel, ReplyOptions};
use crate::error::AppError;
use crate::guard::{AbortReason, ChainOutcome, ExecutionContext, GuardChain, Invocation};

/// Generic reply for invocations that ended without any other reply.
pub const FALLBACK_REPLY: &str = "Something went wrong...";

// ── Handler ───────────────────────────────────────────────────────────────────

/// A boxed, borrowed future returned by [`Handler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

/// Terminal step of a command. Runs only after every guard proceeded.
pub trait Handler: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> HandlerFuture<'a>;
}

// ── Command ───────────────────────────────────────────────────────────────────

pub struct Command {
    /// Parent command name for subcommands, e.g. `config`.
    pub group: Option<String>,
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
    pub scope: CommandScope,
    pub guards: GuardChain,
    pub handler: Arc<dyn Handler>,
}

impl Command {
    pub fn new(name: &str, description: &str, handler: impl Handler + 'static) -> Self {
        Self {
            group: None,
            name: name.to_string(),
            description: description.to_string(),
            options: Vec::new(),
            scope: CommandScope::Global,
            guards: GuardChain::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn guards(mut self, guards: GuardChain) -> Self {
        self.guards = guards;
        self
    }

    pub fn scope(mut self, scope: CommandScope) -> Self {
        self.scope = scope;
        self
    }

    /// Registry key: `"group name"` or `"name"`.
    fn route(&self) -> String {
        match &self.group {
            Some(group) => format!("{group} {}", self.name),
            None => self.name.clone(),
        }
    }
}

// ── Dispatch outcome ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran to completion.
    Handled,
    Aborted { stage: String, reason: AbortReason },
    Failed(AppError),
    /// No command is registered under the invocation's route.
    Unrouted,
}

// ── Registry ──────────────────────────────────────────────────────────────────

struct Route {
    command: Command,
    /// Registry-wide guards followed by the command's own.
    chain: GuardChain,
}

pub struct Registry {
    global_guards: GuardChain,
    group_descriptions: BTreeMap<String, String>,
    routes: Vec<Route>,
}

impl Registry {
    /// `global_guards` run before every command's own guards.
    pub fn new(global_guards: GuardChain) -> Self {
        Self { global_guards, group_descriptions: BTreeMap::new(), routes: Vec::new() }
    }

    pub fn describe_group(&mut self, group: &str, description: &str) {
        self.group_descriptions.insert(group.to_string(), description.to_string());
    }

    /// Add `command` to the registry.
    ///
    /// # Panics
    ///
    /// Panics if the route is already registered, or if a subcommand's scope
    /// differs from its group's: both are programming errors caught at
    /// start-up.
    pub fn register(&mut self, command: Command) {
        let route = command.route();
        if self.routes.iter().any(|r| r.command.route() == route) {
            panic!("duplicate command registered: {route:?}");
        }
        if let Some(group) = &command.group
            && let Some(sibling) = self
                .routes
                .iter()
                .find(|r| r.command.group.as_ref() == Some(group))
            && sibling.command.scope != command.scope
        {
            panic!("command {route:?} scope differs from its group {group:?}");
        }

        debug!(%route, guards = ?command.guards.names(), "command registered");
        let chain = self.global_guards.then(&command.guards);
        self.routes.push(Route { command, chain });
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.command.route()).collect()
    }

    fn find(&self, invocation: &Invocation) -> Option<&Route> {
        self.routes.iter().find(|r| {
            let cmd = &r.command;
            match (&cmd.group, &invocation.subcommand) {
                (Some(group), Some(sub)) => *group == invocation.command && cmd.name == *sub,
                (None, None) => cmd.name == invocation.command,
                _ => false,
            }
        })
    }

    /// The catalog this registry declares, grouped commands folded into one
    /// entry each, in first-registration order.
    pub fn declared(&self) -> Vec<DeclaredCommand> {
        let mut declared: Vec<DeclaredCommand> = Vec::new();
        for Route { command, .. } in &self.routes {
            match &command.group {
                None => declared.push(DeclaredCommand {
                    shape: CommandShape {
                        name: command.name.clone(),
                        description: command.description.clone(),
                        options: command.options.clone(),
                    },
                    scope: command.scope.clone(),
                }),
                Some(group) => {
                    let sub = CommandOption {
                        name: command.name.clone(),
                        description: command.description.clone(),
                        kind: OptionKind::Subcommand,
                        required: false,
                        choices: Vec::new(),
                        options: command.options.clone(),
                    };
                    match declared.iter_mut().find(|d| d.shape.name == *group) {
                        Some(parent) => parent.shape.options.push(sub),
                        None => declared.push(DeclaredCommand {
                            shape: CommandShape {
                                name: group.clone(),
                                description: self
                                    .group_descriptions
                                    .get(group)
                                    .cloned()
                                    .unwrap_or_else(|| group.clone()),
                                options: vec![sub],
                            },
                            scope: command.scope.clone(),
                        }),
                    }
                }
            }
        }
        declared
    }

    /// Run `invocation` through its command's guard chain and handler.
    pub async fn dispatch(
        &self,
        invocation: Invocation,
        channel: &dyn InvocationChannel,
    ) -> DispatchOutcome {
        let route_name = invocation.route();
        let outcome = match self.find(&invocation) {
            None => {
                warn!(route = %route_name, "no command registered for route");
                DispatchOutcome::Unrouted
            }
            Some(route) => {
                let mut ctx = ExecutionContext::new(invocation);
                match route.chain.run(&mut ctx, channel).await {
                    ChainOutcome::Proceed => {
                        match route.command.handler.handle(&mut ctx, channel).await {
                            Ok(()) => DispatchOutcome::Handled,
                            Err(e) => {
                                error!(route = %route_name, "command handler failed: {e}");
                                DispatchOutcome::Failed(e)
                            }
                        }
                    }
                    ChainOutcome::Aborted { stage, reason } => {
                        DispatchOutcome::Aborted { stage, reason }
                    }
                    ChainOutcome::Failed { error, .. } => DispatchOutcome::Failed(error),
                }
            }
        };

        if !channel.has_replied()
            && let Err(e) = channel.reply(FALLBACK_REPLY, ReplyOptions::PRIVATE).await
        {
            warn!(route = %route_name, "fallback reply failed: {e}");
        }
        outcome
    }
}
