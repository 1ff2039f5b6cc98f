//! The `config` command group: list, get, set, enable, disable.
//!
//! Every subcommand runs behind entity resolution and authorization; the
//! ones taking a `key` also run key validation. Handlers read and write the
//! tenant attached by the chain, persist through the [`EntityStore`], and
//! reply privately.

use std::sync::Arc;

use tracing::info;

use super::{Command, Handler, HandlerFuture, Registry};
use crate::catalog::CommandOption;
use crate::channel::{InvocationChannel, ReplyOptions};
use crate::error::AppError;
use crate::guard::stages::{Authorization, EntityResolution, KeyValidation, RequireOption};
use crate::guard::{ExecutionContext, GuardChain};
use crate::settings::{self, FieldKind, SettingsError, TypedValue, schema};
use crate::store::{EntityStore, TenantRecord};

pub const GROUP: &str = "config";

/// Register the `config` group on `registry`.
pub fn register(registry: &mut Registry, store: Arc<dyn EntityStore>) {
    let admin = GuardChain::new()
        .with(EntityResolution::new(store.clone()))
        .with(Authorization);
    let admin_with_key = admin.clone().with(KeyValidation::default());

    let all_keys: Vec<&str> = schema::fields().iter().map(|f| f.name).collect();
    let boolean_keys = settings::boolean_fields();

    registry.describe_group(GROUP, "View and change this server's configuration");

    registry.register(
        Command::new("list", "Show every configuration value", List)
            .in_group(GROUP)
            .guards(admin.clone()),
    );
    registry.register(
        Command::new("get", "Show one configuration value", Get)
            .in_group(GROUP)
            .option(key_option(&all_keys))
            .guards(admin_with_key.clone()),
    );
    registry.register(
        Command::new("set", "Change a configuration value", Set { store: store.clone() })
            .in_group(GROUP)
            .option(key_option(&all_keys))
            .option(CommandOption::string("value", "The new value"))
            .guards(admin_with_key.clone().with(RequireOption::new("value"))),
    );
    registry.register(
        Command::new("enable", "Turn a setting on", Toggle { store: store.clone(), value: true })
            .in_group(GROUP)
            .option(key_option(&boolean_keys))
            .guards(admin_with_key.clone()),
    );
    registry.register(
        Command::new("disable", "Turn a setting off", Toggle { store, value: false })
            .in_group(GROUP)
            .option(key_option(&boolean_keys))
            .guards(admin_with_key),
    );
}

fn key_option(choices: &[&str]) -> CommandOption {
    CommandOption::string("key", "The configuration key").with_choices(choices.iter().copied())
}

// Guards have run by the time a handler is called, so a missing tenant or
// option here means the command was registered without its guards.
fn tenant(ctx: &mut ExecutionContext) -> Result<&mut TenantRecord, AppError> {
    ctx.accumulator_mut()
        .and_then(|acc| acc.tenant.as_mut())
        .ok_or_else(|| AppError::Command("config command ran without a resolved tenant".into()))
}

fn required<'a>(ctx: &'a ExecutionContext, name: &str) -> Result<&'a str, AppError> {
    ctx.invocation()
        .option(name)
        .ok_or_else(|| AppError::Command(format!("config command ran without option '{name}'")))
}

// ── list ──────────────────────────────────────────────────────────────────────

pub struct List;

impl Handler for List {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let record = &tenant(ctx)?.config;
            let mut text = String::from("Current configuration: \n```\n");
            for field in schema::fields() {
                let value = settings::render(field.name, record).unwrap_or_default();
                text.push_str(&format!("{}: {value}\n", field.name));
            }
            text.push_str("```");
            channel.reply(&text, ReplyOptions::PRIVATE).await
        })
    }
}

// ── get ───────────────────────────────────────────────────────────────────────

pub struct Get;

impl Handler for Get {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let key = required(ctx, "key")?.to_string();
            let record = &tenant(ctx)?.config;
            let text = match settings::render(&key, record) {
                Some(value) => format!("{key}: {value}"),
                None => SettingsError::InvalidKey(key).to_string(),
            };
            channel.reply(&text, ReplyOptions::PRIVATE).await
        })
    }
}

// ── set ───────────────────────────────────────────────────────────────────────

pub struct Set {
    store: Arc<dyn EntityStore>,
}

impl Handler for Set {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let key = required(ctx, "key")?.to_string();
            let raw = required(ctx, "value")?.to_string();

            let record = tenant(ctx)?;
            let applied = settings::coerce_and_validate(&key, &raw)
                .and_then(|value| record.config.apply(&key, value));
            if let Err(e) = applied {
                info!(tenant = %record.id, %key, "config set rejected: {e}");
                return channel.reply(&e.to_string(), ReplyOptions::PRIVATE).await;
            }

            self.store.persist(record).await?;
            let value = settings::render(&key, &record.config).unwrap_or_default();
            info!(tenant = %record.id, %key, %value, "config value set");
            channel
                .reply(&format!("{key} has been set to {value}"), ReplyOptions::PRIVATE)
                .await
        })
    }
}

// ── enable / disable ──────────────────────────────────────────────────────────

pub struct Toggle {
    store: Arc<dyn EntityStore>,
    value: bool,
}

impl Handler for Toggle {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let key = required(ctx, "key")?.to_string();
            if settings::kind_of(&key) != Some(FieldKind::Boolean) {
                let e = SettingsError::NotBoolean(key);
                return channel.reply(&e.to_string(), ReplyOptions::PRIVATE).await;
            }

            let record = tenant(ctx)?;
            if let Err(e) = record.config.apply(&key, TypedValue::Boolean(self.value)) {
                return channel.reply(&e.to_string(), ReplyOptions::PRIVATE).await;
            }
            self.store.persist(record).await?;

            let state = if self.value { "enabled" } else { "disabled" };
            info!(tenant = %record.id, %key, state, "config value toggled");
            channel
                .reply(&format!("{key} has been {state}"), ReplyOptions::PRIVATE)
                .await
        })
    }
}
