//! The bot's admission stages.
//!
//! Existence and permission checks fail closed and silently: the invoker
//! learns nothing beyond the generic fallback reply. Key validation replies
//! with an explicit error because it concerns malformed input, not access.

use std::sync::Arc;

use tracing::{debug, info};

use super::{ExecutionContext, Flow, AbortReason, Guard, GuardFuture};
use crate::channel::{InvocationChannel, ReplyOptions};
use crate::settings::{self, SettingsError};
use crate::store::EntityStore;

/// Reply sent when a guild issues commands before it was provisioned.
pub const NOT_CONFIGURED_REPLY: &str =
    "I may not have been configured properly! Please re-add me to your server or contact the bot maintainers.";

// ── RejectBots ────────────────────────────────────────────────────────────────

/// Drops invocations issued by other bots.
pub struct RejectBots;

impl Guard for RejectBots {
    fn name(&self) -> &str {
        "reject_bots"
    }

    fn check<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        _channel: &'a dyn InvocationChannel,
    ) -> GuardFuture<'a> {
        let is_bot = ctx.invocation().invoker.is_bot;
        Box::pin(async move {
            if is_bot {
                Ok(Flow::Abort(AbortReason::Rejected))
            } else {
                Ok(Flow::Proceed)
            }
        })
    }
}

// ── EntityResolution ──────────────────────────────────────────────────────────

/// Loads the guild record for the invocation and attaches it to the context.
pub struct EntityResolution {
    store: Arc<dyn EntityStore>,
}

impl EntityResolution {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

impl Guard for EntityResolution {
    fn name(&self) -> &str {
        "entity_resolution"
    }

    fn check<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> GuardFuture<'a> {
        Box::pin(async move {
            // Direct messages have no guild to resolve.
            let Some(tenant_id) = ctx.invocation().tenant_id.clone() else {
                return Ok(Flow::Abort(AbortReason::Rejected));
            };

            match self.store.find_tenant(&tenant_id).await? {
                Some(record) => {
                    let Some(acc) = ctx.accumulator_mut() else {
                        return Ok(Flow::Abort(AbortReason::Rejected));
                    };
                    acc.tenant = Some(record);
                    Ok(Flow::Proceed)
                }
                None => {
                    info!(tenant = %tenant_id, "command from unprovisioned guild");
                    channel.reply(NOT_CONFIGURED_REPLY, ReplyOptions::PRIVATE).await?;
                    Ok(Flow::Abort(AbortReason::NotFound))
                }
            }
        })
    }
}

// ── Authorization ─────────────────────────────────────────────────────────────

/// Requires the invoker to administer the resolved guild: either its owner
/// or a member holding the administrator permission.
pub struct Authorization;

impl Guard for Authorization {
    fn name(&self) -> &str {
        "authorization"
    }

    fn check<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        _channel: &'a dyn InvocationChannel,
    ) -> GuardFuture<'a> {
        let invoker = &ctx.invocation().invoker;
        let allowed = match ctx.tenant() {
            Some(tenant) => invoker.administrator || invoker.user_id == tenant.owner_id,
            // Without a resolved tenant there is nothing to authorize against.
            None => false,
        };
        if !allowed {
            debug!(user = %invoker.user_id, "invoker is not a guild administrator");
        }
        Box::pin(async move {
            if allowed {
                Ok(Flow::Proceed)
            } else {
                Ok(Flow::Abort(AbortReason::AccessDenied))
            }
        })
    }
}

// ── KeyValidation ─────────────────────────────────────────────────────────────

/// Requires the named option to be a declared settings key.
pub struct KeyValidation {
    option: &'static str,
}

impl KeyValidation {
    pub fn new(option: &'static str) -> Self {
        Self { option }
    }
}

impl Default for KeyValidation {
    fn default() -> Self {
        Self::new("key")
    }
}

impl Guard for KeyValidation {
    fn name(&self) -> &str {
        "key_validation"
    }

    fn check<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> GuardFuture<'a> {
        let key = ctx.invocation().option(self.option).map(str::to_string);
        Box::pin(async move {
            let message = match key {
                Some(key) if settings::is_valid_key(&key) => return Ok(Flow::Proceed),
                Some(key) => SettingsError::InvalidKey(key).to_string(),
                None => missing_option(self.option),
            };
            channel.reply(&message, ReplyOptions::PRIVATE).await?;
            Ok(Flow::Abort(AbortReason::InvalidInput))
        })
    }
}

// ── RequireOption ─────────────────────────────────────────────────────────────

/// Requires a free-form option to be present.
pub struct RequireOption {
    option: &'static str,
}

impl RequireOption {
    pub fn new(option: &'static str) -> Self {
        Self { option }
    }
}

impl Guard for RequireOption {
    fn name(&self) -> &str {
        "require_option"
    }

    fn check<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        channel: &'a dyn InvocationChannel,
    ) -> GuardFuture<'a> {
        let present = ctx.invocation().option(self.option).is_some();
        Box::pin(async move {
            if present {
                return Ok(Flow::Proceed);
            }
            channel.reply(&missing_option(self.option), ReplyOptions::PRIVATE).await?;
            Ok(Flow::Abort(AbortReason::InvalidInput))
        })
    }
}

fn missing_option(option: &str) -> String {
    format!("Missing required option '{option}'")
}
