//! guildkeeper: per-guild bot settings behind guarded slash commands.
//!
//! The crate is split the way requests flow through it:
//!
//! - [`settings`]: the typed field schema, value coercion and validation.
//! - [`store`]: tenant (guild) records and their persistence.
//! - [`guard`]: ordered pre-handler checks sharing one execution context.
//! - [`commands`]: the command registry, dispatch, and the `config` group.
//! - [`catalog`]: keeps the platform's registered commands in step with the
//!   registry.
//! - [`console`]: a stdin front-end acting as one local guild member.

pub mod catalog;
pub mod channel;
pub mod commands;
pub mod config;
pub mod error;
pub mod guard;
pub mod logger;
pub mod settings;
pub mod store;

#[cfg(feature = "channel-console")]
pub mod console;
