//! End-to-end tests for the `config` command group over the JSON store,
//! driven by console-style input lines.
//!
//! Run with:
//!   cargo test --test test_config_flow

use std::sync::Arc;

use tempfile::TempDir;

use guildkeeper::channel::BufferedChannel;
use guildkeeper::commands::{self, DispatchOutcome, FALLBACK_REPLY, Registry};
use guildkeeper::console::parse_line;
use guildkeeper::guard::stages::{NOT_CONFIGURED_REPLY, RejectBots};
use guildkeeper::guard::{AbortReason, GuardChain, Invocation, Invoker};
use guildkeeper::store::json::JsonEntityStore;
use guildkeeper::store::{EntityStore, TenantRecord};

// ── helpers ──────────────────────────────────────────────────────────────────

const GUILD: &str = "g1";
const OWNER: &str = "owner";

struct Bot {
    _tmp: TempDir,
    store: Arc<JsonEntityStore>,
    registry: Registry,
}

async fn bot() -> Bot {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(JsonEntityStore::open(tmp.path()).await.expect("open store"));
    store.persist(&TenantRecord::new(GUILD, OWNER)).await.expect("provision");

    let mut registry = Registry::new(GuardChain::new().with(RejectBots));
    commands::config::register(&mut registry, store.clone());
    Bot { _tmp: tmp, store, registry }
}

fn invoker(user: &str, administrator: bool) -> Invoker {
    Invoker { user_id: user.into(), is_bot: false, administrator }
}

impl Bot {
    async fn send_as(&self, tenant: Option<&str>, invoker: Invoker, line: &str) -> (DispatchOutcome, Vec<String>) {
        let parsed = parse_line(line, &self.registry.declared()).expect("non-empty line");
        let invocation = Invocation {
            tenant_id: tenant.map(str::to_string),
            invoker,
            command: parsed.command,
            subcommand: parsed.subcommand,
            options: parsed.options,
        };
        let channel = BufferedChannel::new();
        let outcome = self.registry.dispatch(invocation, &channel).await;
        (outcome, channel.texts())
    }

    async fn send(&self, line: &str) -> Vec<String> {
        self.send_as(Some(GUILD), invoker(OWNER, false), line).await.1
    }

    async fn stored(&self) -> TenantRecord {
        self.store.find_tenant(GUILD).await.unwrap().expect("tenant exists")
    }
}

// ── config commands ───────────────────────────────────────────────────────────

#[tokio::test]
async fn set_then_get_round_trips_through_disk() {
    let bot = bot().await;

    assert_eq!(bot.send("config set susChance 0.25").await, vec!["susChance has been set to 0.25"]);
    assert_eq!(bot.send("config get susChance").await, vec!["susChance: 0.25"]);

    let record = bot.stored().await;
    assert_eq!(record.config.sus_chance, 0.25);
    assert!(record.updated_at.is_some());
}

#[tokio::test]
async fn message_values_keep_their_spaces() {
    let bot = bot().await;
    bot.send("config set welcomeMessage Hi {user}, welcome aboard").await;
    assert_eq!(bot.stored().await.config.welcome_message, "Hi {user}, welcome aboard");
}

#[tokio::test]
async fn list_shows_defaults_for_fresh_guild() {
    let bot = bot().await;
    let replies = bot.send("config list").await;
    assert_eq!(
        replies,
        vec![
            "Current configuration: \n```\nprefix: !\nwelcomeMessage: Welcome, {user}!\n\
             welcomeEnabled: false\nsusEnabled: false\nsusChance: 0.05\nmaxWarnings: 3\n```"
        ]
    );
}

#[tokio::test]
async fn enable_disable_and_rejections() {
    let bot = bot().await;

    assert_eq!(bot.send("config enable welcomeEnabled").await, vec!["welcomeEnabled has been enabled"]);
    assert!(bot.stored().await.config.welcome_enabled);
    assert_eq!(bot.send("config disable welcomeEnabled").await, vec!["welcomeEnabled has been disabled"]);
    assert!(!bot.stored().await.config.welcome_enabled);

    assert_eq!(bot.send("config enable prefix").await, vec!["prefix is not a boolean!"]);
    assert_eq!(bot.send("config set susChance 2").await, vec!["Please enter a number between 0 and 1"]);
    assert_eq!(bot.send("config set nope 1").await, vec!["Invalid key nope!"]);

    let record = bot.stored().await;
    assert_eq!(record.config.prefix, "!");
    assert_eq!(record.config.sus_chance, 0.05);
}

// ── guards ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn administrators_may_configure_other_members_may_not() {
    let bot = bot().await;

    let (outcome, replies) =
        bot.send_as(Some(GUILD), invoker("mod", true), "config set prefix ?").await;
    assert!(matches!(outcome, DispatchOutcome::Handled));
    assert_eq!(replies, vec!["prefix has been set to ?"]);

    let (outcome, replies) =
        bot.send_as(Some(GUILD), invoker("member", false), "config set prefix $").await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted { reason: AbortReason::AccessDenied, .. }
    ));
    assert_eq!(replies, vec![FALLBACK_REPLY]);
    assert_eq!(bot.stored().await.config.prefix, "?");
}

#[tokio::test]
async fn unprovisioned_guild_is_told_to_re_add_the_bot() {
    let bot = bot().await;
    let (outcome, replies) =
        bot.send_as(Some("unknown"), invoker(OWNER, true), "config list").await;
    assert!(matches!(outcome, DispatchOutcome::Aborted { reason: AbortReason::NotFound, .. }));
    assert_eq!(replies, vec![NOT_CONFIGURED_REPLY]);
}

#[tokio::test]
async fn bots_are_rejected_before_any_lookup() {
    let bot = bot().await;
    let robot = Invoker { user_id: OWNER.into(), is_bot: true, administrator: true };
    let (outcome, _) = bot.send_as(Some(GUILD), robot, "config set prefix %").await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted { ref stage, reason: AbortReason::Rejected } if stage == "reject_bots"
    ));
    assert_eq!(bot.stored().await.config.prefix, "!");
}

#[tokio::test]
async fn direct_messages_are_rejected() {
    let bot = bot().await;
    let (outcome, _) = bot.send_as(None, invoker(OWNER, true), "config list").await;
    assert!(matches!(outcome, DispatchOutcome::Aborted { reason: AbortReason::Rejected, .. }));
}

#[tokio::test]
async fn set_without_value_asks_for_it() {
    let bot = bot().await;
    let before = bot.stored().await;
    let (outcome, replies) = bot.send_as(Some(GUILD), invoker(OWNER, false), "config set prefix").await;
    assert!(matches!(outcome, DispatchOutcome::Aborted { reason: AbortReason::InvalidInput, .. }));
    assert_eq!(replies, vec!["Missing required option 'value'"]);
    assert_eq!(bot.stored().await, before);
}
