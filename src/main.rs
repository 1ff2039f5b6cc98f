//! guildkeeper: entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (`RUST_LOG` > `-v` flags > config)
//!      and the `--no-sync` / `--no-console` switches
//!   4. Init logger once
//!   5. Open the tenant store, provisioning the console guild
//!   6. Build the command registry
//!   7. Sync the command catalog (global reconcile or test guild)
//!   8. Spawn Ctrl-C → shutdown signal watcher
//!   9. Run the console until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use guildkeeper::catalog::{self, RemoteCatalogClient, local::LocalCatalogClient};
use guildkeeper::commands::{self, Registry};
use guildkeeper::config::{self, Config};
use guildkeeper::error::AppError;
use guildkeeper::guard::GuardChain;
use guildkeeper::guard::stages::RejectBots;
use guildkeeper::logger;
use guildkeeper::store::json::JsonEntityStore;
use guildkeeper::store::memory::MemoryEntityStore;
use guildkeeper::store::{EntityStore, TenantRecord};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    std::fs::create_dir_all(&config.work_dir).map_err(|e| {
        AppError::Config(format!("cannot create work dir {}: {e}", config.work_dir.display()))
    })?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let store = open_store(&config).await?;

    let mut registry = Registry::new(GuardChain::new().with(RejectBots));
    commands::config::register(&mut registry, store.clone());
    let registry = Arc::new(registry);
    info!(routes = ?registry.routes(), "command registry ready");

    if !args.skip_sync && (config.catalog.sync_on_start || config.catalog.test_guild.is_some()) {
        sync_catalog(&config, &registry).await?;
    }

    // Ctrl-C cancels the shared shutdown token; the console watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received: initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    #[cfg(feature = "channel-console")]
    {
        if config.console.enabled && !args.skip_console {
            guildkeeper::console::run(registry, config.console.clone(), shutdown).await?;
            info!("shutdown complete");
            return Ok(());
        }
    }

    info!("no interactive channel enabled: waiting for ctrl-c");
    shutdown.cancelled().await;
    info!("shutdown complete");
    Ok(())
}

/// Open the JSON store under the work dir, falling back to process memory
/// when it is not writable. Provisions the console guild if asked to.
async fn open_store(config: &Config) -> Result<Arc<dyn EntityStore>, AppError> {
    let store: Arc<dyn EntityStore> = match JsonEntityStore::open(&config.work_dir).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("tenant store unavailable, keeping settings in memory: {e}");
            Arc::new(MemoryEntityStore::new())
        }
    };

    let console = &config.console;
    if console.provision && store.find_tenant(&console.tenant_id).await?.is_none() {
        let record = TenantRecord::new(console.tenant_id.clone(), console.user_id.clone());
        store.persist(&record).await?;
        info!(tenant = %console.tenant_id, owner = %console.user_id, "provisioned console guild");
    }
    Ok(store)
}

async fn sync_catalog(config: &Config, registry: &Registry) -> Result<(), AppError> {
    let client: Arc<dyn RemoteCatalogClient> =
        Arc::new(LocalCatalogClient::open(&config.catalog_path()).await?);
    let declared = registry.declared();

    let report = match &config.catalog.test_guild {
        Some(guild) => catalog::sync_test_guild(client, guild, &declared).await?,
        None => catalog::reconcile(client, &declared).await?,
    };
    info!(
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        failed = report.failed,
        "command catalog synced"
    );
    Ok(())
}

/// Start-up flags. Anything set here wins over the config file.
#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config_path: Option<String>,
    log_level: Option<&'static str>,
    skip_sync: bool,
    skip_console: bool,
}

const USAGE: &str = "\
guildkeeper: per-guild settings bot

Usage: guildkeeper [OPTIONS]

Options:
  -f, --config <PATH>   Config file (default: config/default.toml)
      --no-sync         Leave the command catalog as it is
      --no-console      Do not read commands from stdin; wait for Ctrl-C
  -v ... -vvvv          Log warn / info / debug / trace (RUST_LOG still wins)
  -h, --help            Print this help";

fn parse_cli_args() -> CliArgs {
    match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{USAGE}");
            std::process::exit(0);
        }
        Err(msg) => {
            eprintln!("error: {msg}\n\n{USAGE}");
            std::process::exit(2);
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<CliArgs>, String> {
    let mut parsed = CliArgs::default();
    let mut verbosity = 0usize;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-f" | "--config" => {
                let path = iter.next().ok_or("-f/--config needs a path")?;
                parsed.config_path = Some(path);
            }
            "--no-sync" => parsed.skip_sync = true,
            "--no-console" => parsed.skip_console = true,
            "--verbose" => verbosity += 1,
            flag if flag.len() > 1 && flag.starts_with('-') && flag[1..].bytes().all(|b| b == b'v') => {
                verbosity += flag.len() - 1;
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    // Guard and catalog diagnostics sit at debug.
    const TIERS: [&str; 4] = ["warn", "info", "debug", "trace"];
    parsed.log_level = (verbosity > 0).then(|| TIERS[verbosity.min(TIERS.len()) - 1]);
    Ok(Some(parsed))
}
