//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the file passed with `-f`), then applies `GUILDKEEPER_WORK_DIR`, `GUILDKEEPER_LOG_LEVEL` and
//! `TEST_SERVER` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Command catalog sync settings.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Reconcile the remote catalog once at start-up.
    pub sync_on_start: bool,
    /// When set, re-register every command on this guild instead of
    /// reconciling the global catalog.
    pub test_guild: Option<String>,
}

/// Local console front-end settings. The console acts as one fixed member
/// of one guild.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub tenant_id: String,
    pub user_id: String,
    pub administrator: bool,
    /// Create the console guild with default settings if it does not exist.
    pub provision: bool,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file (absolute, or relative to `work_dir`).
    pub log_file: Option<PathBuf>,
    pub catalog: CatalogConfig,
    pub console: ConsoleConfig,
}

impl Config {
    /// Where the local command catalog is persisted.
    pub fn catalog_path(&self) -> PathBuf {
        self.work_dir.join("catalog.json")
    }
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    catalog: RawCatalog,
    #[serde(default)]
    console: RawConsole,
}

#[derive(Deserialize)]
struct RawBot {
    name: String,
    work_dir: String,
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default = "default_true")]
    sync_on_start: bool,
    #[serde(default)]
    test_guild: Option<String>,
}

impl Default for RawCatalog {
    fn default() -> Self {
        Self { sync_on_start: true, test_guild: None }
    }
}

#[derive(Deserialize)]
struct RawConsole {
    /// Defaults to `true`: the console is the only built-in front-end.
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_console_tenant")]
    tenant_id: String,
    #[serde(default = "default_console_user")]
    user_id: String,
    #[serde(default = "default_true")]
    administrator: bool,
    #[serde(default = "default_true")]
    provision: bool,
}

impl Default for RawConsole {
    fn default() -> Self {
        Self {
            enabled: true,
            tenant_id: default_console_tenant(),
            user_id: default_console_user(),
            administrator: true,
            provision: true,
        }
    }
}

fn default_console_tenant() -> String { "local".to_string() }
fn default_console_user() -> String { "console".to_string() }

fn default_true() -> bool {
    true
}

/// Env-var overrides applied on top of the TOML file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub test_guild: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("GUILDKEEPER_WORK_DIR").ok(),
            log_level: env::var("GUILDKEEPER_LOG_LEVEL").ok(),
            test_guild: env::var("TEST_SERVER").ok(),
        }
    }
}

/// Load config from `config_path` (default `config/default.toml`), then
/// apply env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let path = Path::new(config_path.unwrap_or("config/default.toml"));
    load_from(path, &Overrides::from_env())
}

/// Internal loader: accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let b = parsed.bot;
    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&b.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(b.log_level);
    let log_file = b.log_file.map(|f| {
        let path = expand_home(&f);
        if path.is_absolute() { path } else { work_dir.join(path) }
    });

    // An empty TEST_SERVER means "not set", matching the TOML default.
    let test_guild = overrides
        .test_guild
        .clone()
        .or(parsed.catalog.test_guild)
        .filter(|g| !g.trim().is_empty());

    if parsed.console.tenant_id.trim().is_empty() {
        return Err(AppError::Config("console.tenant_id must not be empty".into()));
    }

    Ok(Config {
        bot_name: b.name,
        work_dir,
        log_level,
        log_file,
        catalog: CatalogConfig {
            sync_on_start: parsed.catalog.sync_on_start,
            test_guild,
        },
        console: ConsoleConfig {
            enabled: parsed.console.enabled,
            tenant_id: parsed.console.tenant_id,
            user_id: parsed.console.user_id,
            administrator: parsed.console.administrator,
            provision: parsed.console.provision,
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}
