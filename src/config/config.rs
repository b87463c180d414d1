use parking_lot::RwLock;
use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::Duration,
};

use super::{
    cli::CliConfig,
    types::{AuthMode, LogLevel},
    users::UsersConfig,
};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: LogLevel,

    pub min_workers: usize,
    pub max_workers: usize,
    pub login_timeout: Duration,

    pub auth_mode: AuthMode,
    pub allow_user_substitution: bool,
    pub users: UsersConfig,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Async because UsersConfig::init() is async (non-blocking IO).
    pub async fn init() {
        CliConfig::init();

        let cli = CliConfig::snapshot();
        if let Some(path) = &cli.users_file_location {
            UsersConfig::init(path).await;
        }

        Self::load();
    }

    /// Pure in-memory reload. Call this after you've reloaded sub-configs.
    pub fn reload() {
        Self::load();
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    fn load() {
        let cli = CliConfig::snapshot();

        let users = if cli.users_file_location.is_some() {
            UsersConfig::handle().clone()
        } else {
            UsersConfig::empty()
        };

        let next = Config {
            listen_addr: cli.listen_addr,
            log_level: cli.log_level,
            min_workers: cli.min_workers,
            max_workers: cli.max_workers,
            login_timeout: cli.login_timeout,
            auth_mode: cli.auth_mode,
            allow_user_substitution: cli.allow_user_substitution,
            users,
        };

        if let Some(handle) = ROOT_CONFIG.get() {
            *handle.write() = next;
        } else {
            let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(next)));
        }
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
