use clap::Parser;
use parking_lot::RwLock;
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::Duration,
};

use super::types::{AuthMode, LogLevel};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub listen_addr: SocketAddr,
    pub log_level: LogLevel,

    pub min_workers: usize,
    pub max_workers: usize,
    pub login_timeout: Duration,

    pub auth_mode: AuthMode,
    pub allow_user_substitution: bool,
    pub users_file_location: Option<PathBuf>,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        let args = Args::try_parse().unwrap_or_else(|e| panic!("Invalid CLI/ENV: {e}"));

        Self {
            listen_addr: SocketAddr::from((args.host, args.port)),
            log_level: args.log_level,
            min_workers: args.min_workers,
            max_workers: args.max_workers,
            login_timeout: Duration::from_millis(args.login_timeout_ms),
            auth_mode: args.auth,
            allow_user_substitution: args.allow_user_substitution,
            users_file_location: args.users_file,
        }
    }

    fn validate(&self) {
        if self.min_workers == 0 || self.max_workers == 0 {
            panic!("--min-workers and --max-workers must be at least 1");
        }
        if self.min_workers > self.max_workers {
            panic!(
                "--min-workers ({}) exceeds --max-workers ({})",
                self.min_workers, self.max_workers
            );
        }

        match (&self.auth_mode, &self.users_file_location) {
            (AuthMode::Strong, Some(path)) => must_exist_file(path, "--users / users.toml"),
            (AuthMode::Strong, None) => panic!("--auth strong requires --users <file>"),
            (AuthMode::None, Some(path)) => must_exist_file(path, "--users / users.toml"),
            (AuthMode::None, None) => {}
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about = "Query-session gateway")]
struct Args {
    // IPv4 or IPv6 literal (e.g., 0.0.0.0, 127.0.0.1, ::, ::1). Required via CLI or ENV.
    #[arg(long = "host", short = 'H', env = "SQLGATE_HOST")]
    host: IpAddr,

    // Required via CLI or ENV.
    #[arg(long = "port", short = 'p', env = "SQLGATE_PORT")]
    port: u16,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", default_value = "info")]
    log_level: LogLevel,

    #[arg(long = "min-workers", env = "SQLGATE_MIN_WORKERS", default_value_t = 4)]
    min_workers: usize,

    #[arg(long = "max-workers", env = "SQLGATE_MAX_WORKERS", default_value_t = 64)]
    max_workers: usize,

    // How long an incoming connection may wait for a free worker slot.
    #[arg(
        long = "login-timeout-ms",
        env = "SQLGATE_LOGIN_TIMEOUT_MS",
        default_value_t = 5_000
    )]
    login_timeout_ms: u64,

    #[arg(long = "auth", env = "SQLGATE_AUTH", default_value = "none")]
    auth: AuthMode,

    #[arg(long = "allow-user-substitution", env = "SQLGATE_ALLOW_USER_SUBSTITUTION")]
    allow_user_substitution: bool,

    // Required when --auth strong; optional otherwise.
    #[arg(long = "users", env = "SQLGATE_USERS_FILE")]
    users_file: Option<PathBuf>,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("config not initialized; call config::init() first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
