use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;
use tokio::fs;
use tracing::error;

// -----------------------------------------------------------------------------
// ----- Singleton -------------------------------------------------------------

static USERS: OnceCell<UsersConfig> = OnceCell::new();

// -----------------------------------------------------------------------------
// ----- UsersConfig -----------------------------------------------------------

/// Principals the gateway will verify under strong auth, plus the proxy
/// grants that say who may impersonate whom and from where.
#[derive(Debug, Clone)]
pub struct UsersConfig {
    inner: Arc<RwLock<UsersMap>>,
}

// -----------------------------------------------------------------------------
// ----- UsersConfig: Static ---------------------------------------------------

impl UsersConfig {
    /// Init: panic on any error. Do not continue with a bad state.
    pub async fn init(path: &Path) {
        let cfg = Self::from_file_async(path)
            .await
            .unwrap_or_else(|e| panic!("failed to load users config from {:?}: {e}", path));

        USERS
            .set(cfg)
            .unwrap_or_else(|_| panic!("UsersConfig::init called twice"));
    }

    /// Reload: on error, DO NOT swap; keep current map and log.
    pub async fn reload(path: &Path) {
        let new_cfg = match Self::from_file_async(path).await {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(
                    "reload failed; keeping previous users config. path={:?} error={}",
                    path, e
                );
                return;
            }
        };

        let new_map = new_cfg.inner.read().clone();
        let current = Self::handle();

        let mut guard = current.inner.write();
        *guard = new_map;
    }

    pub fn handle() -> &'static UsersConfig {
        USERS.get().expect("Users not initialized")
    }

    /// An empty config: no verifiable users, no proxy grants. What the
    /// gateway runs with under `--auth none` when no file is given.
    pub fn empty() -> Self {
        UsersConfig {
            inner: Arc::new(RwLock::new(UsersMap::default())),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- UsersConfig: Public ---------------------------------------------------

impl UsersConfig {
    pub fn authenticate(
        &self,
        client_username: &str,
        client_password: &str,
    ) -> Result<UserRecord, UsersError> {
        let guard = self.inner.read();
        let user = guard
            .by_username
            .get(client_username)
            .ok_or_else(|| UsersError::UnknownUser {
                username: client_username.to_string(),
            })?;

        if user.password.expose_secret() != client_password {
            return Err(UsersError::BadPassword);
        }

        Ok(user.clone())
    }

    /// Whether `real_user`, calling from `host`, may act as `proxy_user`.
    pub fn authorize_proxy(&self, real_user: &str, proxy_user: &str, host: &str) -> bool {
        let guard = self.inner.read();

        guard.proxy_grants.iter().any(|grant| {
            grant.real_user == real_user
                && matches_or_wildcard(&grant.proxy_users, proxy_user)
                && matches_or_wildcard(&grant.hosts, host)
        })
    }
}

// -----------------------------------------------------------------------------
// ----- UsersConfig: Private --------------------------------------------------

impl UsersConfig {
    async fn from_file_async(path: &Path) -> Result<UsersConfig, UsersError> {
        let raw = fs::read_to_string(path).await.map_err(|e| UsersError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub(crate) fn parse(raw: &str) -> Result<UsersConfig, UsersError> {
        let mut doc: UsersFile = toml::from_str(raw).map_err(|e| UsersError::Toml { source: e })?;

        let mut by_username = HashMap::with_capacity(doc.users.len());
        for user in doc.users.drain(..) {
            validate(&user)?;

            let record = UserRecord {
                username: user.username.clone(),
                password: SecretString::new(user.password.into_boxed_str()),
                admin: user.admin,
            };

            if by_username.insert(record.username.clone(), record).is_some() {
                return Err(UsersError::DuplicateUser {
                    username: user.username,
                });
            }
        }

        for grant in &doc.proxy_grants {
            if grant.real_user.trim().is_empty() {
                return Err(UsersError::InvalidField("real_user".into()));
            }
        }

        Ok(UsersConfig {
            inner: Arc::new(RwLock::new(UsersMap {
                by_username,
                proxy_grants: doc.proxy_grants,
            })),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: map ---------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct UsersMap {
    by_username: HashMap<String, UserRecord>,
    proxy_grants: Vec<ProxyGrant>,
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UsersFileEntry>,

    #[serde(default)]
    proxy_grants: Vec<ProxyGrant>,
}

#[derive(Debug, Clone, Deserialize)]
struct UsersFileEntry {
    #[serde(alias = "name")]
    username: String,

    password: String,

    #[serde(default)]
    admin: bool,
}

/// `proxy_users`/`hosts` accept the `*` wildcard.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyGrant {
    pub real_user: String,

    #[serde(default)]
    pub proxy_users: Vec<String>,

    #[serde(default)]
    pub hosts: Vec<String>,
}

// -----------------------------------------------------------------------------
// ----- Internal: In-memory record --------------------------------------------

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub password: SecretString,
    pub admin: bool,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn validate(u: &UsersFileEntry) -> Result<(), UsersError> {
    if u.username.trim().is_empty() {
        return Err(UsersError::InvalidField("username".into()));
    }
    if u.password.is_empty() {
        return Err(UsersError::InvalidField("password".into()));
    }
    Ok(())
}

fn matches_or_wildcard(list: &[String], value: &str) -> bool {
    list.iter().any(|entry| entry == "*" || entry == value)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UsersError {
    #[error("duplicate [[users]] entry for user '{username}'")]
    DuplicateUser { username: String },

    #[error("unknown user '{username}'")]
    UnknownUser { username: String },

    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("bad password")]
    BadPassword,

    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
