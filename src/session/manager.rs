use parking_lot::Mutex;
use rand::Rng;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

use crate::config::{AuthMode, UsersConfig};
use crate::errors::{GatewayError, GatewayResult};
use crate::handle::{Handle, HandleKind, HandleRegistry};
use crate::operation::manager::OperationManager;

use super::record::SessionRecord;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Overlay key a client sets to request running as another principal.
pub const PROXY_USER_KEY: &str = "sqlgate.proxy.user";

const RESERVED_PREFIX: &str = "sqlgate.";

// -----------------------------------------------------------------------------
// ----- SessionPolicy ---------------------------------------------------------

/// The slice of server configuration session admission depends on. Passed in
/// explicitly so the manager has no ambient config coupling.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub auth_mode: AuthMode,
    pub allow_user_substitution: bool,
    pub users: UsersConfig,
}

// -----------------------------------------------------------------------------
// ----- SessionManager --------------------------------------------------------

#[derive(Debug)]
pub struct SessionManager {
    policy: SessionPolicy,
    registry: HandleRegistry<SessionRecord>,
    tokens: Mutex<HashMap<String, TokenRecord>>,
}

#[derive(Debug, Clone)]
struct TokenRecord {
    owner: String,
    renewer: String,
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Static ------------------------------------------------

impl SessionManager {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            registry: HandleRegistry::new(HandleKind::Session),
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Sessions ----------------------------------------------

impl SessionManager {
    pub fn open_session(
        &self,
        principal: &str,
        password: &str,
        peer_host: &str,
        overlay: HashMap<String, String>,
    ) -> GatewayResult<Arc<SessionRecord>> {
        validate_overlay(&overlay)?;

        if principal.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "session principal must not be empty".to_string(),
            ));
        }

        if self.policy.auth_mode.is_strong() {
            self.policy
                .users
                .authenticate(principal, password)
                .map_err(|e| GatewayError::Authorization(e.to_string()))?;
        }

        let proxy_principal = self.resolve_proxy(principal, peer_host, &overlay)?;

        let handle = self.registry.allocate();
        let record = Arc::new(SessionRecord::new(
            handle,
            principal.to_string(),
            proxy_principal,
            peer_host.to_string(),
            overlay,
        ));
        self.registry.register(handle, record.clone());

        info!(
            session = %handle,
            principal = record.effective_principal(),
            peer = peer_host,
            "session opened"
        );
        Ok(record)
    }

    pub fn get_session(&self, handle: Handle) -> GatewayResult<Arc<SessionRecord>> {
        self.registry.lookup(handle)
    }

    /// Closes every owned operation (all are attempted; failures are logged
    /// and do not stop the sweep), then removes the handle. Terminal and
    /// best-effort: the handle is gone afterwards no matter what.
    pub fn close_session(
        &self,
        handle: Handle,
        operations: &OperationManager,
    ) -> GatewayResult<()> {
        let record = self.registry.lookup(handle)?;

        if !record.mark_closed() {
            // A concurrent close already won; it will remove the handle.
            return Err(GatewayError::stale_handle(handle));
        }

        let mut failed = 0usize;
        for op_handle in record.take_owned_operations() {
            if let Err(err) = operations.close_operation(op_handle) {
                failed += 1;
                warn!(session = %handle, operation = %op_handle, error = %err,
                    "failed to close operation during session close");
            }
        }

        self.registry.remove(handle)?;

        info!(session = %handle, failed_operations = failed, "session closed");
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Impersonation -----------------------------------------

impl SessionManager {
    fn resolve_proxy(
        &self,
        real_user: &str,
        peer_host: &str,
        overlay: &HashMap<String, String>,
    ) -> GatewayResult<Option<String>> {
        let Some(proxy_user) = overlay.get(PROXY_USER_KEY) else {
            return Ok(None);
        };

        if !self.policy.allow_user_substitution {
            return Err(GatewayError::Authorization(
                "proxy user substitution is not allowed".to_string(),
            ));
        }

        // Without authentication there is nothing further to verify.
        if !self.policy.auth_mode.is_strong() {
            return Ok(Some(proxy_user.clone()));
        }

        if !self
            .policy
            .users
            .authorize_proxy(real_user, proxy_user, peer_host)
        {
            return Err(GatewayError::Authorization(format!(
                "'{real_user}' is not authorized to impersonate '{proxy_user}' from {peer_host}"
            )));
        }

        Ok(Some(proxy_user.clone()))
    }
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Delegation tokens -------------------------------------

impl SessionManager {
    pub fn issue_delegation_token(
        &self,
        session: Handle,
        owner: &str,
        renewer: &str,
    ) -> GatewayResult<String> {
        self.registry.lookup(session)?;

        let token = random_token();
        self.tokens.lock().insert(
            token.clone(),
            TokenRecord {
                owner: owner.to_string(),
                renewer: renewer.to_string(),
            },
        );

        info!(session = %session, owner, renewer, "delegation token issued");
        Ok(token)
    }

    pub fn cancel_delegation_token(&self, session: Handle, token: &str) -> GatewayResult<()> {
        self.registry.lookup(session)?;

        self.tokens
            .lock()
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound("unknown delegation token".to_string()))
    }

    pub fn renew_delegation_token(&self, session: Handle, token: &str) -> GatewayResult<()> {
        self.registry.lookup(session)?;

        let tokens = self.tokens.lock();
        let record = tokens
            .get(token)
            .ok_or_else(|| GatewayError::NotFound("unknown delegation token".to_string()))?;

        info!(
            session = %session,
            owner = record.owner.as_str(),
            renewer = record.renewer.as_str(),
            "delegation token renewed"
        );
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Overlay validation ----------------------------------------------------

/// Config overlays may carry arbitrary backend options, but gateway-reserved
/// keys must be ones the gateway actually understands.
pub fn validate_overlay(overlay: &HashMap<String, String>) -> GatewayResult<()> {
    for key in overlay.keys() {
        if key.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "config overlay contains an empty key".to_string(),
            ));
        }

        if key.starts_with(RESERVED_PREFIX) && key != PROXY_USER_KEY {
            return Err(GatewayError::InvalidArgument(format!(
                "unrecognized gateway option '{key}'"
            )));
        }
    }
    Ok(())
}

fn random_token() -> String {
    let mut rng = rand::rng();
    let hi: u64 = rng.random();
    let lo: u64 = rng.random();
    format!("{hi:016x}{lo:016x}")
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(auth_mode: AuthMode, allow_substitution: bool, users_toml: &str) -> SessionManager {
        let users = if users_toml.is_empty() {
            UsersConfig::empty()
        } else {
            UsersConfig::parse(users_toml).unwrap()
        };

        SessionManager::new(SessionPolicy {
            auth_mode,
            allow_user_substitution: allow_substitution,
            users,
        })
    }

    fn overlay(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn open_without_auth_accepts_any_principal() {
        let mgr = manager(AuthMode::None, false, "");
        let session = mgr
            .open_session("alice", "", "127.0.0.1", HashMap::new())
            .unwrap();
        assert_eq!(session.effective_principal(), "alice");
        assert_eq!(mgr.session_count(), 1);
    }

    #[test]
    fn strong_auth_rejects_bad_credentials() {
        let mgr = manager(
            AuthMode::Strong,
            false,
            r#"
            [[users]]
            username = "alice"
            password = "hunter2"
        "#,
        );

        assert!(
            mgr.open_session("alice", "hunter2", "127.0.0.1", HashMap::new())
                .is_ok()
        );
        assert!(matches!(
            mgr.open_session("alice", "wrong", "127.0.0.1", HashMap::new()),
            Err(GatewayError::Authorization(_))
        ));
        assert!(matches!(
            mgr.open_session("mallory", "x", "127.0.0.1", HashMap::new()),
            Err(GatewayError::Authorization(_))
        ));
    }

    #[test]
    fn proxy_denied_when_substitution_disabled() {
        let mgr = manager(AuthMode::None, false, "");

        let err = mgr
            .open_session(
                "svc",
                "",
                "127.0.0.1",
                overlay(&[(PROXY_USER_KEY, "alice")]),
            )
            .unwrap_err();
        assert!(matches!(err, GatewayError::Authorization(_)));
    }

    #[test]
    fn proxy_unconditional_under_no_auth() {
        let mgr = manager(AuthMode::None, true, "");

        let session = mgr
            .open_session(
                "svc",
                "",
                "127.0.0.1",
                overlay(&[(PROXY_USER_KEY, "alice")]),
            )
            .unwrap();
        assert_eq!(session.effective_principal(), "alice");
        assert_eq!(session.authenticated_principal(), "svc");
    }

    #[test]
    fn proxy_under_strong_auth_requires_grant() {
        let users = r#"
            [[users]]
            username = "svc"
            password = "s3cret"

            [[proxy_grants]]
            real_user = "svc"
            proxy_users = ["alice"]
            hosts = ["10.0.0.1"]
        "#;
        let mgr = manager(AuthMode::Strong, true, users);

        let session = mgr
            .open_session(
                "svc",
                "s3cret",
                "10.0.0.1",
                overlay(&[(PROXY_USER_KEY, "alice")]),
            )
            .unwrap();
        assert_eq!(session.effective_principal(), "alice");

        // Same grant, wrong host.
        assert!(matches!(
            mgr.open_session(
                "svc",
                "s3cret",
                "10.0.0.99",
                overlay(&[(PROXY_USER_KEY, "alice")]),
            ),
            Err(GatewayError::Authorization(_))
        ));
    }

    #[test]
    fn malformed_overlay_is_invalid_argument() {
        let mgr = manager(AuthMode::None, false, "");

        assert!(matches!(
            mgr.open_session("alice", "", "h", overlay(&[("", "v")])),
            Err(GatewayError::InvalidArgument(_))
        ));
        assert!(matches!(
            mgr.open_session("alice", "", "h", overlay(&[("sqlgate.bogus", "v")])),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn delegation_token_roundtrip() {
        let mgr = manager(AuthMode::None, false, "");
        let session = mgr
            .open_session("alice", "", "127.0.0.1", HashMap::new())
            .unwrap();
        let handle = session.handle();

        let token = mgr
            .issue_delegation_token(handle, "alice", "renewer")
            .unwrap();
        mgr.renew_delegation_token(handle, &token).unwrap();
        mgr.cancel_delegation_token(handle, &token).unwrap();

        assert!(matches!(
            mgr.renew_delegation_token(handle, &token),
            Err(GatewayError::NotFound(_))
        ));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
