use parking_lot::Mutex as SyncMutex;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex as AsyncMutex;

use crate::handle::Handle;

// -----------------------------------------------------------------------------
// ----- SessionRecord ---------------------------------------------------------

/// A client's authenticated, stateful context. The gate models the single
/// logical backend execution context per session: whoever holds it is the
/// only caller executing against that context.
#[derive(Debug)]
pub struct SessionRecord {
    handle: Handle,
    principal: String,
    proxy_principal: Option<String>,
    peer_host: String,

    conf: SyncMutex<HashMap<String, String>>,
    owned_operations: SyncMutex<HashSet<Handle>>,
    gate: AsyncMutex<()>,
    closed: AtomicBool,
}

// -----------------------------------------------------------------------------
// ----- SessionRecord: Static -------------------------------------------------

impl SessionRecord {
    pub fn new(
        handle: Handle,
        principal: String,
        proxy_principal: Option<String>,
        peer_host: String,
        conf: HashMap<String, String>,
    ) -> Self {
        Self {
            handle,
            principal,
            proxy_principal,
            peer_host,
            conf: SyncMutex::new(conf),
            owned_operations: SyncMutex::new(HashSet::new()),
            gate: AsyncMutex::new(()),
            closed: AtomicBool::new(false),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SessionRecord: Identity -----------------------------------------------

impl SessionRecord {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The principal work is executed as: the proxy user when substitution
    /// happened, otherwise the authenticated principal.
    pub fn effective_principal(&self) -> &str {
        self.proxy_principal.as_deref().unwrap_or(&self.principal)
    }

    pub fn authenticated_principal(&self) -> &str {
        &self.principal
    }

    pub fn proxy_principal(&self) -> Option<&str> {
        self.proxy_principal.as_deref()
    }

    pub fn peer_host(&self) -> &str {
        &self.peer_host
    }
}

// -----------------------------------------------------------------------------
// ----- SessionRecord: Configuration ------------------------------------------

impl SessionRecord {
    pub fn set_conf(&self, key: impl Into<String>, value: impl Into<String>) {
        self.conf.lock().insert(key.into(), value.into());
    }

    pub fn conf_snapshot(&self) -> HashMap<String, String> {
        self.conf.lock().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- SessionRecord: Owned operations ---------------------------------------

impl SessionRecord {
    pub fn track_operation(&self, handle: Handle) {
        self.owned_operations.lock().insert(handle);
    }

    pub fn untrack_operation(&self, handle: Handle) -> bool {
        self.owned_operations.lock().remove(&handle)
    }

    /// Drains the owned set for the close path. Operations are detached from
    /// the session before their records are torn down, so the two maps never
    /// disagree about a half-closed operation.
    pub fn take_owned_operations(&self) -> Vec<Handle> {
        self.owned_operations.lock().drain().collect()
    }

    pub fn owned_operation_count(&self) -> usize {
        self.owned_operations.lock().len()
    }
}

// -----------------------------------------------------------------------------
// ----- SessionRecord: Gate & lifecycle ---------------------------------------

impl SessionRecord {
    pub fn gate(&self) -> &AsyncMutex<()> {
        &self.gate
    }

    /// First close wins; later closes see false and stop.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
