use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc};

use crate::errors::{GatewayError, GatewayResult};

// -----------------------------------------------------------------------------
// ----- HandleKind ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Session,
    Operation,
}

impl HandleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HandleKind::Session => "session",
            HandleKind::Operation => "operation",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Handle ----------------------------------------------------------------

/// Opaque 128-bit identifier with a kind tag, addressing a session or an
/// operation across the RPC boundary. Immutable once issued; equality by
/// value. 128 random bits make reuse within a process lifetime a non-event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub kind: HandleKind,
    hi: u64,
    lo: u64,
}

impl Handle {
    pub fn generate(kind: HandleKind) -> Self {
        let mut rng = rand::rng();

        Handle {
            kind,
            hi: rng.random(),
            lo: rng.random(),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:016x}{:016x}", self.kind.as_str(), self.hi, self.lo)
    }
}

// -----------------------------------------------------------------------------
// ----- HandleRegistry --------------------------------------------------------

/// Shared handle -> live object map. Owned by the manager that creates it and
/// passed by reference; there is no ambient global registry.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    kind: HandleKind,
    live: RwLock<HashMap<Handle, Arc<T>>>,
}

impl<T> HandleRegistry<T> {
    pub fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            live: RwLock::new(HashMap::new()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- HandleRegistry: Public ------------------------------------------------

impl<T> HandleRegistry<T> {
    pub fn allocate(&self) -> Handle {
        Handle::generate(self.kind)
    }

    pub fn register(&self, handle: Handle, object: Arc<T>) {
        debug_assert_eq!(handle.kind, self.kind);

        self.live.write().insert(handle, object);
    }

    pub fn lookup(&self, handle: Handle) -> GatewayResult<Arc<T>> {
        if handle.kind != self.kind {
            return Err(GatewayError::InvalidArgument(format!(
                "expected a {} handle, got {handle}",
                self.kind.as_str()
            )));
        }

        self.live
            .read()
            .get(&handle)
            .cloned()
            .ok_or_else(|| GatewayError::stale_handle(handle))
    }

    pub fn remove(&self, handle: Handle) -> GatewayResult<Arc<T>> {
        self.live
            .write()
            .remove(&handle)
            .ok_or_else(|| GatewayError::stale_handle(handle))
    }

    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
