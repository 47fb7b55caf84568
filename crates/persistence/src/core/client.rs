//! The store client handle.
//!
//! A [`ClientCell`] holds the single store client of a process. It is built
//! once at startup and then shared; the cell itself is passed to whoever
//! needs it instead of living in a global.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::store::DocumentStore;
use crate::error::{ClientError, ErrorCode, StorageResult};

enum ClientState<S> {
    Uninitialized,
    Ready(Arc<S>),
}

/// A write-once holder for the store client.
///
/// # Examples
///
/// ```
/// use docgate_persistence::backends::sqlite::SqliteStore;
/// use docgate_persistence::core::ClientCell;
/// use docgate_persistence::error::ClientError;
///
/// let cell = ClientCell::new();
/// assert_eq!(cell.get().err(), Some(ClientError::NotInitialized));
///
/// cell.init(SqliteStore::in_memory().unwrap()).unwrap();
/// assert!(cell.get().is_ok());
///
/// let again = cell.init(SqliteStore::in_memory().unwrap());
/// assert_eq!(again.err(), Some(ClientError::AlreadyInitialized));
/// ```
pub struct ClientCell<S> {
    state: RwLock<ClientState<S>>,
}

impl<S> Default for ClientCell<S> {
    fn default() -> Self {
        Self {
            state: RwLock::new(ClientState::Uninitialized),
        }
    }
}

impl<S> std::fmt::Debug for ClientCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCell")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl<S> ClientCell<S> {
    /// Creates an empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the client. Fails if the cell is already initialized.
    pub fn init(&self, store: S) -> Result<Arc<S>, ClientError> {
        let mut state = self.state.write();
        if let ClientState::Ready(_) = *state {
            return Err(ClientError::AlreadyInitialized);
        }
        let store = Arc::new(store);
        *state = ClientState::Ready(Arc::clone(&store));
        Ok(store)
    }

    /// Returns the client. Fails if the cell was never initialized.
    pub fn get(&self) -> Result<Arc<S>, ClientError> {
        match &*self.state.read() {
            ClientState::Ready(store) => Ok(Arc::clone(store)),
            ClientState::Uninitialized => Err(ClientError::NotInitialized),
        }
    }

    /// Returns true once [`init`](Self::init) has succeeded.
    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read(), ClientState::Ready(_))
    }
}

impl<S: DocumentStore> ClientCell<S> {
    /// Initializes the cell and probes the store.
    ///
    /// An authorization failure during the probe only logs a warning; any
    /// other probe failure is returned.
    pub async fn connect(&self, store: S) -> StorageResult<Arc<S>> {
        let store = self.init(store)?;

        match store.server_info().await {
            Ok(server) => {
                info!(
                    backend = store.backend_name(),
                    server = %server.name,
                    version = %server.version,
                    "Connected to document store"
                );
            }
            Err(e) if e.code() == Some(ErrorCode::UNAUTHORIZED) => {
                warn!(
                    backend = store.backend_name(),
                    error = %e,
                    "Not authorized to read the store version"
                );
            }
            Err(e) => return Err(e),
        }

        Ok(store)
    }
}
