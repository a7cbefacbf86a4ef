//! Shared, reference-counted storage client.
//!
//! Every worker holds a [`ClientHandle`]. The first `acquire` connects and
//! creates the [`Session`]; dropping the last handle closes the client.

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

use dingo_core::{BindingConfig, BindingResult, StorageError};
use dingo_storage::{Connector, StorageClient};

use crate::registry::SchemaRegistry;

/// The shared client and its schema registry.
pub struct Session {
    client: Arc<dyn StorageClient>,
    registry: SchemaRegistry,
}

impl Session {
    pub fn client(&self) -> &dyn StorageClient {
        self.client.as_ref()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct PoolState {
    session: Option<Arc<Session>>,
    users: usize,
}

/// Pool handing out one shared session.
pub struct ClientPool {
    connector: Arc<dyn Connector>,
    config: BindingConfig,
    state: Mutex<PoolState>,
}

impl ClientPool {
    pub fn new(connector: Arc<dyn Connector>, config: BindingConfig) -> Arc<Self> {
        Arc::new(Self {
            connector,
            config,
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Acquire the shared session, connecting if no one holds it.
    ///
    /// A failed connect leaves the pool empty, so the next acquire retries.
    pub fn acquire(self: &Arc<Self>) -> BindingResult<ClientHandle> {
        let mut state = self.state.lock().map_err(|_| StorageError::LockPoisoned)?;

        let session = match state.session.clone() {
            Some(session) => session,
            None => {
                self.config.validate()?;
                let client = self.connector.connect(&self.config)?;
                tracing::info!(
                    endpoint = %self.config.coordinator_host,
                    table = %self.config.table,
                    "Connected storage client"
                );
                let session = Arc::new(Session {
                    client,
                    registry: SchemaRegistry::new(),
                });
                state.session = Some(Arc::clone(&session));
                session
            }
        };

        state.users += 1;
        Ok(ClientHandle {
            pool: Arc::clone(self),
            session,
        })
    }

    /// Number of live handles.
    pub fn active_users(&self) -> usize {
        self.lock_state().users
    }

    /// True while a session is open.
    pub fn is_connected(&self) -> bool {
        self.lock_state().session.is_some()
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self) {
        let mut state = self.lock_state();
        state.users = state.users.saturating_sub(1);
        if state.users > 0 {
            return;
        }

        if let Some(session) = state.session.take() {
            match session.client.close() {
                Ok(()) => tracing::info!(
                    endpoint = %self.config.coordinator_host,
                    "Closed storage client"
                ),
                Err(e) => tracing::warn!(
                    endpoint = %self.config.coordinator_host,
                    error = %e,
                    "Failed to close storage client"
                ),
            }
        }
    }
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("config", &self.config)
            .field("active_users", &self.active_users())
            .finish_non_exhaustive()
    }
}

/// A reference to the shared session. Releases on drop.
#[derive(Debug)]
pub struct ClientHandle {
    pool: Arc<ClientPool>,
    session: Arc<Session>,
}

impl Deref for ClientHandle {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dingo_core::{BindingError, ConfigError, ConnectionError};
    use dingo_storage::{MockConnector, MockStorage};

    fn pool_with(connector: MockConnector) -> (Arc<ClientPool>, Arc<MockConnector>) {
        let connector = Arc::new(connector);
        let pool = ClientPool::new(connector.clone(), BindingConfig::new("mem://test"));
        (pool, connector)
    }

    #[test]
    fn test_connects_once_and_closes_on_last_release() {
        let storage = Arc::new(MockStorage::new());
        let (pool, connector) = pool_with(MockConnector::new(storage.clone()));

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(pool.active_users(), 2);

        drop(first);
        assert_eq!(pool.active_users(), 1);
        assert!(pool.is_connected());
        assert_eq!(storage.close_count(), 0);

        drop(second);
        assert_eq!(pool.active_users(), 0);
        assert!(!pool.is_connected());
        assert_eq!(storage.close_count(), 1);
    }

    #[test]
    fn test_reconnects_after_full_release() {
        let storage = Arc::new(MockStorage::new());
        let (pool, connector) = pool_with(MockConnector::new(storage.clone()));

        drop(pool.acquire().unwrap());
        let handle = pool.acquire().unwrap();
        assert_eq!(connector.connect_count(), 2);
        assert!(handle.client().table("missing").unwrap().is_none());
    }

    #[test]
    fn test_handles_share_registry() {
        let (pool, _) = pool_with(MockConnector::new(Arc::new(MockStorage::new())));
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();

        let built = a.registry().get_or_build("usertable", 3).unwrap();
        let cached = b.registry().get("usertable").unwrap().unwrap();
        assert!(Arc::ptr_eq(&built, &cached));
    }

    #[test]
    fn test_failed_connect_leaves_pool_empty() {
        let (pool, _) = pool_with(MockConnector::new(Arc::new(MockStorage::new())).unreachable());
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, BindingError::Connection(ConnectionError::Unreachable { .. })));
        assert_eq!(pool.active_users(), 0);
        assert!(!pool.is_connected());
    }

    #[test]
    fn test_invalid_config_rejected_before_connect() {
        let connector = Arc::new(MockConnector::new(Arc::new(MockStorage::new())));
        let pool = ClientPool::new(connector.clone(), BindingConfig::default());
        assert!(matches!(
            pool.acquire(),
            Err(BindingError::Config(ConfigError::MissingRequired { .. }))
        ));
        assert_eq!(connector.connect_count(), 0);
    }
}
