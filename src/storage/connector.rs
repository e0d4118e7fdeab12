use super::memory::MemoryStore;
use crate::configuration::ConnectionParams;
use crate::connection::{Connector, GraphStore, StoreUri};
use crate::core::{MigrationError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Connects to [`MemoryStore`]s by URI.
///
/// Stores are kept in a registry keyed by URI, so every connection to
/// `memory://app` within one connector sees the same data, and a
/// `file://` store is loaded from disk only on first use.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<String, MemoryStore>>,
    credentials: Option<(String, String)>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects connections that do not present exactly this username and password.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Makes `store` reachable as `memory://<name>`.
    pub async fn register(&self, name: &str, store: MemoryStore) {
        let key = StoreUri::Memory {
            name: name.to_string(),
        }
        .to_string();
        self.stores.lock().await.insert(key, store);
    }

    /// Handle on the named memory store, created empty on first use.
    pub async fn store(&self, name: &str) -> MemoryStore {
        let key = StoreUri::Memory {
            name: name.to_string(),
        }
        .to_string();
        self.stores.lock().await.entry(key).or_default().clone()
    }

    fn authenticate(&self, params: &ConnectionParams) -> Result<()> {
        let Some((username, password)) = &self.credentials else {
            return Ok(());
        };
        match params.credentials() {
            Some((given_user, given_password)) if given_user == username && given_password == password => Ok(()),
            Some((given_user, _)) => Err(MigrationError::Connection {
                uri: params.uri().to_string(),
                reason: format!("authentication failed for user '{}'", given_user),
            }),
            None => Err(MigrationError::Connection {
                uri: params.uri().to_string(),
                reason: "credentials required".to_string(),
            }),
        }
    }

    async fn open_file(&self, key: String, path: &Path, uri: &str) -> Result<MemoryStore> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(&key) {
            return Ok(store.clone());
        }
        let store = MemoryStore::open(path)
            .await
            .map_err(|err| MigrationError::Connection {
                uri: uri.to_string(),
                reason: err.to_string(),
            })?;
        stores.insert(key, store.clone());
        Ok(store)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn GraphStore>> {
        self.authenticate(params)?;
        let uri = StoreUri::parse(params.uri()).map_err(|reason| MigrationError::Connection {
            uri: params.uri().to_string(),
            reason,
        })?;

        let store = match &uri {
            StoreUri::Memory { name } => self.store(name).await,
            StoreUri::File { path } => self.open_file(uri.to_string(), path, params.uri()).await?,
        };
        log::info!("Connected to {}", uri);
        Ok(Arc::new(store))
    }
}
