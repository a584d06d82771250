//! Long-lived client handle over a document store.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use cosmosdemo_core::PartitionKey;

use crate::config::{Settings, StoreBackend};
use crate::feed::FeedPager;
use crate::store::{
    ContainerHandle, ContainerProperties, DatabaseHandle, DatabaseProperties, DocumentStore,
    CosmosDocumentStore, InMemoryDocumentStore, QueryOptions, StoreError, StoreResponse,
    Throughput,
};

/// Read consistency requested from the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    Session,
    ConsistentPrefix,
    #[default]
    Eventual,
}

impl ConsistencyLevel {
    /// Wire name, as sent in `x-ms-consistency-level`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::ConsistentPrefix => "ConsistentPrefix",
            ConsistencyLevel::Eventual => "Eventual",
        }
    }
}

impl FromStr for ConsistencyLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "strong" => Ok(ConsistencyLevel::Strong),
            "boundedstaleness" => Ok(ConsistencyLevel::BoundedStaleness),
            "session" => Ok(ConsistencyLevel::Session),
            "consistentprefix" => Ok(ConsistencyLevel::ConsistentPrefix),
            "eventual" => Ok(ConsistencyLevel::Eventual),
            _ => Err(StoreError::Configuration(format!(
                "unknown consistency level '{s}'"
            ))),
        }
    }
}

/// Everything needed to build a client.
#[derive(Clone, PartialEq)]
pub struct ClientOptions {
    pub endpoint: String,
    /// Base64 account master key.
    pub key: String,
    pub consistency_level: ConsistencyLevel,
    /// Regions to read from, most preferred first.
    pub preferred_regions: Vec<String>,
}

impl core::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("consistency_level", &self.consistency_level)
            .field("preferred_regions", &self.preferred_regions)
            .finish()
    }
}

/// Owned handle to a document store connection.
///
/// The handle is released exactly once: by an explicit [`DocumentClient::close`]
/// or, failing that, when the handle is dropped. Operations on a closed client
/// fail with [`StoreError::Closed`].
pub struct DocumentClient {
    store: Arc<dyn DocumentStore>,
    endpoint: String,
    closed: AtomicBool,
}

impl DocumentClient {
    pub fn new(store: Arc<dyn DocumentStore>, endpoint: impl Into<String>) -> Self {
        Self {
            store,
            endpoint: endpoint.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn store(&self) -> Result<&dyn DocumentStore, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(self.store.as_ref())
    }

    pub async fn create_database_if_not_exists(
        &self,
        id: &str,
    ) -> Result<StoreResponse<DatabaseProperties>, StoreError> {
        self.store()?.create_database_if_not_exists(id).await
    }

    pub fn database(&self, id: impl Into<String>) -> DatabaseHandle {
        DatabaseHandle::new(id)
    }

    pub async fn create_container_if_not_exists(
        &self,
        database: &DatabaseHandle,
        properties: &ContainerProperties,
        throughput: Throughput,
    ) -> Result<StoreResponse<ContainerProperties>, StoreError> {
        self.store()?
            .create_container_if_not_exists(database, properties, throughput)
            .await
    }

    pub fn container(&self, database: &DatabaseHandle, id: impl Into<String>) -> ContainerHandle {
        ContainerHandle::new(database, id)
    }

    pub async fn create_item<T: Serialize>(
        &self,
        container: &ContainerHandle,
        partition_key: &PartitionKey,
        item: &T,
    ) -> Result<StoreResponse<serde_json::Value>, StoreError> {
        let document =
            serde_json::to_value(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store()?
            .create_item(container, partition_key, document)
            .await
    }

    pub async fn read_item<T: DeserializeOwned>(
        &self,
        container: &ContainerHandle,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<StoreResponse<T>, StoreError> {
        let response = self.store()?.read_item(container, id, partition_key).await?;
        let request_charge = response.request_charge;
        let duration = response.duration;
        let resource = serde_json::from_value(response.resource)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoreResponse {
            resource,
            request_charge,
            duration,
            created: false,
        })
    }

    /// Lazy, forward-only pages of `query`. Nothing is sent until the first
    /// [`FeedPager::next_page`].
    pub fn query_items<T: DeserializeOwned>(
        &self,
        container: &ContainerHandle,
        query: impl Into<String>,
        options: QueryOptions,
    ) -> FeedPager<'_, T> {
        FeedPager::new(self, container.clone(), query.into(), options)
    }

    /// Release the store connection. Returns `true` for the call that released it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.store.close();
        debug!(endpoint = %self.endpoint, "client released");
        true
    }
}

impl Drop for DocumentClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl core::fmt::Debug for DocumentClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentClient")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builds a [`DocumentClient`] from client options.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ClientOptions) -> Result<DocumentClient, StoreError>;
}

/// Connector selected by configuration.
#[derive(Debug, Clone)]
pub enum BackendConnector {
    /// A hosted account, through the SDK.
    Gateway,
    /// A shared in-memory emulator.
    InMemory(Arc<InMemoryDocumentStore>),
}

impl BackendConnector {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.backend {
            StoreBackend::Gateway => BackendConnector::Gateway,
            StoreBackend::InMemory => {
                BackendConnector::InMemory(Arc::new(InMemoryDocumentStore::new()))
            }
        }
    }

    pub fn in_memory(store: Arc<InMemoryDocumentStore>) -> Self {
        BackendConnector::InMemory(store)
    }
}

#[async_trait::async_trait]
impl Connector for BackendConnector {
    async fn connect(&self, options: &ClientOptions) -> Result<DocumentClient, StoreError> {
        match self {
            BackendConnector::Gateway => {
                let store = CosmosDocumentStore::connect(options)?;
                Ok(DocumentClient::new(Arc::new(store), options.endpoint.clone()))
            }
            BackendConnector::InMemory(store) => {
                info!("using in-memory document store");
                let store: Arc<dyn DocumentStore> = store.clone();
                Ok(DocumentClient::new(store, options.endpoint.clone()))
            }
        }
    }
}
