use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use cosmosdemo_core::PartitionKey;

/// Properties of a logical database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseProperties {
    pub id: String,
}

/// Partition key declaration of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    #[serde(default = "PartitionKeyDefinition::hash_kind")]
    pub kind: String,
}

impl PartitionKeyDefinition {
    fn hash_kind() -> String {
        "Hash".to_string()
    }
}

/// Properties of a container: its id and declared partition key path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProperties {
    pub id: String,
    #[serde(rename = "partitionKey")]
    pub partition_key: PartitionKeyDefinition,
}

impl ContainerProperties {
    pub fn new(id: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: PartitionKeyDefinition {
                paths: vec![partition_key_path.into()],
                kind: PartitionKeyDefinition::hash_kind(),
            },
        }
    }

    pub fn partition_key_path(&self) -> Option<&str> {
        self.partition_key.paths.first().map(String::as_str)
    }
}

/// Throughput provisioned for a container at creation time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Throughput {
    /// Fixed request units per second.
    Manual(u32),
}

impl Throughput {
    pub fn request_units(&self) -> u32 {
        match self {
            Throughput::Manual(ru) => *ru,
        }
    }
}

/// Handle to a database. Cheap to clone; carries no connection state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseHandle {
    id: String,
}

impl DatabaseHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resource link, e.g. `dbs/MainDB`.
    pub fn link(&self) -> String {
        format!("dbs/{}", self.id)
    }
}

/// Handle to a container inside a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    database_id: String,
    id: String,
}

impl ContainerHandle {
    pub fn new(database: &DatabaseHandle, id: impl Into<String>) -> Self {
        Self {
            database_id: database.id().to_string(),
            id: id.into(),
        }
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resource link, e.g. `dbs/MainDB/colls/Employee`.
    pub fn link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database_id, self.id)
    }
}

/// Per-request query options.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Maximum number of items per page.
    pub max_item_count: u32,
    /// Ask the store to return execution metrics with each page.
    pub populate_query_metrics: bool,
    /// Restrict the query to one partition (cross-partition when `None`).
    pub partition_key: Option<PartitionKey>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_item_count: 10,
            populate_query_metrics: false,
            partition_key: None,
        }
    }
}

/// Result of a single store operation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<T> {
    pub resource: T,
    /// Request units charged for the operation.
    pub request_charge: f64,
    /// Wall-clock time the operation took, as seen by the caller.
    pub duration: Duration,
    /// `true` when the call created the resource, `false` when it already existed.
    pub created: bool,
}

impl<T> StoreResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StoreResponse<U> {
        StoreResponse {
            resource: f(self.resource),
            request_charge: self.request_charge,
            duration: self.duration,
            created: self.created,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub request_charge: f64,
    pub duration: Duration,
    /// Token for the next page; `None` on the last page.
    pub continuation: Option<String>,
    /// Raw query execution metrics, when requested.
    pub query_metrics: Option<String>,
}

impl<T> FeedPage<T> {
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<FeedPage<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(FeedPage {
            items,
            request_charge: self.request_charge,
            duration: self.duration,
            continuation: self.continuation,
            query_metrics: self.query_metrics,
        })
    }
}

/// Store operation error.
///
/// These are **infrastructure errors** (transport, service status, configuration),
/// as opposed to record-level domain errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid client configuration: {0}")]
    Configuration(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request rate too large (retry after {retry_after_ms:?} ms)")]
    Throttled { retry_after_ms: Option<u64> },

    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("client is closed")]
    Closed,

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Network failures, throttling and server-side 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Throttled { .. } => true,
            StoreError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Document store capability consumed by the demo.
///
/// All operations address resources through handles; none of them retries.
/// `close` releases whatever connection resources the adapter holds.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the database unless it exists. `created` tells which happened.
    async fn create_database_if_not_exists(
        &self,
        id: &str,
    ) -> Result<StoreResponse<DatabaseProperties>, StoreError>;

    /// Create the container unless it exists. The throughput only applies on creation.
    async fn create_container_if_not_exists(
        &self,
        database: &DatabaseHandle,
        properties: &ContainerProperties,
        throughput: Throughput,
    ) -> Result<StoreResponse<ContainerProperties>, StoreError>;

    async fn create_item(
        &self,
        container: &ContainerHandle,
        partition_key: &PartitionKey,
        item: JsonValue,
    ) -> Result<StoreResponse<JsonValue>, StoreError>;

    /// Point read by id + partition key.
    async fn read_item(
        &self,
        container: &ContainerHandle,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<StoreResponse<JsonValue>, StoreError>;

    /// Fetch one page of a query. `continuation` is `None` for the first page.
    async fn query_page(
        &self,
        container: &ContainerHandle,
        query: &str,
        options: &QueryOptions,
        continuation: Option<&str>,
    ) -> Result<FeedPage<JsonValue>, StoreError>;

    fn close(&self);
}
