use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use serde_json::Value as JsonValue;

use cosmosdemo_core::PartitionKey;

use super::r#trait::{
    ContainerHandle, ContainerProperties, DatabaseHandle, DatabaseProperties, DocumentStore,
    FeedPage, QueryOptions, StoreError, StoreResponse, Throughput,
};

const CHARGE_METADATA_READ: f64 = 1.0;
const CHARGE_METADATA_CREATE: f64 = 5.0;
const CHARGE_ITEM_WRITE: f64 = 5.71;
const CHARGE_POINT_READ: f64 = 1.0;
const CHARGE_QUERY_BASE: f64 = 2.28;
const CHARGE_QUERY_PER_ITEM: f64 = 0.07;

#[derive(Debug)]
struct ContainerState {
    properties: ContainerProperties,
    throughput: Throughput,
    /// Insertion order is the query result order.
    documents: Vec<JsonValue>,
}

#[derive(Debug)]
struct DatabaseState {
    properties: DatabaseProperties,
    containers: HashMap<String, ContainerState>,
}

/// In-memory document store emulator.
///
/// Intended for tests/dev. Not optimized for performance. The emulator plays the
/// hosted service, so it outlives the clients connected to it: `close` only
/// records that a client released its connection.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    databases: RwLock<HashMap<String, DatabaseState>>,
    closes: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a client released this store.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn database_exists(&self, id: &str) -> bool {
        self.databases
            .read()
            .map(|dbs| dbs.contains_key(id))
            .unwrap_or(false)
    }

    pub fn database_count(&self) -> usize {
        self.databases.read().map(|dbs| dbs.len()).unwrap_or(0)
    }

    /// Properties and provisioned throughput of a container, if it exists.
    pub fn container_info(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Option<(ContainerProperties, Throughput)> {
        let dbs = self.databases.read().ok()?;
        let container = dbs.get(database_id)?.containers.get(container_id)?;
        Some((container.properties.clone(), container.throughput))
    }

    pub fn container_count(&self, database_id: &str) -> usize {
        self.databases
            .read()
            .ok()
            .and_then(|dbs| dbs.get(database_id).map(|db| db.containers.len()))
            .unwrap_or(0)
    }

    pub fn document_count(&self, container: &ContainerHandle) -> usize {
        self.databases
            .read()
            .ok()
            .and_then(|dbs| {
                dbs.get(container.database_id())
                    .and_then(|db| db.containers.get(container.id()))
                    .map(|c| c.documents.len())
            })
            .unwrap_or(0)
    }

    fn poisoned() -> StoreError {
        StoreError::Storage("lock poisoned".to_string())
    }

    fn container_mut<'a>(
        dbs: &'a mut HashMap<String, DatabaseState>,
        container: &ContainerHandle,
    ) -> Result<&'a mut ContainerState, StoreError> {
        dbs.get_mut(container.database_id())
            .ok_or_else(|| StoreError::NotFound(format!("database '{}'", container.database_id())))?
            .containers
            .get_mut(container.id())
            .ok_or_else(|| StoreError::NotFound(format!("container '{}'", container.link())))
    }

    fn container_ref<'a>(
        dbs: &'a HashMap<String, DatabaseState>,
        container: &ContainerHandle,
    ) -> Result<&'a ContainerState, StoreError> {
        dbs.get(container.database_id())
            .ok_or_else(|| StoreError::NotFound(format!("database '{}'", container.database_id())))?
            .containers
            .get(container.id())
            .ok_or_else(|| StoreError::NotFound(format!("container '{}'", container.link())))
    }

    fn document_id(document: &JsonValue) -> Option<&str> {
        document.get("id").and_then(JsonValue::as_str)
    }

    fn in_partition(state: &ContainerState, document: &JsonValue, key: &PartitionKey) -> bool {
        state
            .properties
            .partition_key_path()
            .and_then(|path| document.pointer(path))
            .is_some_and(|value| key.matches(value))
    }
}

/// Accepts `SELECT * FROM <alias>` and nothing else.
fn parse_select_all(query: &str) -> Result<(), StoreError> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let is_alias = |t: &str| {
        !t.is_empty()
            && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !t.starts_with(|c: char| c.is_ascii_digit())
    };

    match tokens.as_slice() {
        [select, "*", from, alias]
            if select.eq_ignore_ascii_case("select")
                && from.eq_ignore_ascii_case("from")
                && is_alias(*alias) =>
        {
            Ok(())
        }
        _ => Err(StoreError::BadRequest(format!(
            "unsupported query for in-memory store: '{query}'"
        ))),
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_database_if_not_exists(
        &self,
        id: &str,
    ) -> Result<StoreResponse<DatabaseProperties>, StoreError> {
        let started = Instant::now();
        if id.trim().is_empty() {
            return Err(StoreError::BadRequest("database id must not be empty".to_string()));
        }

        let mut dbs = self.databases.write().map_err(|_| Self::poisoned())?;
        let created = !dbs.contains_key(id);
        let db = dbs.entry(id.to_string()).or_insert_with(|| DatabaseState {
            properties: DatabaseProperties { id: id.to_string() },
            containers: HashMap::new(),
        });

        Ok(StoreResponse {
            resource: db.properties.clone(),
            request_charge: if created {
                CHARGE_METADATA_CREATE
            } else {
                CHARGE_METADATA_READ
            },
            duration: started.elapsed(),
            created,
        })
    }

    async fn create_container_if_not_exists(
        &self,
        database: &DatabaseHandle,
        properties: &ContainerProperties,
        throughput: Throughput,
    ) -> Result<StoreResponse<ContainerProperties>, StoreError> {
        let started = Instant::now();
        match properties.partition_key_path() {
            Some(path) if path.starts_with('/') && path.len() > 1 => {}
            other => {
                return Err(StoreError::BadRequest(format!(
                    "invalid partition key path: {other:?}"
                )));
            }
        }

        let mut dbs = self.databases.write().map_err(|_| Self::poisoned())?;
        let db = dbs
            .get_mut(database.id())
            .ok_or_else(|| StoreError::NotFound(format!("database '{}'", database.id())))?;

        let created = !db.containers.contains_key(&properties.id);
        let container = db
            .containers
            .entry(properties.id.clone())
            .or_insert_with(|| ContainerState {
                properties: properties.clone(),
                throughput,
                documents: Vec::new(),
            });

        Ok(StoreResponse {
            resource: container.properties.clone(),
            request_charge: if created {
                CHARGE_METADATA_CREATE
            } else {
                CHARGE_METADATA_READ
            },
            duration: started.elapsed(),
            created,
        })
    }

    async fn create_item(
        &self,
        container: &ContainerHandle,
        partition_key: &PartitionKey,
        item: JsonValue,
    ) -> Result<StoreResponse<JsonValue>, StoreError> {
        let started = Instant::now();
        let id = Self::document_id(&item)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::BadRequest("document requires a string 'id'".to_string()))?
            .to_string();

        let mut dbs = self.databases.write().map_err(|_| Self::poisoned())?;
        let state = Self::container_mut(&mut dbs, container)?;

        if !Self::in_partition(state, &item, partition_key) {
            return Err(StoreError::BadRequest(format!(
                "partition key '{partition_key}' does not match the document"
            )));
        }

        let duplicate = state.documents.iter().any(|doc| {
            Self::document_id(doc) == Some(id.as_str())
                && Self::in_partition(state, doc, partition_key)
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "item '{id}' already exists in partition '{partition_key}'"
            )));
        }

        state.documents.push(item.clone());

        Ok(StoreResponse {
            resource: item,
            request_charge: CHARGE_ITEM_WRITE,
            duration: started.elapsed(),
            created: true,
        })
    }

    async fn read_item(
        &self,
        container: &ContainerHandle,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<StoreResponse<JsonValue>, StoreError> {
        let started = Instant::now();
        let dbs = self.databases.read().map_err(|_| Self::poisoned())?;
        let state = Self::container_ref(&dbs, container)?;

        let document = state
            .documents
            .iter()
            .find(|doc| {
                Self::document_id(doc) == Some(id) && Self::in_partition(state, doc, partition_key)
            })
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!("item '{id}' in partition '{partition_key}'"))
            })?;

        Ok(StoreResponse {
            resource: document,
            request_charge: CHARGE_POINT_READ,
            duration: started.elapsed(),
            created: false,
        })
    }

    async fn query_page(
        &self,
        container: &ContainerHandle,
        query: &str,
        options: &QueryOptions,
        continuation: Option<&str>,
    ) -> Result<FeedPage<JsonValue>, StoreError> {
        let started = Instant::now();
        parse_select_all(query)?;
        if options.max_item_count == 0 {
            return Err(StoreError::BadRequest("max item count must be positive".to_string()));
        }

        let offset = match continuation {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::BadRequest(format!("invalid continuation '{token}'")))?,
        };

        let dbs = self.databases.read().map_err(|_| Self::poisoned())?;
        let state = Self::container_ref(&dbs, container)?;

        let matching: Vec<&JsonValue> = state
            .documents
            .iter()
            .filter(|doc| match &options.partition_key {
                Some(key) => Self::in_partition(state, doc, key),
                None => true,
            })
            .collect();

        let page_size = options.max_item_count as usize;
        let items: Vec<JsonValue> = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|doc| (*doc).clone())
            .collect();

        let next = offset + items.len();
        let continuation = (next < matching.len()).then(|| next.to_string());
        let query_metrics = options.populate_query_metrics.then(|| {
            format!(
                "retrievedDocumentCount={};outputDocumentCount={}",
                matching.len(),
                items.len()
            )
        });

        Ok(FeedPage {
            request_charge: CHARGE_QUERY_BASE + CHARGE_QUERY_PER_ITEM * items.len() as f64,
            items,
            duration: started.elapsed(),
            continuation,
            query_metrics,
        })
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
