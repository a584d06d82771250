//! Hosted account adapter over the `azure_data_cosmos` SDK.
//!
//! Authentication, request signing, region routing and paging are the SDK's
//! job; this module only maps its calls and errors onto [`DocumentStore`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use azure_core::error::ErrorKind;
use azure_core::http::headers::{HeaderName, Headers};
use azure_data_cosmos::models::{
    ContainerProperties as SdkContainerProperties, ThroughputProperties,
};
use azure_data_cosmos::{CosmosClient, CreateContainerOptions};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use uuid::Uuid;

use cosmosdemo_core::PartitionKey;

use super::r#trait::{
    ContainerHandle, ContainerProperties, DatabaseHandle, DatabaseProperties, DocumentStore,
    FeedPage, QueryOptions, StoreError, StoreResponse, Throughput,
};
use crate::client::{ClientOptions, ConsistencyLevel};

/// Items and request charge of one SDK page.
type PageStream = BoxStream<'static, Result<(Vec<JsonValue>, f64), StoreError>>;

/// Maps a non-success status returned by the account to a store error.
pub(crate) fn error_for_status(status: u16, message: String) -> StoreError {
    match status {
        400 => StoreError::BadRequest(message),
        401 | 403 => StoreError::Unauthorized(message),
        404 => StoreError::NotFound(message),
        409 => StoreError::Conflict(message),
        429 => StoreError::Throttled {
            retry_after_ms: None,
        },
        _ => StoreError::Service { status, message },
    }
}

fn map_error(err: &azure_core::Error) -> StoreError {
    match err.http_status() {
        Some(status) => error_for_status(u16::from(status), err.to_string()),
        None if matches!(err.kind(), ErrorKind::DataConversion) => {
            StoreError::Serialization(err.to_string())
        }
        None => StoreError::Transport(err.to_string()),
    }
}

fn is_conflict(err: &azure_core::Error) -> bool {
    err.http_status().is_some_and(|status| u16::from(status) == 409)
}

/// Response header carrying the request charge; `azure_data_cosmos` 0.24 does
/// not export it from `constants`.
const REQUEST_CHARGE: HeaderName = HeaderName::from_static("x-ms-request-charge");

fn request_charge(headers: &Headers) -> f64 {
    headers
        .get_optional_str(&REQUEST_CHARGE)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

/// Pull the next SDK page, holding back anything past `limit` items.
///
/// The SDK picks its own page size; the held-back items come out first on the
/// next call, charged at zero.
async fn take_page(
    mut pages: PageStream,
    limit: usize,
) -> Option<(Result<(Vec<JsonValue>, f64), StoreError>, PageStream)> {
    let page = pages.next().await?;
    let (mut items, charge) = match page {
        Ok(page) => page,
        Err(e) => return Some((Err(e), pages)),
    };
    if items.len() <= limit {
        return Some((Ok((items, charge)), pages));
    }
    let rest = items.split_off(limit);
    let pages = stream::once(async move { Ok::<_, StoreError>((rest, 0.0)) })
        .chain(pages)
        .boxed();
    Some((Ok((items, charge)), pages))
}

/// Rejects endpoint/key values the SDK could never authenticate with.
pub(crate) fn validate_options(options: &ClientOptions) -> Result<(), StoreError> {
    let endpoint = options.endpoint.trim();
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(StoreError::Configuration(format!(
            "endpoint '{endpoint}' must be an http(s) URL"
        )));
    }
    if options.key.trim().is_empty() {
        return Err(StoreError::Configuration("account key is empty".to_string()));
    }
    Ok(())
}

/// Document store backed by a hosted account through [`CosmosClient`].
///
/// Query pages are pulled from the SDK's pager one at a time; the pager is
/// parked under an opaque continuation token between calls. Nothing is retried
/// here beyond what the SDK does itself.
pub struct CosmosDocumentStore {
    client: Mutex<Option<CosmosClient>>,
    endpoint: String,
    consistency_level: ConsistencyLevel,
    cursors: Mutex<HashMap<String, PageStream>>,
}

impl CosmosDocumentStore {
    pub fn connect(options: &ClientOptions) -> Result<Self, StoreError> {
        validate_options(options)?;
        let endpoint = options.endpoint.trim();
        let client = CosmosClient::with_key(endpoint, options.key.trim().to_string().into(), None)
            .map_err(|e| StoreError::Configuration(e.to_string()))?;

        info!(
            endpoint,
            consistency = options.consistency_level.as_str(),
            preferred_regions = ?options.preferred_regions,
            "account client built"
        );
        Ok(Self {
            client: Mutex::new(Some(client)),
            endpoint: endpoint.to_string(),
            consistency_level: options.consistency_level,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    fn client(&self) -> Result<CosmosClient, StoreError> {
        self.client
            .lock()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?
            .clone()
            .ok_or(StoreError::Closed)
    }

    fn park(&self, pages: PageStream) -> Result<String, StoreError> {
        let token = Uuid::now_v7().to_string();
        self.cursors
            .lock()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?
            .insert(token.clone(), pages);
        Ok(token)
    }

    fn resume(&self, token: &str) -> Result<PageStream, StoreError> {
        self.cursors
            .lock()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?
            .remove(token)
            .ok_or_else(|| StoreError::BadRequest(format!("unknown continuation '{token}'")))
    }
}

impl core::fmt::Debug for CosmosDocumentStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CosmosDocumentStore")
            .field("endpoint", &self.endpoint)
            .field("consistency_level", &self.consistency_level)
            .finish()
    }
}

#[async_trait::async_trait]
impl DocumentStore for CosmosDocumentStore {
    async fn create_database_if_not_exists(
        &self,
        id: &str,
    ) -> Result<StoreResponse<DatabaseProperties>, StoreError> {
        let client = self.client()?;
        let started = Instant::now();

        let (charge, created) = match client.create_database(id, None).await {
            Ok(response) => (request_charge(response.headers()), true),
            Err(err) if is_conflict(&err) => {
                let response = client
                    .database_client(id)
                    .read(None)
                    .await
                    .map_err(|e| map_error(&e))?;
                (request_charge(response.headers()), false)
            }
            Err(err) => return Err(map_error(&err)),
        };

        Ok(StoreResponse {
            resource: DatabaseProperties { id: id.to_string() },
            request_charge: charge,
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
        let path = properties.partition_key_path().ok_or_else(|| {
            StoreError::BadRequest(format!("container '{}' has no partition key", properties.id))
        })?;
        let database = self.client()?.database_client(database.id());
        let started = Instant::now();

        let sdk_properties = SdkContainerProperties {
            id: properties.id.clone().into(),
            partition_key: path.to_string().into(),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            throughput: Some(ThroughputProperties::manual(throughput.request_units() as usize)),
            ..Default::default()
        };

        let created_container = database.create_container(sdk_properties, Some(options)).await;
        let (charge, created) = match created_container {
            Ok(response) => (request_charge(response.headers()), true),
            Err(err) if is_conflict(&err) => {
                let response = database
                    .container_client(&properties.id)
                    .read(None)
                    .await
                    .map_err(|e| map_error(&e))?;
                (request_charge(response.headers()), false)
            }
            Err(err) => return Err(map_error(&err)),
        };

        Ok(StoreResponse {
            resource: properties.clone(),
            request_charge: charge,
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
        let client = self
            .client()?
            .database_client(container.database_id())
            .container_client(container.id());
        let started = Instant::now();

        let response = client
            .create_item(partition_key.as_str().to_string(), &item, None)
            .await
            .map_err(|e| map_error(&e))?;

        Ok(StoreResponse {
            resource: item,
            request_charge: request_charge(response.headers()),
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
        let client = self
            .client()?
            .database_client(container.database_id())
            .container_client(container.id());
        let started = Instant::now();

        let response = client
            .read_item::<JsonValue>(partition_key.as_str().to_string(), id, None)
            .await
            .map_err(|e| map_error(&e))?;
        let charge = request_charge(response.headers());
        let resource = response.into_body().await.map_err(|e| map_error(&e))?;

        Ok(StoreResponse {
            resource,
            request_charge: charge,
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
        let pages = match continuation {
            Some(token) => self.resume(token)?,
            None => {
                let client = self
                    .client()?
                    .database_client(container.database_id())
                    .container_client(container.id());
                let pager = match &options.partition_key {
                    Some(key) => {
                        client.query_items::<JsonValue>(query, key.as_str().to_string(), None)
                    }
                    None => client.query_items::<JsonValue>(query, (), None),
                }
                .map_err(|e| map_error(&e))?;

                pager
                    .into_pages()
                    .map(|page| {
                        page.map(|page| {
                            let charge = request_charge(page.headers());
                            (page.into_items(), charge)
                        })
                        .map_err(|e| map_error(&e))
                    })
                    .boxed()
            }
        };

        let started = Instant::now();
        let limit = options.max_item_count.max(1) as usize;
        let Some((page, rest)) = take_page(pages, limit).await else {
            debug!(query, "query drained");
            return Ok(FeedPage {
                items: Vec::new(),
                request_charge: 0.0,
                duration: started.elapsed(),
                continuation: None,
                query_metrics: None,
            });
        };
        let (items, request_charge) = page?;

        Ok(FeedPage {
            items,
            request_charge,
            duration: started.elapsed(),
            continuation: Some(self.park(rest)?),
            query_metrics: None,
        })
    }

    fn close(&self) {
        if let Ok(mut cursors) = self.cursors.lock() {
            cursors.clear();
        }
        if let Ok(mut client) = self.client.lock() {
            if client.take().is_some() {
                debug!(endpoint = %self.endpoint, "account client released");
            }
        }
    }
}
