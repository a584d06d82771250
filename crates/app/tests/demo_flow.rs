use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;

use cosmosdemo_app::demo::{CONTAINER_NAME, DATABASE_NAME, THROUGHPUT_RU};
use cosmosdemo_app::{Demo, RunReport, Stage};
use cosmosdemo_core::employees::SAMPLE_SURNAMES;
use cosmosdemo_core::{Employee, EmployeeId, PartitionKey};
use cosmosdemo_infra::config::{
    ENV_CREATE_ITEMS, ENV_QUERY_PAGE_SIZE, ENV_READ_ITEMS, ENV_STORE_BACKEND,
};
use cosmosdemo_infra::{
    BackendConnector, ClientOptions, Connector, ContainerHandle, ContainerProperties,
    DatabaseHandle, DatabaseProperties, DocumentClient, DocumentStore, FeedPage,
    InMemoryDocumentStore, QueryOptions, Settings, StoreError, StoreResponse, Throughput,
};

fn settings(pairs: &[(&str, &str)]) -> Settings {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert(ENV_STORE_BACKEND.to_string(), "memory".to_string());
    for (k, v) in pairs {
        env.insert(k.to_string(), v.to_string());
    }
    Settings::from_lookup(|name| env.get(name).cloned()).unwrap()
}

async fn run_against(store: &Arc<InMemoryDocumentStore>, pairs: &[(&str, &str)]) -> RunReport {
    Demo::new(settings(pairs), BackendConnector::in_memory(store.clone()))
        .run()
        .await
}

fn employee_container() -> ContainerHandle {
    ContainerHandle::new(&DatabaseHandle::new(DATABASE_NAME), CONTAINER_NAME)
}

#[tokio::test]
async fn default_run_provisions_schema_and_queries_an_empty_container() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let report = run_against(&store, &[]).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.exit_status(), 0);
    assert_eq!(report.stage, Stage::Closed);
    assert_eq!(report.completed, Stage::Queried);
    assert!(report.released);
    assert_eq!(store.close_count(), 1);

    assert_eq!(report.database_created, Some(true));
    assert_eq!(report.container_created, Some(true));
    assert!(store.database_exists(DATABASE_NAME));
    let (properties, throughput) = store.container_info(DATABASE_NAME, CONTAINER_NAME).unwrap();
    assert_eq!(properties.partition_key_path(), Some("/lastName"));
    assert_eq!(throughput, Throughput::Manual(THROUGHPUT_RU));

    assert_eq!(report.generated_ids.len(), 4);
    for (id, surname) in report.generated_ids.iter().zip(SAMPLE_SURNAMES) {
        assert!(id.as_str().starts_with(&format!("{surname}-")), "{id}");
    }

    assert_eq!(report.items_created, 0);
    assert_eq!(report.items_read, 0);
    let query = report.query.unwrap();
    assert_eq!(query.pages, 0);
    assert_eq!(query.items, 0);
    // One empty page was still charged by the store.
    assert_eq!(query.request_charge, 2.28);
    assert_eq!(store.document_count(&employee_container()), 0);
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn default_run_logs_every_generated_id_and_the_query_charge() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = Arc::new(InMemoryDocumentStore::new());
    let report = run_against(&store, &[]).await;

    let output = logs.contents();
    assert_eq!(report.generated_ids.len(), 4);
    let logged = report
        .generated_ids
        .iter()
        .filter(|id| output.contains(id.as_str()))
        .count();
    assert_eq!(logged, 4, "{output}");
    for surname in SAMPLE_SURNAMES {
        assert!(output.contains(&format!("{surname}-")), "{output}");
    }
    assert!(output.contains("request_charge=2.28"), "{output}");
    assert!(output.contains("Closing the client"), "{output}");
}

#[tokio::test]
async fn create_then_query_returns_one_page_of_the_sample() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let report = run_against(&store, &[(ENV_CREATE_ITEMS, "true")]).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.items_created, 4);
    assert_eq!(store.document_count(&employee_container()), 4);

    let query = report.query.unwrap();
    assert_eq!(query.pages, 1);
    assert_eq!(query.items, 4);
    let expected: Vec<String> = report.generated_ids.iter().map(|id| id.to_string()).collect();
    assert_eq!(query.item_ids, expected);
    assert!(query.request_charge > 0.0);
}

#[tokio::test]
async fn point_reads_follow_inserts() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let report = run_against(&store, &[(ENV_CREATE_ITEMS, "1"), (ENV_READ_ITEMS, "1")]).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.items_read, 4);
}

#[tokio::test]
async fn failed_point_reads_do_not_fail_the_run() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let report = run_against(&store, &[(ENV_READ_ITEMS, "true")]).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.items_read, 0);
    assert_eq!(report.completed, Stage::Queried);
    assert!(report.query.is_some());
}

#[tokio::test]
async fn second_run_reuses_database_and_container() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let first = run_against(&store, &[]).await;
    let second = run_against(&store, &[]).await;

    assert_eq!(first.database_created, Some(true));
    assert_eq!(second.database_created, Some(false));
    assert_eq!(second.container_created, Some(false));
    assert_eq!(store.database_count(), 1);
    assert_eq!(store.container_count(DATABASE_NAME), 1);
    assert_eq!(store.close_count(), 2);
}

#[tokio::test]
async fn query_pages_follow_the_configured_page_size() {
    let store = Arc::new(InMemoryDocumentStore::new());
    assert!(run_against(&store, &[]).await.succeeded());

    let client = DocumentClient::new(store.clone(), "memory://local");
    let container = employee_container();
    for i in 0..23 {
        let employee = Employee::new(EmployeeId::generate("Seed", i), "Test", "Seed").unwrap();
        client
            .create_item(&container, &employee.partition_key(), &employee)
            .await
            .unwrap();
    }
    client.close();

    let report = run_against(&store, &[]).await;
    let query = report.query.unwrap();
    assert_eq!(query.pages, 3);
    assert_eq!(query.items, 23);

    let report = run_against(&store, &[(ENV_QUERY_PAGE_SIZE, "5")]).await;
    assert_eq!(report.query.unwrap().pages, 5);
}

struct RefusingConnector;

#[async_trait::async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, _options: &ClientOptions) -> Result<DocumentClient, StoreError> {
        Err(StoreError::Unauthorized("signature mismatch".to_string()))
    }
}

#[tokio::test]
async fn connection_failure_is_reported_and_exits_cleanly() {
    let report = Demo::new(settings(&[]), RefusingConnector).run().await;

    assert!(!report.succeeded());
    let failure = report.failure.as_deref().unwrap();
    assert!(failure.contains("building client"), "{failure}");
    assert!(failure.contains("signature mismatch"), "{failure}");
    assert_eq!(report.completed, Stage::Start);
    assert_eq!(report.stage, Stage::Closed);
    assert!(!report.released);
    assert_eq!(report.exit_status(), 0);
}

/// Delegates to an emulator but rejects every query.
struct QueryUnavailable {
    inner: Arc<InMemoryDocumentStore>,
}

#[async_trait::async_trait]
impl DocumentStore for QueryUnavailable {
    async fn create_database_if_not_exists(
        &self,
        id: &str,
    ) -> Result<StoreResponse<DatabaseProperties>, StoreError> {
        self.inner.create_database_if_not_exists(id).await
    }

    async fn create_container_if_not_exists(
        &self,
        database: &DatabaseHandle,
        properties: &ContainerProperties,
        throughput: Throughput,
    ) -> Result<StoreResponse<ContainerProperties>, StoreError> {
        self.inner
            .create_container_if_not_exists(database, properties, throughput)
            .await
    }

    async fn create_item(
        &self,
        container: &ContainerHandle,
        partition_key: &PartitionKey,
        item: JsonValue,
    ) -> Result<StoreResponse<JsonValue>, StoreError> {
        self.inner.create_item(container, partition_key, item).await
    }

    async fn read_item(
        &self,
        container: &ContainerHandle,
        id: &str,
        partition_key: &PartitionKey,
    ) -> Result<StoreResponse<JsonValue>, StoreError> {
        self.inner.read_item(container, id, partition_key).await
    }

    async fn query_page(
        &self,
        _container: &ContainerHandle,
        _query: &str,
        _options: &QueryOptions,
        _continuation: Option<&str>,
    ) -> Result<FeedPage<JsonValue>, StoreError> {
        Err(StoreError::Service {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }

    fn close(&self) {
        self.inner.close();
    }
}

struct QueryUnavailableConnector(Arc<InMemoryDocumentStore>);

#[async_trait::async_trait]
impl Connector for QueryUnavailableConnector {
    async fn connect(&self, options: &ClientOptions) -> Result<DocumentClient, StoreError> {
        let store = QueryUnavailable {
            inner: self.0.clone(),
        };
        Ok(DocumentClient::new(Arc::new(store), options.endpoint.clone()))
    }
}

#[tokio::test]
async fn mid_run_failure_still_releases_the_client_once() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let connector = QueryUnavailableConnector(store.clone());
    let report = Demo::new(settings(&[(ENV_CREATE_ITEMS, "true")]), connector)
        .run()
        .await;

    assert!(!report.succeeded());
    assert!(report.failure.as_deref().unwrap().contains("503"));
    assert_eq!(report.completed, Stage::Read);
    assert_eq!(report.items_created, 4);
    assert!(report.query.is_none());
    assert!(report.released);
    assert_eq!(store.close_count(), 1);
    assert_eq!(report.exit_status(), 0);
}
