//! Infrastructure layer: configuration, the document store boundary and its adapters.

pub mod client;
pub mod config;
pub mod feed;
pub mod store;

pub use client::{BackendConnector, ClientOptions, ConsistencyLevel, Connector, DocumentClient};
pub use config::{ConfigError, Settings, StoreBackend};
pub use feed::FeedPager;
pub use store::{
    ContainerHandle, ContainerProperties, CosmosDocumentStore, DatabaseHandle, DatabaseProperties,
    DocumentStore, FeedPage, InMemoryDocumentStore, QueryOptions, StoreError, StoreResponse,
    Throughput,
};
