//! Document store boundary.
//!
//! The store is an external collaborator: this module only defines the
//! operations the demo consumes and two adapters for them, an in-memory
//! emulator (tests/dev) and a hosted account reached through its SDK.

pub mod cosmos;
pub mod in_memory;
pub mod r#trait;

pub use cosmos::CosmosDocumentStore;
pub use in_memory::InMemoryDocumentStore;
pub use r#trait::{
    ContainerHandle, ContainerProperties, DatabaseHandle, DatabaseProperties, DocumentStore,
    FeedPage, PartitionKeyDefinition, QueryOptions, StoreError, StoreResponse, Throughput,
};
