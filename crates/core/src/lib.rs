//! `cosmosdemo-core` — the employee record model and the sample record factory.
//!
//! This crate is **pure domain** (no IO). Talking to the document store lives in
//! `cosmosdemo-infra`.

pub mod employee;
pub mod employees;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use employee::{Employee, PartitionKey};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::EmployeeId;
pub use value_object::ValueObject;
