use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::EmployeeId;
use crate::value_object::ValueObject;

/// Path of the document property the store partitions employees by.
pub const PARTITION_KEY_PATH: &str = "/lastName";

/// Partition key value used to route a document inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a document property value equals this key.
    pub fn matches(&self, value: &JsonValue) -> bool {
        value.as_str() == Some(self.0.as_str())
    }
}

impl ValueObject for PartitionKey {}

impl core::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Employee record, stored as `{"id", "firstName", "lastName"}`.
///
/// Records are never mutated after construction. Store system properties
/// (`_rid`, `_etag`, `_ts`, ...) are dropped when reading a document back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    id: EmployeeId,
    first_name: String,
    last_name: String,
}

impl Employee {
    pub fn new(
        id: EmployeeId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> DomainResult<Self> {
        let first_name = first_name.into();
        let last_name = last_name.into();

        if first_name.trim().is_empty() {
            return Err(DomainError::validation("firstName must not be empty"));
        }
        if last_name.trim().is_empty() {
            return Err(DomainError::validation("lastName must not be empty"));
        }

        Ok(Self::from_parts(id, first_name, last_name))
    }

    /// Unchecked construction for names already known to be non-empty.
    pub(crate) fn from_parts(id: EmployeeId, first_name: String, last_name: String) -> Self {
        Self {
            id,
            first_name,
            last_name,
        }
    }

    pub fn id_typed(&self) -> &EmployeeId {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// The partition key is the surname.
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.last_name.clone())
    }

    pub fn to_document(&self) -> DomainResult<JsonValue> {
        serde_json::to_value(self).map_err(|e| DomainError::document(e.to_string()))
    }

    pub fn from_document(document: JsonValue) -> DomainResult<Self> {
        serde_json::from_value(document).map_err(|e| DomainError::document(e.to_string()))
    }
}

impl Entity for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn smith() -> Employee {
        Employee::new(EmployeeId::generate("Smith", 1), "Brad", "Smith").unwrap()
    }

    #[test]
    fn serializes_with_camel_case_properties() {
        let doc = smith().to_document().unwrap();
        assert_eq!(
            doc,
            json!({ "id": "Smith-1", "firstName": "Brad", "lastName": "Smith" })
        );
    }

    #[test]
    fn from_document_ignores_system_properties() {
        let doc = json!({
            "id": "Smith-1",
            "firstName": "Brad",
            "lastName": "Smith",
            "_rid": "abc==",
            "_etag": "\"0000\"",
            "_ts": 1700000000
        });
        assert_eq!(Employee::from_document(doc).unwrap(), smith());
    }

    #[test]
    fn from_document_reports_missing_fields() {
        let err = Employee::from_document(json!({ "id": "x" })).unwrap_err();
        assert!(matches!(err, DomainError::Document(_)));
    }

    #[test]
    fn empty_names_are_rejected() {
        let id = EmployeeId::generate("Smith", 1);
        assert!(matches!(
            Employee::new(id.clone(), "", "Smith"),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            Employee::new(id, "Brad", " "),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn partition_key_is_last_name() {
        let e = smith();
        assert_eq!(e.partition_key(), PartitionKey::new("Smith"));
        assert!(e.partition_key().matches(&json!("Smith")));
        assert!(!e.partition_key().matches(&json!("Brad")));
        assert!(!e.partition_key().matches(&json!(1)));
        assert_eq!(Entity::id(&e).as_str(), "Smith-1");
    }
}
