//! Record identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an employee document.
///
/// Generated ids have the shape `<surname>-<millis since epoch>`. Two records with
/// the same surname created within the same millisecond get the same id; nothing
/// here guards against that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    /// Build the id for a record created at `millis` (milliseconds since the Unix epoch).
    pub fn generate(surname: &str, millis: i64) -> Self {
        Self(format!("{surname}-{millis}"))
    }

    /// Wrap an existing id (e.g. one read back from the store).
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_id("EmployeeId: empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits a generated id back into `(surname, millis)`.
    ///
    /// Returns `None` for ids that were not produced by [`EmployeeId::generate`].
    pub fn timestamp_suffix(&self) -> Option<(&str, i64)> {
        let (surname, millis) = self.0.rsplit_once('-')?;
        if surname.is_empty() || millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((surname, millis.parse().ok()?))
    }
}

impl core::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EmployeeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for EmployeeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_joins_surname_and_millis() {
        let id = EmployeeId::generate("Smith", 1_700_000_000_123);
        assert_eq!(id.as_str(), "Smith-1700000000123");
        assert_eq!(id.timestamp_suffix(), Some(("Smith", 1_700_000_000_123)));
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!(EmployeeId::parse(""), Err(DomainError::InvalidId(_))));
        assert!(matches!("   ".parse::<EmployeeId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn foreign_ids_have_no_timestamp_suffix() {
        let id = EmployeeId::parse("family-abc").unwrap();
        assert_eq!(id.timestamp_suffix(), None);
        let id = EmployeeId::parse("nodash").unwrap();
        assert_eq!(id.timestamp_suffix(), None);
    }

    #[test]
    fn same_surname_same_millisecond_collides() {
        // Uniqueness only comes from the clock.
        assert_eq!(
            EmployeeId::generate("Smith", 42),
            EmployeeId::generate("Smith", 42)
        );
    }
}
