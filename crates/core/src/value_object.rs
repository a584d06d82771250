//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two values with the same attributes are the
/// same value. A [`PartitionKey`](crate::PartitionKey) is a value object, an
/// [`Employee`](crate::Employee) is an entity.
///
/// ```ignore
/// let a = PartitionKey::new("Smith");
/// let b = PartitionKey::new("Smith");
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
