//! Identity of stored records.

/// A record addressed by a typed identifier that also serves as its document `id`.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + AsRef<str>;

    fn id(&self) -> &Self::Id;

    /// The identifier as written to the document's `id` property.
    fn id_str(&self) -> &str {
        self.id().as_ref()
    }
}
