use thiserror::Error;

/// Failure of [`WeakMap::try_insert`](crate::WeakMap::try_insert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InsertError {
    /// An entry with an equal, still-alive key is already present.
    #[error("an entry with an equal live key already exists")]
    DuplicateKey,
}
