//! Error types for the feedlot crate.

use thiserror::Error;

/// Failures surfaced by registry, factory, strategy lookup and persistence.
///
/// Plain not-found lookups are not errors; those return `Option`/`bool`.
#[derive(Debug, Error)]
pub enum FeedlotError {
    #[error("pen #{pen} is full (capacity {capacity})")]
    PenFull { pen: u32, capacity: usize },

    #[error("animal #{0} is already registered")]
    DuplicateAnimal(u32),

    #[error("unknown animal category '{0}' (expected young, growing or adult)")]
    UnknownCategory(String),

    #[error("unknown feeding strategy '{0}' (expected normal, intensive or maintenance)")]
    UnknownStrategy(String),

    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshotVersion(u8),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for FeedlotError {
    fn from(err: std::io::Error) -> Self {
        FeedlotError::Persistence(err.to_string())
    }
}

impl From<bincode::Error> for FeedlotError {
    fn from(err: bincode::Error) -> Self {
        FeedlotError::Persistence(err.to_string())
    }
}
