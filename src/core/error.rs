//! Error types for planet geometry

use std::fmt;

use thiserror::Error;

use super::types::ChunkIndex;

/// Fixed-capacity resource that can run out during a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Chunk slots in the vertex/index buffers
    ChunkSlots,
    /// Shared border vertex slots
    SharedVertices,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::ChunkSlots => write!(f, "chunk slots"),
            Resource::SharedVertices => write!(f, "shared vertices"),
        }
    }
}

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// A fixed-size pool is exhausted; the caller must reconfigure or
    /// request less detail.
    #[error("capacity exceeded: {resource} (limit {limit})")]
    CapacityExceeded { resource: Resource, limit: u32 },

    /// Internal chunk/subdivision bookkeeping is inconsistent
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A hierarchy notification or lookup referenced state unknown locally
    #[error("hierarchy desync: {0}")]
    HierarchyDesync(String),

    /// The triangle hierarchy refused an operation
    #[error("hierarchy error: {0}")]
    Hierarchy(String),

    #[error("unknown chunk: {0}")]
    UnknownChunk(ChunkIndex),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors the caller can recover from by changing capacity
    pub fn is_capacity(&self) -> bool {
        matches!(self, Error::CapacityExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_display() {
        let err = Error::CapacityExceeded {
            resource: Resource::ChunkSlots,
            limit: 4,
        };
        assert_eq!(err.to_string(), "capacity exceeded: chunk slots (limit 4)");
        assert!(err.is_capacity());
        assert!(!Error::UnknownChunk(3).is_capacity());
    }
}
