//! Core type aliases and re-exports

pub use glam::{Quat, Vec3};

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Index of a triangle in the hierarchy (parallel-array handle)
pub type TriIndex = u32;

/// Index of a chunk slot in the geometry buffers
pub type ChunkIndex = u32;

/// Vertex index local to one chunk's triangular grid
pub type LocalIndex = u32;

/// Index of a shared (chunk border) vertex slot
pub type SharedIndex = u32;

/// Index of a vertex owned by the triangle hierarchy
pub type VrtxIndex = u32;

/// Element position in the flat vertex or index buffer
pub type BufferIndex = u32;

/// Sentinel for "no triangle"
pub const INVALID_TRI: TriIndex = u32::MAX;

/// Sentinel for "not chunked"
pub const INVALID_CHUNK: ChunkIndex = u32::MAX;

/// Sentinel for "no shared vertex"
pub const INVALID_SHARED: SharedIndex = u32::MAX;

/// Sentinel for "no hierarchy vertex"
pub const INVALID_VRTX: VrtxIndex = u32::MAX;

/// Sentinel for "no buffer position"
pub const INVALID_BUFFER: BufferIndex = u32::MAX;
