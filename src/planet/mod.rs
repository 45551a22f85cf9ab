//! Chunked planet geometry
//!
//! - [`PlanetGeometry`] - owns the hierarchy, buffers and both allocators
//! - [`ChunkUpdateAction`] - per-triangle decision fed to a LOD pass
//! - [`GeometryBuffer`] / [`DirtyRanges`] - flat GPU data and what changed
//! - [`SharedVertexPool`] / [`ChunkSlotAllocator`] - slot bookkeeping

pub mod buffer;
pub mod chunks;
pub mod config;
pub mod debug;
pub mod dirty;
pub mod geometry;
pub mod grid;
pub mod iter;
pub mod lod;
pub mod shared;

pub use buffer::{GeometryBuffer, PlanetVertex, VERTEX_STRIDE};
pub use chunks::{ChunkSlotAllocator, Relocation};
pub use config::PlanetConfig;
pub use dirty::{DirtyRanges, UpdateRange};
pub use geometry::{PlanetGeometry, SubTriangleChunk};
pub use grid::{ChunkLayout, EdgePos};
pub use iter::{ChunkIter, IndexedVertex};
pub use lod::{ChunkUpdateAction, PassSummary};
pub use shared::{SharedVertexPool, MAX_SHARED_USERS};
