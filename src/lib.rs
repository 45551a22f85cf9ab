//! Planeta - chunked level-of-detail geometry for icosphere planets

pub mod core;
pub mod icosphere;
pub mod planet;

pub use crate::core::{Error, Result};
pub use icosphere::{IcoSphereTree, TriangleHierarchy};
pub use planet::{ChunkUpdateAction, PassSummary, PlanetConfig, PlanetGeometry};
