//! Planet geometry configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::grid::MAX_CHUNK_SUBDIVISIONS;
use crate::core::{Error, Result};

/// Fixed sizes and capacities of a planet's geometry buffers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    /// Sphere radius in world units
    pub radius: f32,
    /// Subdivisions inside one chunk (1..=8)
    pub chunk_subdivisions: u32,
    /// Chunk slots in the vertex/index buffers
    pub max_chunks: u32,
    /// Shared border vertex slots
    pub max_shared_vertices: u32,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: 1000.0,
            chunk_subdivisions: 4,
            max_chunks: 2000,
            max_shared_vertices: 120_000,
        }
    }
}

impl PlanetConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(Error::Config(format!("radius must be positive, got {}", self.radius)));
        }
        if self.chunk_subdivisions == 0 || self.chunk_subdivisions > MAX_CHUNK_SUBDIVISIONS {
            return Err(Error::Config(format!(
                "chunk_subdivisions must be in 1..={}, got {}",
                MAX_CHUNK_SUBDIVISIONS, self.chunk_subdivisions
            )));
        }
        if self.max_chunks == 0 {
            return Err(Error::Config("max_chunks must be non-zero".into()));
        }
        if self.max_shared_vertices == 0 {
            return Err(Error::Config("max_shared_vertices must be non-zero".into()));
        }
        Ok(())
    }
}
