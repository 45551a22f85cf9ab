//! LOD update pass
//!
//! A pass walks the hierarchy depth first from the root faces, asks the
//! caller what to do with each triangle and applies it. Chunk allocation is
//! deferred to the end of the pass, after all subdivision has happened.

use super::geometry::{PlanetGeometry, SubTriangleChunk};
use crate::core::{Result, TriIndex};
use crate::icosphere::{SubTriangle, TriangleHierarchy, CHILD_COUNT};

/// What the caller wants for one triangle in this pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChunkUpdateAction {
    /// Keep current state
    #[default]
    Nothing,
    /// Split into four children (dropping this triangle's chunk)
    Subdivide,
    /// Collapse the subtree back into this triangle
    Unsubdivide,
    /// Render this triangle as one chunk, replacing descendant chunks
    Chunk,
    /// Drop this triangle's chunk
    Unchunk,
}

/// What one pass changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub chunks_added: u32,
    pub chunks_removed: u32,
    pub subdivided: u32,
    pub unsubdivided: u32,
    /// Chunks moved to lower slots by packing
    pub relocated: u32,
}

impl PassSummary {
    /// True if the pass touched no chunk or triangle
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl<H: TriangleHierarchy> PlanetGeometry<H> {
    /// Run one LOD pass.
    ///
    /// `classify` sees each visited triangle with its chunk state and index.
    /// Running out of chunk or shared-vertex slots ends the pass with
    /// `CapacityExceeded`; chunks created before the failure stay valid and
    /// freed slots are still packed.
    ///
    /// # Examples
    /// ```
    /// use planeta::icosphere::IcoSphereTree;
    /// use planeta::planet::{ChunkUpdateAction, PlanetConfig, PlanetGeometry};
    ///
    /// let mut planet = PlanetGeometry::new(IcoSphereTree::default(), PlanetConfig::default()).unwrap();
    /// let summary = planet
    ///     .chunk_geometry_update(|_, _, _| ChunkUpdateAction::Chunk)
    ///     .unwrap();
    /// assert_eq!(summary.chunks_added, 20);
    /// assert_eq!(planet.chunk_count(), 20);
    /// ```
    pub fn chunk_geometry_update<F>(&mut self, mut classify: F) -> Result<PassSummary>
    where
        F: FnMut(&SubTriangle, &SubTriangleChunk, TriIndex) -> ChunkUpdateAction,
    {
        self.process_events()?;

        let mut summary = PassSummary::default();
        let mut to_chunk = Vec::new();
        for root in 0..self.hierarchy.root_count() {
            self.update_triangle(root, &mut classify, &mut to_chunk, &mut summary)?;
        }

        let mut failure = None;
        for &t in &to_chunk {
            match self.chunk_add(t) {
                Ok(_) => summary.chunks_added += 1,
                Err(e) => {
                    log::warn!(
                        "Chunking triangle {} failed after {} of {} chunks: {}",
                        t,
                        summary.chunks_added,
                        to_chunk.len(),
                        e
                    );
                    failure = Some(e);
                    break;
                }
            }
        }

        if self.chunks.free_count() > 0 {
            summary.relocated = self.chunk_pack()?;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        if !summary.is_empty() {
            log::debug!("LOD pass: {:?}", summary);
        }
        Ok(summary)
    }

    fn update_triangle<F>(
        &mut self,
        t: TriIndex,
        classify: &mut F,
        to_chunk: &mut Vec<TriIndex>,
        summary: &mut PassSummary,
    ) -> Result<()>
    where
        F: FnMut(&SubTriangle, &SubTriangleChunk, TriIndex) -> ChunkUpdateAction,
    {
        let tri = self.triangle(t)?.clone();
        let record = self.record(t).copied().unwrap_or_default();
        let mut chunked = record.is_chunked();
        let mut subdivided = tri.subdivided;

        match classify(&tri, &record, t) {
            ChunkUpdateAction::Nothing => {}
            ChunkUpdateAction::Chunk => {
                if !chunked {
                    summary.chunks_removed += self.chunk_remove_descendants(t)?;
                    to_chunk.push(t);
                    chunked = true;
                }
            }
            ChunkUpdateAction::Unchunk => {
                if chunked {
                    self.chunk_remove(t)?;
                    summary.chunks_removed += 1;
                    chunked = false;
                }
            }
            ChunkUpdateAction::Subdivide => {
                if chunked {
                    self.chunk_remove(t)?;
                    summary.chunks_removed += 1;
                    chunked = false;
                }
                if !subdivided {
                    match self.hierarchy.subdivide_add(t) {
                        Ok(()) => {
                            self.process_events()?;
                            subdivided = true;
                            summary.subdivided += 1;
                        }
                        Err(e) => log::debug!("Triangle {} stays a leaf: {}", t, e),
                    }
                }
            }
            ChunkUpdateAction::Unsubdivide => {
                if subdivided {
                    summary.chunks_removed += self.chunk_remove_descendants(t)?;
                    match self.hierarchy.subdivide_remove(t) {
                        Ok(()) => {
                            self.process_events()?;
                            subdivided = false;
                            summary.unsubdivided += 1;
                        }
                        Err(e) => log::warn!("Triangle {} could not collapse: {}", t, e),
                    }
                }
            }
        }

        if subdivided && !chunked {
            let base = self.triangle(t)?.children;
            for child in base..base + CHILD_COUNT {
                self.update_triangle(child, classify, to_chunk, summary)?;
            }
        }
        Ok(())
    }
}
