//! Flat vertex and index buffers with dirty-range tracking
//!
//! Layout of the vertex buffer:
//!
//! ```text
//! [ shared border vertices | chunk 0 interior | chunk 1 interior | ... ]
//! ```
//!
//! The index buffer holds one fixed block of `indices_per_chunk` entries per
//! chunk slot. Both are preallocated at construction and never regrow.

use bytemuck::{Pod, Zeroable};

use super::dirty::{DirtyRanges, UpdateRange};
use crate::core::{BufferIndex, Vec3};

/// GPU vertex record (24 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PlanetVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Size of one vertex record in bytes
pub const VERTEX_STRIDE: usize = std::mem::size_of::<PlanetVertex>();

impl PlanetVertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// Vertex and index storage plus the ranges touched since the last sync
#[derive(Debug)]
pub struct GeometryBuffer {
    vertices: Vec<PlanetVertex>,
    indices: Vec<u32>,
    vertex_dirty: DirtyRanges,
    index_dirty: DirtyRanges,
}

impl GeometryBuffer {
    /// Allocate zeroed buffers
    pub fn new(vertex_count: u32, index_count: u32) -> Self {
        Self {
            vertices: vec![PlanetVertex::zeroed(); vertex_count as usize],
            indices: vec![0; index_count as usize],
            vertex_dirty: DirtyRanges::new(),
            index_dirty: DirtyRanges::new(),
        }
    }

    pub fn vertices(&self) -> &[PlanetVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex(&self, i: BufferIndex) -> Option<&PlanetVertex> {
        self.vertices.get(i as usize)
    }

    pub fn write_vertex(&mut self, i: BufferIndex, vertex: PlanetVertex) {
        self.vertices[i as usize] = vertex;
        self.vertex_dirty.insert_one(i);
    }

    /// Write a run of vertices starting at `start`
    pub fn write_vertices(&mut self, start: BufferIndex, vertices: &[PlanetVertex]) {
        let s = start as usize;
        self.vertices[s..s + vertices.len()].copy_from_slice(vertices);
        self.vertex_dirty.insert(start, start + vertices.len() as u32);
    }

    /// Write a run of indices starting at `start`
    pub fn write_indices(&mut self, start: BufferIndex, indices: &[u32]) {
        let s = start as usize;
        self.indices[s..s + indices.len()].copy_from_slice(indices);
        self.index_dirty.insert(start, start + indices.len() as u32);
    }

    /// Zero `[start, start + count)` of the index buffer (degenerate triangles)
    pub fn zero_indices(&mut self, start: BufferIndex, count: u32) {
        let s = start as usize;
        self.indices[s..s + count as usize].fill(0);
        self.index_dirty.insert(start, start + count);
    }

    /// Copy a vertex block within the buffer
    pub fn copy_vertices(&mut self, from: BufferIndex, to: BufferIndex, count: u32) {
        let f = from as usize;
        self.vertices.copy_within(f..f + count as usize, to as usize);
        self.vertex_dirty.insert(to, to + count);
    }

    /// Copy an index block, shifting entries that point into `[old_base, old_base + span)`
    /// so they point into the block at `new_base` instead
    pub fn copy_indices_rebased(
        &mut self,
        from: BufferIndex,
        to: BufferIndex,
        count: u32,
        old_base: BufferIndex,
        new_base: BufferIndex,
        span: u32,
    ) {
        for i in 0..count {
            let v = self.indices[(from + i) as usize];
            self.indices[(to + i) as usize] = if v >= old_base && v < old_base + span {
                v - old_base + new_base
            } else {
                v
            };
        }
        self.index_dirty.insert(to, to + count);
    }

    /// Apply `f` to one vertex and mark it dirty
    pub fn modify_vertex(&mut self, i: BufferIndex, f: impl FnOnce(&mut PlanetVertex)) {
        f(&mut self.vertices[i as usize]);
        self.vertex_dirty.insert_one(i);
    }

    pub fn vertex_changes(&self) -> &[UpdateRange] {
        self.vertex_dirty.ranges()
    }

    pub fn index_changes(&self) -> &[UpdateRange] {
        self.index_dirty.ranges()
    }

    pub fn clear_changes(&mut self) {
        self.vertex_dirty.clear();
        self.index_dirty.clear();
    }

    pub fn has_changes(&self) -> bool {
        !self.vertex_dirty.is_empty() || !self.index_dirty.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(VERTEX_STRIDE, 24);
        let v = PlanetVertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Y);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), VERTEX_STRIDE);
        assert_eq!(v.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.normal(), Vec3::Y);
    }

    #[test]
    fn test_writes_mark_dirty() {
        let mut buffer = GeometryBuffer::new(16, 32);
        assert!(!buffer.has_changes());

        buffer.write_vertex(3, PlanetVertex::new(Vec3::X, Vec3::X));
        buffer.write_vertices(4, &[PlanetVertex::zeroed(); 2]);
        buffer.write_indices(10, &[1, 2, 3]);
        assert_eq!(buffer.vertex_changes(), &[UpdateRange::new(3, 6)]);
        assert_eq!(buffer.index_changes(), &[UpdateRange::new(10, 13)]);
        assert_eq!(&buffer.indices()[10..13], &[1, 2, 3]);

        buffer.clear_changes();
        assert!(!buffer.has_changes());
    }

    #[test]
    fn test_copy_indices_rebased() {
        let mut buffer = GeometryBuffer::new(0, 12);
        // Shared refs below 100, interior block at 100..104
        buffer.write_indices(6, &[5, 100, 103, 7, 102, 104]);
        buffer.clear_changes();

        buffer.copy_indices_rebased(6, 0, 6, 100, 50, 4);
        assert_eq!(&buffer.indices()[0..6], &[5, 50, 53, 7, 52, 104]);
        assert_eq!(buffer.index_changes(), &[UpdateRange::new(0, 6)]);

        buffer.zero_indices(6, 6);
        assert!(buffer.indices()[6..].iter().all(|&i| i == 0));
        assert_eq!(buffer.index_changes(), &[UpdateRange::new(0, 12)]);
    }

    #[test]
    fn test_copy_vertices() {
        let mut buffer = GeometryBuffer::new(8, 0);
        buffer.write_vertices(5, &[PlanetVertex::new(Vec3::Z, Vec3::Z); 2]);
        buffer.clear_changes();

        buffer.copy_vertices(5, 1, 2);
        assert_eq!(buffer.vertices()[1].position(), Vec3::Z);
        assert_eq!(buffer.vertices()[2].position(), Vec3::Z);
        assert_eq!(buffer.vertex_changes(), &[UpdateRange::new(1, 3)]);
    }
}
