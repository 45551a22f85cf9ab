//! Per-chunk vertex iteration for collision mesh building

use std::iter::FusedIterator;
use std::slice;

use super::buffer::PlanetVertex;
use super::geometry::PlanetGeometry;
use crate::core::{ChunkIndex, Error, Result, Vec3};
use crate::icosphere::TriangleHierarchy;

/// One index buffer entry of a chunk and the vertex it names
#[derive(Clone, Copy, Debug)]
pub struct IndexedVertex<'a> {
    pub index: u32,
    pub vertex: &'a PlanetVertex,
}

impl IndexedVertex<'_> {
    pub fn position(&self) -> Vec3 {
        self.vertex.position()
    }

    pub fn normal(&self) -> Vec3 {
        self.vertex.normal()
    }
}

/// Walks a chunk's index block; every three items form a triangle
#[derive(Clone, Debug)]
pub struct ChunkIter<'a> {
    indices: slice::Iter<'a, u32>,
    vertices: &'a [PlanetVertex],
}

impl<'a> ChunkIter<'a> {
    fn item(&self, index: u32) -> IndexedVertex<'a> {
        IndexedVertex {
            index,
            vertex: &self.vertices[index as usize],
        }
    }

    /// Regroup the remaining entries into triangles of positions
    pub fn triangles(self) -> impl Iterator<Item = [Vec3; 3]> + 'a {
        let vertices = self.vertices;
        self.indices.as_slice().chunks_exact(3).map(move |t| {
            [
                vertices[t[0] as usize].position(),
                vertices[t[1] as usize].position(),
                vertices[t[2] as usize].position(),
            ]
        })
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = IndexedVertex<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let &index = self.indices.next()?;
        Some(self.item(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl DoubleEndedIterator for ChunkIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let &index = self.indices.next_back()?;
        Some(self.item(index))
    }
}

impl ExactSizeIterator for ChunkIter<'_> {}

impl FusedIterator for ChunkIter<'_> {}

impl<H: TriangleHierarchy> PlanetGeometry<H> {
    /// Iterate the index range of live chunk `c`
    pub fn iterate_chunk(&self, c: ChunkIndex) -> Result<ChunkIter<'_>> {
        if !self.chunks.is_live(c) {
            return Err(Error::UnknownChunk(c));
        }
        let start = self.index_base(c) as usize;
        let end = start + self.layout.indices as usize;
        Ok(ChunkIter {
            indices: self.index_buffer()[start..end].iter(),
            vertices: self.vertex_buffer(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planet::geometry::tests::small_planet;

    #[test]
    fn test_iterate_chunk_matches_index_block() {
        let mut planet = small_planet();
        let c = planet.chunk_add(9).unwrap();

        let iter = planet.iterate_chunk(c).unwrap();
        assert_eq!(iter.len(), 48);
        let indices: Vec<u32> = iter.map(|v| v.index).collect();
        assert_eq!(indices, &planet.index_buffer()[0..48]);

        let last = planet.iterate_chunk(c).unwrap().next_back().unwrap();
        assert_eq!(last.index, planet.index_buffer()[47]);
        assert!((last.position().length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_triangles_cover_chunk() {
        let mut planet = small_planet();
        let c = planet.chunk_add(2).unwrap();
        let center = planet.hierarchy().triangle(2).unwrap().center;

        let triangles: Vec<[Vec3; 3]> = planet.iterate_chunk(c).unwrap().triangles().collect();
        assert_eq!(triangles.len(), 16);
        for [a, b, c] in triangles {
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(center) > 0.0);
        }
    }

    #[test]
    fn test_unknown_chunk() {
        let mut planet = small_planet();
        assert!(matches!(planet.iterate_chunk(0), Err(Error::UnknownChunk(0))));
        planet.chunk_add(0).unwrap();
        planet.chunk_remove(0).unwrap();
        assert!(matches!(planet.iterate_chunk(0), Err(Error::UnknownChunk(0))));
    }
}
