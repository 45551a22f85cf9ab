//! Triangle hierarchy service
//!
//! A tree of spherical triangles where every triangle is either a leaf or
//! subdivided into exactly four children. The geometry engine consumes the
//! hierarchy only through [`TriangleHierarchy`] and the [`HierarchyEvent`]
//! notifications it publishes.
//!
//! Conventions shared with the chunk grid:
//! - Corner 0 is the top, corner 1 bottom-left, corner 2 bottom-right, wound
//!   counter-clockwise when seen from outside the sphere.
//! - Side `s` is opposite corner `s` and runs from corner `s + 1` to corner
//!   `s + 2` (side 0 bottom, side 1 right, side 2 left).
//! - Children: 0 top, 1 left, 2 right, 3 centre (upside down).

pub mod icosahedron;
pub mod tree;

use std::sync::mpsc::Receiver;

use crate::core::{Result, TriIndex, Vec3, VrtxIndex, INVALID_TRI, INVALID_VRTX};

pub use tree::IcoSphereTree;

/// Number of children of a subdivided triangle
pub const CHILD_COUNT: u32 = 4;

/// Children lying along each side of their parent, in the side's direction.
///
/// `EDGE_CHILDREN[s][h]` is the sibling index covering half `h` of side `s`.
/// Exterior children keep the parent's side numbering.
pub const EDGE_CHILDREN: [[u8; 2]; 3] = [[1, 2], [2, 0], [0, 1]];

/// Which half of the parent's side `side` a child covers, if any
pub fn edge_half(sibling: u8, side: u8) -> Option<u8> {
    EDGE_CHILDREN[side as usize]
        .iter()
        .position(|&c| c == sibling)
        .map(|h| h as u8)
}

/// One triangle of the hierarchy
#[derive(Clone, Debug)]
pub struct SubTriangle {
    /// Parent triangle, or `INVALID_TRI` for a root face
    pub parent: TriIndex,
    /// Position among the parent's children (0..4)
    pub sibling: u8,
    /// Depth in the tree, roots are 0
    pub depth: u8,
    /// Hierarchy vertices at the three corners
    pub corners: [VrtxIndex; 3],
    /// Same-depth neighbour across each side, or `INVALID_TRI`
    pub neighbours: [TriIndex; 3],
    /// Midpoint vertex of each side, valid while subdivided
    pub midpoints: [VrtxIndex; 3],
    /// Index of the first of four contiguous children, valid while subdivided
    pub children: TriIndex,
    pub subdivided: bool,
    /// Unit direction through the triangle's centroid
    pub center: Vec3,
}

impl SubTriangle {
    /// Create an unlinked leaf
    pub fn new(parent: TriIndex, sibling: u8, depth: u8, corners: [VrtxIndex; 3], center: Vec3) -> Self {
        Self {
            parent,
            sibling,
            depth,
            corners,
            neighbours: [INVALID_TRI; 3],
            midpoints: [INVALID_VRTX; 3],
            children: INVALID_TRI,
            subdivided: false,
            center,
        }
    }

    /// Index of child `i` (only meaningful while subdivided)
    pub fn child(&self, i: u8) -> TriIndex {
        self.children + i as TriIndex
    }

    /// Side of this triangle that faces `other`, if they are linked
    pub fn side_facing(&self, other: TriIndex) -> Option<u8> {
        self.neighbours
            .iter()
            .position(|&n| n == other)
            .map(|s| s as u8)
    }
}

/// Structural change notification published by a hierarchy
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HierarchyEvent {
    TrianglesAdded(Vec<TriIndex>),
    TrianglesRemoved(Vec<TriIndex>),
    VerticesRemoved(Vec<VrtxIndex>),
}

/// Contract the geometry engine needs from a triangle hierarchy
pub trait TriangleHierarchy {
    /// Number of root faces; roots occupy indices `0..root_count()`
    fn root_count(&self) -> u32;

    /// Size of the triangle index space (live or free slots)
    fn triangle_capacity(&self) -> u32;

    /// Size of the vertex index space (live or free slots)
    fn vertex_capacity(&self) -> u32;

    /// A live triangle, or None for free/unknown indices
    fn triangle(&self, t: TriIndex) -> Option<&SubTriangle>;

    /// Unit-sphere position of a live hierarchy vertex
    fn vertex_position(&self, v: VrtxIndex) -> Option<Vec3>;

    /// Subdivide a leaf into four children
    fn subdivide_add(&mut self, t: TriIndex) -> Result<()>;

    /// Collapse a subdivided triangle back into a leaf, removing its subtree
    fn subdivide_remove(&mut self, t: TriIndex) -> Result<()>;

    /// Register for structural notifications
    fn subscribe(&mut self) -> Receiver<HierarchyEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_half() {
        assert_eq!(edge_half(1, 0), Some(0));
        assert_eq!(edge_half(2, 0), Some(1));
        assert_eq!(edge_half(2, 1), Some(0));
        assert_eq!(edge_half(0, 1), Some(1));
        assert_eq!(edge_half(0, 2), Some(0));
        assert_eq!(edge_half(1, 2), Some(1));
        // Centre child never touches the parent's border
        for side in 0..3 {
            assert_eq!(edge_half(3, side), None);
        }
    }

    #[test]
    fn test_side_facing() {
        let mut tri = SubTriangle::new(INVALID_TRI, 0, 0, [0, 1, 2], Vec3::Z);
        tri.neighbours = [7, 8, 9];
        assert_eq!(tri.side_facing(8), Some(1));
        assert_eq!(tri.side_facing(3), None);
    }
}
