//! Chunk grid layout and border ring indexing
//!
//! A chunk is a triangular grid of `width` vertices per side. Vertices are
//! numbered two ways:
//!
//! ```text
//! triangular      ringed (width 3)
//! 0               4
//! 1  2            5  3
//! 3  4  5         0  1  2
//! ```
//!
//! x = right, y = down. Ringed numbering lists the border first as a single
//! ring (bottom side, right side, left side), so a `(side, pos)` pair maps to
//! a ring index in O(1) and neighbours can translate positions directly.

use crate::core::{Error, LocalIndex, Result};

/// Largest supported `chunk_subdivisions`
pub const MAX_CHUNK_SUBDIVISIONS: u32 = 8;

/// Sizes derived from the chunk subdivision depth
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    /// Subdivisions per chunk; `width_b == 1 << subdivisions`
    pub subdivisions: u32,
    /// Vertices per side
    pub width: u32,
    /// Segments per side (`width - 1`)
    pub width_b: u32,
    /// Vertices in the whole grid
    pub vertices: u32,
    /// Border vertices (`3 * width_b`), all of them shared
    pub ring: u32,
    /// Vertices owned by the chunk alone
    pub interior: u32,
    /// Triangles in the grid
    pub triangles: u32,
    /// Index buffer entries per chunk (`3 * triangles`)
    pub indices: u32,
    /// Grid triangles as ringed local indices, counter-clockwise
    local_triangles: Vec<[LocalIndex; 3]>,
}

impl ChunkLayout {
    pub fn new(subdivisions: u32) -> Result<Self> {
        if subdivisions == 0 || subdivisions > MAX_CHUNK_SUBDIVISIONS {
            return Err(Error::Config(format!(
                "chunk_subdivisions must be in 1..={}, got {}",
                MAX_CHUNK_SUBDIVISIONS, subdivisions
            )));
        }

        let width_b = 1u32 << subdivisions;
        let width = width_b + 1;
        let vertices = width * (width + 1) / 2;
        let ring = 3 * width_b;
        let triangles = width_b * width_b;

        let mut layout = Self {
            subdivisions,
            width,
            width_b,
            vertices,
            ring,
            interior: vertices - ring,
            triangles,
            indices: triangles * 3,
            local_triangles: Vec::with_capacity(triangles as usize),
        };

        for y in 0..width_b {
            for x in 0..=y {
                layout.local_triangles.push([
                    layout.ringed_index(x, y),
                    layout.ringed_index(x, y + 1),
                    layout.ringed_index(x + 1, y + 1),
                ]);
                if x < y {
                    layout.local_triangles.push([
                        layout.ringed_index(x, y),
                        layout.ringed_index(x + 1, y + 1),
                        layout.ringed_index(x + 1, y),
                    ]);
                }
            }
        }

        Ok(layout)
    }

    /// Triangular number index of grid point (x, y)
    pub fn index(&self, x: u32, y: u32) -> LocalIndex {
        y * (y + 1) / 2 + x
    }

    /// Ringed index of grid point (x, y); border points come first
    pub fn ringed_index(&self, x: u32, y: u32) -> LocalIndex {
        let wb = self.width_b;
        if y == wb {
            // bottom side, left to right
            x
        } else if x == y {
            // right side, bottom to top
            wb + (wb - y)
        } else if x == 0 {
            // left side, top to bottom
            2 * wb + y
        } else {
            self.ring + (y - 2) * (y - 1) / 2 + (x - 1)
        }
    }

    /// Ring index of position `pos` along side `side`
    pub fn ring_index(&self, side: u8, pos: u32) -> LocalIndex {
        (side as u32 * self.width_b + pos) % self.ring
    }

    /// Side and position along it for a ring index
    pub fn ring_side_pos(&self, ring: LocalIndex) -> (u8, u32) {
        ((ring / self.width_b) as u8, ring % self.width_b)
    }

    pub fn is_ring(&self, local: LocalIndex) -> bool {
        local < self.ring
    }

    /// Grid triangles in ringed local indices
    pub fn local_triangles(&self) -> &[[LocalIndex; 3]] {
        &self.local_triangles
    }
}

/// Exact dyadic position along a triangle side, `num / 2^shift` in [0, 1]
///
/// Moving between hierarchy levels halves or doubles the fraction, so every
/// border point a chunk grid can hold stays exactly representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgePos {
    num: u64,
    shift: u32,
}

/// Deepest level difference tracked before giving up on a lookup
const MAX_EDGE_SHIFT: u32 = 60;

impl EdgePos {
    pub const ZERO: EdgePos = EdgePos { num: 0, shift: 0 };
    pub const ONE: EdgePos = EdgePos { num: 1, shift: 0 };

    fn normalized(mut num: u64, mut shift: u32) -> Self {
        while shift > 0 && num % 2 == 0 {
            num /= 2;
            shift -= 1;
        }
        Self { num, shift }
    }

    /// Position `pos` of a side split into `2^subdivisions` segments
    pub fn from_grid(pos: u32, subdivisions: u32) -> Self {
        Self::normalized(pos as u64, subdivisions)
    }

    /// Same point seen from the neighbour across the side
    pub fn flipped(self) -> Self {
        Self::normalized((1u64 << self.shift) - self.num, self.shift)
    }

    /// Same point on the parent's side, for a child covering half `half`
    pub fn to_parent(self, half: u8) -> Option<Self> {
        if self.shift >= MAX_EDGE_SHIFT {
            return None;
        }
        Some(Self::normalized(
            ((half as u64) << self.shift) + self.num,
            self.shift + 1,
        ))
    }

    /// Child halves containing this point, with the point on each child's side.
    ///
    /// The exact midpoint lies on both halves.
    pub fn to_children(self) -> [Option<(u8, EdgePos)>; 2] {
        if self.shift == 0 {
            // 0 or 1: an end of the side
            return if self.num == 0 {
                [Some((0, EdgePos::ZERO)), None]
            } else {
                [Some((1, EdgePos::ONE)), None]
            };
        }
        let half = 1u64 << (self.shift - 1);
        if self.num < half {
            [Some((0, Self::normalized(self.num, self.shift - 1))), None]
        } else if self.num > half {
            [Some((1, Self::normalized(self.num - half, self.shift - 1))), None]
        } else {
            [Some((0, EdgePos::ONE)), Some((1, EdgePos::ZERO))]
        }
    }

    /// Grid position on a side of `2^subdivisions` segments, if exact
    pub fn to_grid(self, subdivisions: u32) -> Option<u32> {
        if self.shift > subdivisions {
            return None;
        }
        Some((self.num << (subdivisions - self.shift)) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        let layout = ChunkLayout::new(2).unwrap();
        assert_eq!(layout.width, 5);
        assert_eq!(layout.width_b, 4);
        assert_eq!(layout.vertices, 15);
        assert_eq!(layout.ring, 12);
        assert_eq!(layout.interior, 3);
        assert_eq!(layout.triangles, 16);
        assert_eq!(layout.indices, 48);
        assert_eq!(layout.local_triangles().len(), 16);

        let layout = ChunkLayout::new(4).unwrap();
        assert_eq!(layout.vertices, 153);
        assert_eq!(layout.ring, 48);
        assert_eq!(layout.interior, 105);
        assert_eq!(layout.triangles, 256);
    }

    #[test]
    fn test_layout_rejects_bad_depth() {
        assert!(ChunkLayout::new(0).is_err());
        assert!(ChunkLayout::new(MAX_CHUNK_SUBDIVISIONS + 1).is_err());
    }

    #[test]
    fn test_triangular_index() {
        let layout = ChunkLayout::new(2).unwrap();
        assert_eq!(layout.index(0, 0), 0);
        assert_eq!(layout.index(0, 1), 1);
        assert_eq!(layout.index(1, 1), 2);
        assert_eq!(layout.index(0, 3), 6);
        assert_eq!(layout.index(3, 3), 9);
    }

    #[test]
    fn test_ringed_index_order() {
        let layout = ChunkLayout::new(2).unwrap();
        // bottom row
        for x in 0..=4 {
            assert_eq!(layout.ringed_index(x, 4), x);
        }
        // right side climbs to the top corner
        assert_eq!(layout.ringed_index(3, 3), 5);
        assert_eq!(layout.ringed_index(1, 1), 7);
        assert_eq!(layout.ringed_index(0, 0), 8);
        // left side runs back down
        assert_eq!(layout.ringed_index(0, 1), 9);
        assert_eq!(layout.ringed_index(0, 3), 11);
        // interior follows the ring
        assert_eq!(layout.ringed_index(1, 2), 12);
        assert_eq!(layout.ringed_index(1, 3), 13);
        assert_eq!(layout.ringed_index(2, 3), 14);
    }

    #[test]
    fn test_ringed_index_is_permutation() {
        let layout = ChunkLayout::new(3).unwrap();
        let mut seen = vec![false; layout.vertices as usize];
        for y in 0..layout.width {
            for x in 0..=y {
                let i = layout.ringed_index(x, y) as usize;
                assert!(!seen[i], "duplicate ringed index {}", i);
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_ring_side_pos_roundtrip() {
        let layout = ChunkLayout::new(2).unwrap();
        for ring in 0..layout.ring {
            let (side, pos) = layout.ring_side_pos(ring);
            assert_eq!(layout.ring_index(side, pos), ring);
        }
        // End of the left side wraps to the first corner
        assert_eq!(layout.ring_index(2, 4), 0);
    }

    #[test]
    fn test_edge_pos_flip_and_grid() {
        let p = EdgePos::from_grid(1, 2);
        assert_eq!(p.to_grid(2), Some(1));
        assert_eq!(p.flipped().to_grid(2), Some(3));
        assert_eq!(EdgePos::from_grid(2, 2), EdgePos::from_grid(1, 1));
        assert_eq!(EdgePos::ZERO.flipped(), EdgePos::ONE);
        // A quarter is not a vertex of a 2-segment side
        assert_eq!(p.to_grid(1), None);
    }

    #[test]
    fn test_edge_pos_parent_child() {
        let p = EdgePos::from_grid(1, 2); // 1/4
        let up = p.to_parent(1).unwrap(); // (1 + 1/4) / 2 = 5/8
        assert_eq!(up.to_grid(3), Some(5));

        let [first, second] = up.to_children();
        assert_eq!(first, Some((1, p)));
        assert_eq!(second, None);

        let [a, b] = EdgePos::from_grid(1, 1).to_children();
        assert_eq!(a, Some((0, EdgePos::ONE)));
        assert_eq!(b, Some((1, EdgePos::ZERO)));
    }
}
