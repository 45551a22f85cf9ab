//! Chunk slot allocator
//!
//! Each chunk slot owns one fixed block in the index buffer and one interior
//! block in the vertex buffer, plus a ring table naming the shared vertex at
//! every border position. Freed slots sit in an ordered set so the lowest
//! index is always reused first.

use std::collections::BTreeSet;

use crate::core::{ChunkIndex, Error, Resource, Result, SharedIndex, TriIndex, INVALID_SHARED, INVALID_TRI};

/// A live chunk moved from one slot to another by packing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub from: ChunkIndex,
    pub to: ChunkIndex,
    pub triangle: TriIndex,
}

#[derive(Debug)]
pub struct ChunkSlotAllocator {
    capacity: u32,
    /// One past the highest slot in use
    high_water: u32,
    free: BTreeSet<ChunkIndex>,
    /// Owning triangle per slot
    chunk_to_tri: Vec<TriIndex>,
    /// `ring_count` shared indices per slot
    rings: Vec<SharedIndex>,
    ring_count: u32,
}

impl ChunkSlotAllocator {
    /// # Arguments
    /// * `capacity` - Maximum number of chunk slots
    /// * `ring_count` - Border vertices per chunk
    pub fn new(capacity: u32, ring_count: u32) -> Self {
        Self {
            capacity,
            high_water: 0,
            free: BTreeSet::new(),
            chunk_to_tri: vec![INVALID_TRI; capacity as usize],
            rings: vec![INVALID_SHARED; capacity as usize * ring_count as usize],
            ring_count,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Live chunks
    pub fn count(&self) -> u32 {
        self.high_water - self.free.len() as u32
    }

    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    pub fn is_live(&self, c: ChunkIndex) -> bool {
        c < self.high_water && !self.free.contains(&c)
    }

    /// Triangle owning slot `c`, or `INVALID_TRI`
    pub fn triangle(&self, c: ChunkIndex) -> TriIndex {
        self.chunk_to_tri.get(c as usize).copied().unwrap_or(INVALID_TRI)
    }

    /// Take the lowest free slot for triangle `tri`
    pub fn allocate(&mut self, tri: TriIndex) -> Result<ChunkIndex> {
        let c = if let Some(c) = self.free.pop_first() {
            c
        } else if self.high_water < self.capacity {
            self.high_water += 1;
            self.high_water - 1
        } else {
            return Err(Error::CapacityExceeded {
                resource: Resource::ChunkSlots,
                limit: self.capacity,
            });
        };
        self.chunk_to_tri[c as usize] = tri;
        self.ring_mut(c).fill(INVALID_SHARED);
        Ok(c)
    }

    /// Return slot `c`; trailing free slots are trimmed off the high-water mark
    pub fn free(&mut self, c: ChunkIndex) -> Result<()> {
        if !self.is_live(c) {
            return Err(Error::UnknownChunk(c));
        }
        self.chunk_to_tri[c as usize] = INVALID_TRI;
        self.ring_mut(c).fill(INVALID_SHARED);
        self.free.insert(c);
        self.trim();
        Ok(())
    }

    fn trim(&mut self) {
        while self.high_water > 0 && self.free.remove(&(self.high_water - 1)) {
            self.high_water -= 1;
        }
    }

    /// Move the highest live chunk into the lowest free slot.
    ///
    /// Returns None once there are no holes left. The caller moves the buffer
    /// data; the ring table and owner are moved here.
    pub fn relocate_last(&mut self) -> Option<Relocation> {
        self.trim();
        let to = self.free.pop_first()?;
        let from = self.high_water - 1;
        let triangle = self.chunk_to_tri[from as usize];

        let n = self.ring_count as usize;
        self.rings
            .copy_within(from as usize * n..(from as usize + 1) * n, to as usize * n);
        self.chunk_to_tri[to as usize] = triangle;

        self.chunk_to_tri[from as usize] = INVALID_TRI;
        self.ring_mut(from).fill(INVALID_SHARED);
        self.high_water -= 1;
        self.trim();

        Some(Relocation { from, to, triangle })
    }

    pub fn ring(&self, c: ChunkIndex) -> &[SharedIndex] {
        let n = self.ring_count as usize;
        &self.rings[c as usize * n..(c as usize + 1) * n]
    }

    pub fn ring_mut(&mut self, c: ChunkIndex) -> &mut [SharedIndex] {
        let n = self.ring_count as usize;
        &mut self.rings[c as usize * n..(c as usize + 1) * n]
    }

    /// Live slots in ascending order
    pub fn live(&self) -> impl Iterator<Item = ChunkIndex> + '_ {
        (0..self.high_water).filter(move |c| !self.free.contains(c))
    }
}
