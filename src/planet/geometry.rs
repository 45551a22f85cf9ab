//! Planet geometry engine
//!
//! Turns chunked triangles of a [`TriangleHierarchy`] into flat vertex and
//! index buffers. Each chunked triangle owns one chunk slot; its border
//! vertices are shared with whatever chunks touch it, at any depth.

use std::sync::mpsc::Receiver;

use super::buffer::{GeometryBuffer, PlanetVertex};
use super::chunks::{ChunkSlotAllocator, Relocation};
use super::config::PlanetConfig;
use super::dirty::UpdateRange;
use super::grid::{ChunkLayout, EdgePos};
use super::shared::SharedVertexPool;
use crate::core::{
    BufferIndex, ChunkIndex, Error, Result, SharedIndex, TriIndex, Vec3, INVALID_BUFFER,
    INVALID_CHUNK, INVALID_SHARED, INVALID_TRI,
};
use crate::icosphere::{
    edge_half, HierarchyEvent, IcoSphereTree, SubTriangle, TriangleHierarchy, CHILD_COUNT,
    EDGE_CHILDREN,
};

/// Chunk state of one hierarchy triangle, kept parallel to the hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubTriangleChunk {
    /// Chunk slot, or `INVALID_CHUNK`
    pub chunk: ChunkIndex,
    /// Chunked triangles in the subtree below this one
    pub descendant_chunked: u32,
    /// Nearest chunked ancestor, or `INVALID_TRI`
    pub ancestor_chunked: TriIndex,
    /// First index buffer entry of the chunk
    pub data_index: BufferIndex,
    /// First interior vertex of the chunk
    pub data_vertex: BufferIndex,
}

impl Default for SubTriangleChunk {
    fn default() -> Self {
        Self {
            chunk: INVALID_CHUNK,
            descendant_chunked: 0,
            ancestor_chunked: INVALID_TRI,
            data_index: INVALID_BUFFER,
            data_vertex: INVALID_BUFFER,
        }
    }
}

impl SubTriangleChunk {
    pub fn is_chunked(&self) -> bool {
        self.chunk != INVALID_CHUNK
    }
}

/// Chunked planet surface over a triangle hierarchy
pub struct PlanetGeometry<H: TriangleHierarchy = IcoSphereTree> {
    pub(super) hierarchy: H,
    pub(super) events: Receiver<HierarchyEvent>,
    pub(super) config: PlanetConfig,
    pub(super) layout: ChunkLayout,
    /// Indexed by triangle
    pub(super) records: Vec<SubTriangleChunk>,
    pub(super) shared: SharedVertexPool,
    pub(super) chunks: ChunkSlotAllocator,
    pub(super) buffer: GeometryBuffer,
}

impl<H: TriangleHierarchy> PlanetGeometry<H> {
    /// Take ownership of a hierarchy and preallocate buffers for `config`
    pub fn new(mut hierarchy: H, config: PlanetConfig) -> Result<Self> {
        config.validate()?;
        let layout = ChunkLayout::new(config.chunk_subdivisions)?;

        let vertex_count = config
            .max_chunks
            .checked_mul(layout.interior)
            .and_then(|n| n.checked_add(config.max_shared_vertices));
        let index_count = config.max_chunks.checked_mul(layout.indices);
        let (Some(vertex_count), Some(index_count)) = (vertex_count, index_count) else {
            return Err(Error::Config("buffer sizes overflow u32".into()));
        };

        let events = hierarchy.subscribe();
        let records = vec![SubTriangleChunk::default(); hierarchy.triangle_capacity() as usize];
        let shared = SharedVertexPool::new(config.max_shared_vertices, hierarchy.vertex_capacity());
        let chunks = ChunkSlotAllocator::new(config.max_chunks, layout.ring);

        log::info!(
            "Planet geometry: radius {}, {} vertices per chunk, {} chunk slots, {} shared slots ({} vertices, {} indices)",
            config.radius,
            layout.vertices,
            config.max_chunks,
            config.max_shared_vertices,
            vertex_count,
            index_count
        );

        Ok(Self {
            hierarchy,
            events,
            config,
            layout,
            records,
            shared,
            chunks,
            buffer: GeometryBuffer::new(vertex_count, index_count),
        })
    }

    pub fn hierarchy(&self) -> &H {
        &self.hierarchy
    }

    pub fn config(&self) -> &PlanetConfig {
        &self.config
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Chunk state of triangle `t`
    pub fn record(&self, t: TriIndex) -> Option<&SubTriangleChunk> {
        self.records.get(t as usize)
    }

    pub fn vertex_buffer(&self) -> &[PlanetVertex] {
        self.buffer.vertices()
    }

    pub fn index_buffer(&self) -> &[u32] {
        self.buffer.indices()
    }

    pub fn updates_vertex_changes(&self) -> &[UpdateRange] {
        self.buffer.vertex_changes()
    }

    pub fn updates_index_changes(&self) -> &[UpdateRange] {
        self.buffer.index_changes()
    }

    /// Forget tracked changes once the caller has synced the GPU copy
    pub fn updates_clear(&mut self) {
        self.buffer.clear_changes();
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunks.count()
    }

    pub fn chunk_high_water(&self) -> u32 {
        self.chunks.high_water()
    }

    pub fn shared_count(&self) -> u32 {
        self.shared.count()
    }

    pub fn shared_users(&self, s: SharedIndex) -> u8 {
        self.shared.users(s)
    }

    /// Shared vertex at every border position of a live chunk, in ring order
    pub fn chunk_shared_ring(&self, c: ChunkIndex) -> Option<&[SharedIndex]> {
        self.chunks.is_live(c).then(|| self.chunks.ring(c))
    }

    /// Triangle owning chunk slot `c`
    pub fn chunk_triangle(&self, c: ChunkIndex) -> Option<TriIndex> {
        self.chunks.is_live(c).then(|| self.chunks.triangle(c))
    }

    pub fn indices_per_chunk(&self) -> u32 {
        self.layout.indices
    }

    /// Length of the index buffer prefix that holds every live chunk
    pub fn calc_index_count(&self) -> u32 {
        self.chunks.high_water() * self.layout.indices
    }

    pub(super) fn index_base(&self, c: ChunkIndex) -> BufferIndex {
        c * self.layout.indices
    }

    pub(super) fn vertex_base(&self, c: ChunkIndex) -> BufferIndex {
        self.config.max_shared_vertices + c * self.layout.interior
    }

    pub(super) fn triangle(&self, t: TriIndex) -> Result<&SubTriangle> {
        self.hierarchy
            .triangle(t)
            .ok_or_else(|| Error::HierarchyDesync(format!("triangle {} is not live", t)))
    }

    fn record_mut(&mut self, t: TriIndex) -> Result<&mut SubTriangleChunk> {
        self.records
            .get_mut(t as usize)
            .ok_or_else(|| Error::HierarchyDesync(format!("no chunk record for triangle {}", t)))
    }

    fn record_of(&self, t: TriIndex) -> Result<SubTriangleChunk> {
        self.records
            .get(t as usize)
            .copied()
            .ok_or_else(|| Error::HierarchyDesync(format!("no chunk record for triangle {}", t)))
    }

    /// Apply every pending hierarchy notification
    pub fn process_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            self.shared.reserve_corners(self.hierarchy.vertex_capacity());
            match event {
                HierarchyEvent::TrianglesAdded(added) => self.on_triangles_added(&added)?,
                HierarchyEvent::TrianglesRemoved(removed) => self.on_triangles_removed(&removed)?,
                HierarchyEvent::VerticesRemoved(removed) => {
                    for v in removed {
                        if !self.shared.unbind_corner(v) {
                            return Err(Error::HierarchyDesync(format!(
                                "removed vertex {} was never announced",
                                v
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn on_triangles_added(&mut self, added: &[TriIndex]) -> Result<()> {
        let capacity = self.hierarchy.triangle_capacity() as usize;
        if self.records.len() < capacity {
            self.records.resize(capacity, SubTriangleChunk::default());
        }
        for &t in added {
            let parent = self.triangle(t)?.parent;
            let ancestor = match self.records.get(parent as usize) {
                Some(p) if p.is_chunked() => parent,
                Some(p) => p.ancestor_chunked,
                None => INVALID_TRI,
            };
            *self.record_mut(t)? = SubTriangleChunk {
                ancestor_chunked: ancestor,
                ..Default::default()
            };
        }
        Ok(())
    }

    fn on_triangles_removed(&mut self, removed: &[TriIndex]) -> Result<()> {
        for &t in removed {
            let record = self.record_mut(t)?;
            if record.is_chunked() {
                return Err(Error::HierarchyDesync(format!(
                    "triangle {} removed while chunked",
                    t
                )));
            }
            *record = SubTriangleChunk::default();
        }
        Ok(())
    }

    /// Unit-sphere direction of grid point (x, y) of a triangle
    fn grid_direction(&self, corners: &[Vec3; 3], x: u32, y: u32) -> Vec3 {
        let wb = self.layout.width_b as f32;
        let down = (corners[1] - corners[0]) * (y as f32 / wb);
        let right = (corners[2] - corners[1]) * (x as f32 / wb);
        (corners[0] + down + right).normalize()
    }

    fn grid_vertex(&self, corners: &[Vec3; 3], x: u32, y: u32) -> PlanetVertex {
        let dir = self.grid_direction(corners, x, y);
        PlanetVertex::new(dir * self.config.radius, dir)
    }

    /// Grid point of a triangle for a ring position
    fn ring_xy(&self, side: u8, pos: u32) -> (u32, u32) {
        let wb = self.layout.width_b;
        match side {
            0 => (pos, wb),
            1 => (wb - pos, wb - pos),
            _ => (0, pos),
        }
    }

    /// Allocate and fill a chunk for triangle `t`
    pub fn chunk_add(&mut self, t: TriIndex) -> Result<ChunkIndex> {
        let record = self.record_of(t)?;
        if record.is_chunked() {
            return Err(Error::InvariantViolation(format!("triangle {} is already chunked", t)));
        }
        if record.descendant_chunked != 0 {
            return Err(Error::InvariantViolation(format!(
                "triangle {} has {} chunked descendants",
                t, record.descendant_chunked
            )));
        }
        if record.ancestor_chunked != INVALID_TRI {
            return Err(Error::InvariantViolation(format!(
                "triangle {} has chunked ancestor {}",
                t, record.ancestor_chunked
            )));
        }

        let tri = self.triangle(t)?.clone();
        let mut corners = [Vec3::ZERO; 3];
        for (corner, &v) in corners.iter_mut().zip(&tri.corners) {
            *corner = self.hierarchy.vertex_position(v).ok_or_else(|| {
                Error::HierarchyDesync(format!("triangle {} corner vertex {} is not live", t, v))
            })?;
        }

        let c = self.chunks.allocate(t)?;
        let mut ring = Vec::with_capacity(self.layout.ring as usize);
        if let Err(e) = self.resolve_ring(t, &tri, &corners, &mut ring) {
            for &s in &ring {
                self.release_shared(s)?;
            }
            self.chunks.free(c)?;
            return Err(e);
        }
        self.chunks.ring_mut(c).copy_from_slice(&ring);

        let data_index = self.index_base(c);
        let data_vertex = self.vertex_base(c);

        let mut interior = vec![PlanetVertex::default(); self.layout.interior as usize];
        for y in 0..self.layout.width {
            for x in 0..=y {
                let local = self.layout.ringed_index(x, y);
                if !self.layout.is_ring(local) {
                    interior[(local - self.layout.ring) as usize] = self.grid_vertex(&corners, x, y);
                }
            }
        }
        self.buffer.write_vertices(data_vertex, &interior);

        let ring_len = self.layout.ring;
        let indices: Vec<u32> = self
            .layout
            .local_triangles()
            .iter()
            .flatten()
            .map(|&local| {
                if local < ring_len {
                    ring[local as usize]
                } else {
                    data_vertex + local - ring_len
                }
            })
            .collect();
        self.buffer.write_indices(data_index, &indices);

        *self.record_mut(t)? = SubTriangleChunk {
            chunk: c,
            data_index,
            data_vertex,
            ..record
        };

        let mut parent = tri.parent;
        while parent != INVALID_TRI {
            self.record_mut(parent)?.descendant_chunked += 1;
            parent = self.triangle(parent)?.parent;
        }
        self.set_descendant_ancestor(&tri, t)?;

        log::trace!("Chunked triangle {} into slot {}", t, c);
        Ok(c)
    }

    /// Release chunk of triangle `t`; returns false if it had none
    pub fn chunk_remove(&mut self, t: TriIndex) -> Result<bool> {
        let record = self.record_of(t)?;
        if !record.is_chunked() {
            return Ok(false);
        }
        let c = record.chunk;

        let ring = self.chunks.ring(c).to_vec();
        for s in ring {
            self.release_shared(s)?;
        }
        self.buffer.zero_indices(record.data_index, self.layout.indices);
        self.chunks.free(c)?;

        *self.record_mut(t)? = SubTriangleChunk {
            descendant_chunked: record.descendant_chunked,
            ancestor_chunked: record.ancestor_chunked,
            ..Default::default()
        };

        let tri = self.triangle(t)?.clone();
        let mut parent = tri.parent;
        while parent != INVALID_TRI {
            let p = self.record_mut(parent)?;
            p.descendant_chunked = p.descendant_chunked.checked_sub(1).ok_or_else(|| {
                Error::InvariantViolation(format!("descendant count of {} underflow", parent))
            })?;
            parent = self.triangle(parent)?.parent;
        }
        self.set_descendant_ancestor(&tri, INVALID_TRI)?;

        log::trace!("Unchunked triangle {} from slot {}", t, c);
        Ok(true)
    }

    /// Remove every chunk below triangle `t`; returns how many were removed
    pub fn chunk_remove_descendants(&mut self, t: TriIndex) -> Result<u32> {
        if self.record_of(t)?.descendant_chunked == 0 {
            return Ok(0);
        }
        let tri = self.triangle(t)?;
        if !tri.subdivided {
            return Err(Error::InvariantViolation(format!(
                "leaf triangle {} counts chunked descendants",
                t
            )));
        }
        let base = tri.children;

        let mut removed = 0;
        for child in base..base + CHILD_COUNT {
            if self.chunk_remove(child)? {
                removed += 1;
            }
            removed += self.chunk_remove_descendants(child)?;
        }
        Ok(removed)
    }

    /// Set `ancestor_chunked` across the whole subtree below `tri`
    fn set_descendant_ancestor(&mut self, tri: &SubTriangle, ancestor: TriIndex) -> Result<()> {
        if !tri.subdivided {
            return Ok(());
        }
        let mut stack: Vec<TriIndex> = (tri.children..tri.children + CHILD_COUNT).collect();
        while let Some(d) = stack.pop() {
            self.record_mut(d)?.ancestor_chunked = ancestor;
            let child = self.triangle(d)?;
            if child.subdivided {
                stack.extend(child.children..child.children + CHILD_COUNT);
            }
        }
        Ok(())
    }

    /// Move live chunks down into freed slots; returns how many moved
    pub fn chunk_pack(&mut self) -> Result<u32> {
        let mut moved = 0;
        while let Some(Relocation { from, to, triangle }) = self.chunks.relocate_last() {
            let (from_i, to_i) = (self.index_base(from), self.index_base(to));
            let (from_v, to_v) = (self.vertex_base(from), self.vertex_base(to));

            self.buffer.copy_indices_rebased(
                from_i,
                to_i,
                self.layout.indices,
                from_v,
                to_v,
                self.layout.interior,
            );
            self.buffer.zero_indices(from_i, self.layout.indices);
            self.buffer.copy_vertices(from_v, to_v, self.layout.interior);

            let record = self.record_mut(triangle)?;
            record.chunk = to;
            record.data_index = to_i;
            record.data_vertex = to_v;

            log::trace!("Packed chunk of triangle {}: slot {} -> {}", triangle, from, to);
            moved += 1;
        }
        Ok(moved)
    }

    fn release_shared(&mut self, s: SharedIndex) -> Result<()> {
        if self.shared.release(s)? {
            self.buffer.write_vertex(s, PlanetVertex::default());
        }
        Ok(())
    }

    /// Find or create the shared vertex at every border position of `t`.
    ///
    /// Each acquired vertex is pushed onto `ring` as soon as it holds a user,
    /// so on error the caller can release exactly what was taken.
    fn resolve_ring(
        &mut self,
        t: TriIndex,
        tri: &SubTriangle,
        corners: &[Vec3; 3],
        ring: &mut Vec<SharedIndex>,
    ) -> Result<()> {
        let subdivisions = self.layout.subdivisions;
        for r in 0..self.layout.ring {
            let (side, pos) = self.layout.ring_side_pos(r);

            let found = if pos == 0 {
                let v = tri.corners[(side as usize + 1) % 3];
                match self.shared.corner(v) {
                    Some(s) => Some(s),
                    None => match self.lookup_across(t, side, EdgePos::ZERO)? {
                        Some(s) => Some(s),
                        None => self.lookup_across(t, (side + 2) % 3, EdgePos::ONE)?,
                    },
                }
            } else {
                self.lookup_across(t, side, EdgePos::from_grid(pos, subdivisions))?
            };

            let s = match found {
                Some(s) => {
                    self.shared.add_user(s)?;
                    s
                }
                None => {
                    let s = self.shared.create()?;
                    let (x, y) = self.ring_xy(side, pos);
                    let vertex = self.grid_vertex(corners, x, y);
                    self.buffer.write_vertex(s, vertex);
                    s
                }
            };
            ring.push(s);

            if pos == 0 {
                self.shared.bind_corner(tri.corners[(side as usize + 1) % 3], s);
            }
        }
        Ok(())
    }

    /// Shared vertex of whatever chunk lies across side `side` of `t` at `pos`.
    ///
    /// Without a same-depth neighbour the lookup climbs to the parent, whose
    /// side contains this one.
    fn lookup_across(&self, mut t: TriIndex, side: u8, mut pos: EdgePos) -> Result<Option<SharedIndex>> {
        loop {
            let tri = self.triangle(t)?;
            let n = tri.neighbours[side as usize];
            if n != INVALID_TRI {
                let Some(r) = self.triangle(n)?.side_facing(t) else {
                    return Err(Error::HierarchyDesync(format!(
                        "neighbour {} of triangle {} does not link back",
                        n, t
                    )));
                };
                return self.shared_in_region(n, r, pos.flipped());
            }
            if tri.parent == INVALID_TRI {
                return Ok(None);
            }
            let Some(half) = edge_half(tri.sibling, side) else {
                return Ok(None);
            };
            let Some(up) = pos.to_parent(half) else {
                return Ok(None);
            };
            pos = up;
            t = tri.parent;
        }
    }

    /// Shared vertex at `pos` along side `side` of `n`, taken from `n`'s own
    /// chunk, a chunked ancestor, or chunked descendants along that side
    fn shared_in_region(&self, n: TriIndex, side: u8, pos: EdgePos) -> Result<Option<SharedIndex>> {
        let record = self.record_of(n)?;
        if record.is_chunked() {
            return Ok(self.ring_lookup(record.chunk, side, pos));
        }

        if record.ancestor_chunked != INVALID_TRI {
            let mut t = n;
            let mut pos = pos;
            while t != record.ancestor_chunked {
                let tri = self.triangle(t)?;
                let Some(half) = edge_half(tri.sibling, side) else {
                    // Point is inside the ancestor's chunk, never shared
                    return Ok(None);
                };
                let Some(up) = pos.to_parent(half) else {
                    return Ok(None);
                };
                pos = up;
                t = tri.parent;
                if t == INVALID_TRI {
                    return Err(Error::InvariantViolation(format!(
                        "triangle {} has stale chunked ancestor {}",
                        n, record.ancestor_chunked
                    )));
                }
            }
            let ancestor = self.record_of(t)?;
            return Ok(self.ring_lookup(ancestor.chunk, side, pos));
        }

        if record.descendant_chunked > 0 {
            let tri = self.triangle(n)?;
            if tri.subdivided {
                for (half, child_pos) in pos.to_children().into_iter().flatten() {
                    let child = tri.child(EDGE_CHILDREN[side as usize][half as usize]);
                    if let Some(s) = self.shared_in_region(child, side, child_pos)? {
                        return Ok(Some(s));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Ring entry of chunk `c` at `pos` along `side`, if it is a grid point
    fn ring_lookup(&self, c: ChunkIndex, side: u8, pos: EdgePos) -> Option<SharedIndex> {
        let p = pos.to_grid(self.layout.subdivisions)?;
        let s = self.chunks.ring(c)[self.layout.ring_index(side, p) as usize];
        (s != INVALID_SHARED).then_some(s)
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::core::Resource;

    pub(crate) fn small_config() -> PlanetConfig {
        PlanetConfig {
            radius: 10.0,
            chunk_subdivisions: 2,
            max_chunks: 512,
            max_shared_vertices: 8192,
        }
    }

    pub(crate) fn small_planet() -> PlanetGeometry {
        PlanetGeometry::new(IcoSphereTree::new(6, 4096), small_config()).unwrap()
    }

    /// Subdivide through the engine so events stay in step
    pub(crate) fn subdivide(planet: &mut PlanetGeometry, t: TriIndex) {
        planet.hierarchy.subdivide_add(t).unwrap();
        planet.process_events().unwrap();
    }

    #[test]
    fn test_new_sizes_buffers() {
        let planet = small_planet();
        // 512 slots of 3 interior vertices after 8192 shared
        assert_eq!(planet.vertex_buffer().len(), 8192 + 512 * 3);
        assert_eq!(planet.index_buffer().len(), 512 * 48);
        assert_eq!(planet.indices_per_chunk(), 48);
        assert_eq!(planet.records.len(), 20);
        assert_eq!(planet.calc_index_count(), 0);
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = PlanetConfig { max_chunks: 0, ..small_config() };
        assert!(matches!(
            PlanetGeometry::new(IcoSphereTree::default(), config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_chunk_add_writes_geometry() {
        let mut planet = small_planet();
        let c = planet.chunk_add(0).unwrap();
        assert_eq!(c, 0);
        assert_eq!(planet.chunk_count(), 1);
        assert_eq!(planet.shared_count(), 12);
        assert_eq!(planet.calc_index_count(), 48);

        let record = *planet.record(0).unwrap();
        assert_eq!(record.chunk, 0);
        assert_eq!(record.data_index, 0);
        assert_eq!(record.data_vertex, 8192);

        // Every vertex referenced lies on the sphere
        for &i in &planet.index_buffer()[..48] {
            let v = planet.vertex_buffer()[i as usize];
            assert!((v.position().length() - 10.0).abs() < 1e-4);
            assert!((v.normal().length() - 1.0).abs() < 1e-5);
        }
        assert!(!planet.updates_vertex_changes().is_empty());
        assert_eq!(planet.updates_index_changes(), &[UpdateRange::new(0, 48)]);
    }

    #[test]
    fn test_chunk_add_winding_faces_out() {
        let mut planet = small_planet();
        planet.chunk_add(7).unwrap();
        let vertices = planet.vertex_buffer();
        for tri in planet.index_buffer()[..48].chunks(3) {
            let a = vertices[tri[0] as usize].position();
            let b = vertices[tri[1] as usize].position();
            let c = vertices[tri[2] as usize].position();
            let n = (b - a).cross(c - a);
            assert!(n.dot(a + b + c) > 0.0, "triangle {:?} faces inward", tri);
        }
    }

    #[test]
    fn test_roots_share_border() {
        let mut planet = small_planet();
        planet.chunk_add(0).unwrap();
        let n = planet.hierarchy.triangle(0).unwrap().neighbours[0];
        planet.chunk_add(n).unwrap();

        // One side (5 points) is shared, corners included
        assert_eq!(planet.shared_count(), 12 + 12 - 5);

        let r = planet.hierarchy.triangle(n).unwrap().side_facing(0).unwrap();
        let ours = planet.chunk_shared_ring(0).unwrap().to_vec();
        let theirs = planet.chunk_shared_ring(1).unwrap().to_vec();
        for p in 0..=4 {
            let a = ours[planet.layout.ring_index(0, p) as usize];
            let b = theirs[planet.layout.ring_index(r, 4 - p) as usize];
            assert_eq!(a, b);
            assert_eq!(planet.shared_users(a), 2);
        }
    }

    #[test]
    fn test_chunk_add_rejects_conflicts() {
        let mut planet = small_planet();
        subdivide(&mut planet, 0);
        planet.chunk_add(0).unwrap();

        // Children now have a chunked ancestor
        assert!(matches!(planet.chunk_add(20), Err(Error::InvariantViolation(_))));
        assert!(matches!(planet.chunk_add(0), Err(Error::InvariantViolation(_))));

        planet.chunk_remove(0).unwrap();
        planet.chunk_add(20).unwrap();
        assert_eq!(planet.record(0).unwrap().descendant_chunked, 1);
        assert!(matches!(planet.chunk_add(0), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_chunk_round_trip_restores_counts() {
        let mut planet = small_planet();
        planet.chunk_add(3).unwrap();
        let chunks = planet.chunk_count();
        let shared = planet.shared_count();

        planet.chunk_add(4).unwrap();
        assert!(planet.chunk_remove(4).unwrap());
        assert_eq!(planet.chunk_count(), chunks);
        assert_eq!(planet.shared_count(), shared);
        assert!(!planet.chunk_remove(4).unwrap());

        planet.chunk_remove(3).unwrap();
        assert_eq!(planet.chunk_count(), 0);
        assert_eq!(planet.shared_count(), 0);
        assert!(planet.index_buffer().iter().all(|&i| i == 0));
    }

    #[test]
    fn test_ancestor_tracking() {
        let mut planet = small_planet();
        subdivide(&mut planet, 5);
        let base = planet.hierarchy.triangle(5).unwrap().children;
        planet.chunk_add(5).unwrap();
        for child in base..base + 4 {
            assert_eq!(planet.record(child).unwrap().ancestor_chunked, 5);
        }

        // New grandchildren inherit the chunked ancestor
        subdivide(&mut planet, base + 1);
        let grand = planet.hierarchy.triangle(base + 1).unwrap().children;
        assert_eq!(planet.record(grand).unwrap().ancestor_chunked, 5);

        planet.chunk_remove(5).unwrap();
        assert_eq!(planet.record(grand).unwrap().ancestor_chunked, INVALID_TRI);
    }

    #[test]
    fn test_shared_capacity_rolls_back() {
        let config = PlanetConfig { max_shared_vertices: 20, ..small_config() };
        let mut planet = PlanetGeometry::new(IcoSphereTree::default(), config).unwrap();
        planet.chunk_add(0).unwrap();
        assert_eq!(planet.shared_count(), 12);

        // A disjoint root needs 12 more
        let far = (0..20)
            .find(|&t| {
                let tri = planet.hierarchy.triangle(t).unwrap();
                let root = planet.hierarchy.triangle(0).unwrap();
                tri.corners.iter().all(|c| !root.corners.contains(c))
            })
            .unwrap();
        let err = planet.chunk_add(far).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded { resource: Resource::SharedVertices, .. }
        ));
        assert_eq!(planet.shared_count(), 12);
        assert_eq!(planet.chunk_count(), 1);
        assert!(!planet.record(far).unwrap().is_chunked());
        planet.shared.verify().unwrap();
    }

    #[test]
    fn test_pack_moves_last_chunk() {
        let mut planet = small_planet();
        planet.chunk_add(0).unwrap();
        planet.chunk_add(1).unwrap();
        planet.chunk_add(2).unwrap();
        let before: Vec<u32> = planet.index_buffer()[96..144].to_vec();

        planet.chunk_remove(0).unwrap();
        planet.updates_clear();
        assert_eq!(planet.chunk_pack().unwrap(), 1);

        let record = *planet.record(2).unwrap();
        assert_eq!(record.chunk, 0);
        assert_eq!(record.data_vertex, 8192);
        assert_eq!(planet.chunk_high_water(), 2);

        // Shared refs are unchanged, interior refs follow the block
        for (old, new) in before.iter().zip(&planet.index_buffer()[0..48]) {
            if *old < 8192 {
                assert_eq!(old, new);
            } else {
                assert_eq!(old - 2 * 3, *new);
            }
        }
        assert!(!planet.updates_index_changes().is_empty());
        assert!(!planet.updates_vertex_changes().is_empty());
    }

    #[test]
    fn test_removed_chunked_triangle_is_desync() {
        let mut planet = small_planet();
        subdivide(&mut planet, 0);
        planet.chunk_add(20).unwrap();

        // Collapsing behind the engine's back leaves a chunked orphan
        planet.hierarchy.subdivide_remove(0).unwrap();
        assert!(matches!(planet.process_events(), Err(Error::HierarchyDesync(_))));
    }
}
