//! Icosphere-based triangle hierarchy
//!
//! Triangles live in a flat arena addressed by [`TriIndex`]. Children of a
//! subdivided triangle always occupy four contiguous slots, and freed groups
//! of four are recycled through a free list so indices stay stable for the
//! lifetime of a triangle.

use std::sync::mpsc::{self, Receiver, Sender};

use super::icosahedron::{face_neighbours, icosahedron_vertices, ICOSAHEDRON_FACES, ICOSAHEDRON_FACE_COUNT};
use super::{edge_half, HierarchyEvent, SubTriangle, TriangleHierarchy, CHILD_COUNT, EDGE_CHILDREN};
use crate::core::{Error, Result, TriIndex, Vec3, VrtxIndex, INVALID_TRI, INVALID_VRTX};

/// Default subdivision depth limit
pub const DEFAULT_MAX_DEPTH: u8 = 10;

/// Default limit on live triangles
pub const DEFAULT_MAX_TRIANGLES: u32 = 1 << 20;

/// Recursively subdivided icosahedron
pub struct IcoSphereTree {
    /// Triangle arena, `None` for free slots
    triangles: Vec<Option<SubTriangle>>,
    /// First index of each free group of four slots
    free_groups: Vec<TriIndex>,
    /// Unit-sphere vertex positions, `None` for free slots
    vertices: Vec<Option<Vec3>>,
    free_vertices: Vec<VrtxIndex>,
    live_triangles: u32,
    max_depth: u8,
    max_triangles: u32,
    /// Notification channels handed out by `subscribe`
    subscribers: Vec<Sender<HierarchyEvent>>,
}

impl IcoSphereTree {
    /// Create the 20 root faces of an icosahedron
    ///
    /// # Arguments
    /// * `max_depth` - Triangles at this depth refuse to subdivide
    /// * `max_triangles` - Limit on live triangles, including the roots
    pub fn new(max_depth: u8, max_triangles: u32) -> Self {
        let positions = icosahedron_vertices();
        let links = face_neighbours();

        let triangles = ICOSAHEDRON_FACES
            .iter()
            .enumerate()
            .map(|(f, &corners)| {
                let center = corners
                    .iter()
                    .map(|&c| positions[c as usize])
                    .sum::<Vec3>()
                    .normalize();
                let mut tri = SubTriangle::new(INVALID_TRI, 0, 0, corners, center);
                for (s, &(g, _)) in links[f].iter().enumerate() {
                    tri.neighbours[s] = g;
                }
                Some(tri)
            })
            .collect();

        Self {
            triangles,
            free_groups: Vec::new(),
            vertices: positions.iter().copied().map(Some).collect(),
            free_vertices: Vec::new(),
            live_triangles: ICOSAHEDRON_FACE_COUNT,
            max_depth,
            max_triangles,
            subscribers: Vec::new(),
        }
    }

    /// Number of live triangles
    pub fn live_triangle_count(&self) -> u32 {
        self.live_triangles
    }

    /// Number of live vertices
    pub fn live_vertex_count(&self) -> u32 {
        (self.vertices.len() - self.free_vertices.len()) as u32
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    fn get(&self, t: TriIndex) -> Result<&SubTriangle> {
        self.triangle(t)
            .ok_or_else(|| Error::Hierarchy(format!("unknown triangle {}", t)))
    }

    fn get_mut(&mut self, t: TriIndex) -> Result<&mut SubTriangle> {
        self.triangles
            .get_mut(t as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::Hierarchy(format!("unknown triangle {}", t)))
    }

    fn position(&self, v: VrtxIndex) -> Result<Vec3> {
        self.vertex_position(v)
            .ok_or_else(|| Error::Hierarchy(format!("unknown vertex {}", v)))
    }

    fn alloc_vertex(&mut self, pos: Vec3) -> VrtxIndex {
        if let Some(v) = self.free_vertices.pop() {
            self.vertices[v as usize] = Some(pos);
            v
        } else {
            self.vertices.push(Some(pos));
            (self.vertices.len() - 1) as VrtxIndex
        }
    }

    fn free_vertex(&mut self, v: VrtxIndex) {
        self.vertices[v as usize] = None;
        self.free_vertices.push(v);
    }

    fn alloc_group(&mut self) -> TriIndex {
        if let Some(base) = self.free_groups.pop() {
            base
        } else {
            let base = self.triangles.len() as TriIndex;
            self.triangles
                .extend(std::iter::repeat_with(|| None).take(CHILD_COUNT as usize));
            base
        }
    }

    /// Midpoint of side `side` of `tri`, reusing a subdivided neighbour's
    fn midpoint_for(&mut self, t: TriIndex, tri: &SubTriangle, side: usize) -> Result<VrtxIndex> {
        if let Some(n) = self.triangle(tri.neighbours[side]) {
            if n.subdivided {
                if let Some(r) = n.side_facing(t) {
                    return Ok(n.midpoints[r as usize]);
                }
            }
        }
        let a = self.position(tri.corners[(side + 1) % 3])?;
        let b = self.position(tri.corners[(side + 2) % 3])?;
        Ok(self.alloc_vertex(((a + b) * 0.5).normalize()))
    }

    fn notify(&mut self, event: HierarchyEvent) {
        // Dropped receivers are pruned on the next send
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Check neighbour symmetry and parent/child links
    pub fn debug_verify_state(&self) -> Result<()> {
        for (i, slot) in self.triangles.iter().enumerate() {
            let Some(tri) = slot else { continue };
            let t = i as TriIndex;

            for (s, &n) in tri.neighbours.iter().enumerate() {
                if n == INVALID_TRI {
                    continue;
                }
                let other = self.triangle(n).ok_or_else(|| {
                    Error::InvariantViolation(format!("triangle {} side {} links to dead {}", t, s, n))
                })?;
                if other.side_facing(t).is_none() || other.depth != tri.depth {
                    return Err(Error::InvariantViolation(format!(
                        "triangle {} side {} link to {} is one-sided",
                        t, s, n
                    )));
                }
            }

            if tri.subdivided {
                for c in 0..CHILD_COUNT as u8 {
                    let child = self.triangle(tri.child(c)).ok_or_else(|| {
                        Error::InvariantViolation(format!("triangle {} missing child {}", t, c))
                    })?;
                    if child.parent != t || child.sibling != c {
                        return Err(Error::InvariantViolation(format!(
                            "child {} of triangle {} has wrong parent link",
                            c, t
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for IcoSphereTree {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH, DEFAULT_MAX_TRIANGLES)
    }
}

impl TriangleHierarchy for IcoSphereTree {
    fn root_count(&self) -> u32 {
        ICOSAHEDRON_FACE_COUNT
    }

    fn triangle_capacity(&self) -> u32 {
        self.triangles.len() as u32
    }

    fn vertex_capacity(&self) -> u32 {
        self.vertices.len() as u32
    }

    fn triangle(&self, t: TriIndex) -> Option<&SubTriangle> {
        self.triangles.get(t as usize).and_then(Option::as_ref)
    }

    fn vertex_position(&self, v: VrtxIndex) -> Option<Vec3> {
        self.vertices.get(v as usize).copied().flatten()
    }

    fn subdivide_add(&mut self, t: TriIndex) -> Result<()> {
        let tri = self.get(t)?.clone();
        if tri.subdivided {
            return Err(Error::Hierarchy(format!("triangle {} already subdivided", t)));
        }
        if tri.depth >= self.max_depth {
            return Err(Error::Hierarchy(format!(
                "triangle {} at max depth {}",
                t, self.max_depth
            )));
        }
        if self.live_triangles + CHILD_COUNT > self.max_triangles {
            return Err(Error::Hierarchy(format!(
                "triangle limit {} reached",
                self.max_triangles
            )));
        }

        let mids = [
            self.midpoint_for(t, &tri, 0)?,
            self.midpoint_for(t, &tri, 1)?,
            self.midpoint_for(t, &tri, 2)?,
        ];
        let [c0, c1, c2] = tri.corners;
        let [m0, m1, m2] = mids;
        let child_corners = [[c0, m2, m1], [m2, c1, m0], [m1, m0, c2], [m0, m1, m2]];

        let base = self.alloc_group();
        for (i, corners) in child_corners.into_iter().enumerate() {
            let mut center = Vec3::ZERO;
            for c in corners {
                center += self.position(c)?;
            }
            self.triangles[base as usize + i] = Some(SubTriangle::new(
                t,
                i as u8,
                tri.depth + 1,
                corners,
                center.normalize(),
            ));
        }

        // Centre child touches the other three
        self.get_mut(base + 3)?.neighbours = [base, base + 1, base + 2];
        self.get_mut(base)?.neighbours[0] = base + 3;
        self.get_mut(base + 1)?.neighbours[1] = base + 3;
        self.get_mut(base + 2)?.neighbours[2] = base + 3;

        // Exterior children link to a subdivided neighbour's children. The
        // shared edge runs the other way for the neighbour, so halves swap.
        for s in 0..3 {
            let Some(n) = self.triangle(tri.neighbours[s]) else { continue };
            if !n.subdivided {
                continue;
            }
            let Some(r) = n.side_facing(t) else { continue };
            let n_base = n.children;
            for h in 0..2 {
                let ours = base + EDGE_CHILDREN[s][h] as TriIndex;
                let theirs = n_base + EDGE_CHILDREN[r as usize][1 - h] as TriIndex;
                self.get_mut(ours)?.neighbours[s] = theirs;
                self.get_mut(theirs)?.neighbours[r as usize] = ours;
            }
        }

        let parent = self.get_mut(t)?;
        parent.midpoints = mids;
        parent.children = base;
        parent.subdivided = true;
        self.live_triangles += CHILD_COUNT;

        log::trace!("Subdivided triangle {} into {}..{}", t, base, base + CHILD_COUNT);
        self.notify(HierarchyEvent::TrianglesAdded((base..base + CHILD_COUNT).collect()));
        Ok(())
    }

    fn subdivide_remove(&mut self, t: TriIndex) -> Result<()> {
        let tri = self.get(t)?.clone();
        if !tri.subdivided {
            return Err(Error::Hierarchy(format!("triangle {} is not subdivided", t)));
        }
        let base = tri.children;

        for c in 0..CHILD_COUNT as u8 {
            if self.get(tri.child(c))?.subdivided {
                self.subdivide_remove(tri.child(c))?;
            }
        }

        // Unlink exterior children from their neighbours
        for c in 0..3u8 {
            let child = tri.child(c);
            let links = self.get(child)?.neighbours;
            for s in 0..3u8 {
                if edge_half(c, s).is_none() {
                    continue;
                }
                let n = links[s as usize];
                if n == INVALID_TRI {
                    continue;
                }
                let other = self.get_mut(n)?;
                if let Some(r) = other.side_facing(child) {
                    other.neighbours[r as usize] = INVALID_TRI;
                }
            }
        }

        // A midpoint survives only while the neighbour across it is subdivided
        let mut removed_vertices = Vec::new();
        for s in 0..3 {
            let shared = self
                .triangle(tri.neighbours[s])
                .is_some_and(|n| n.subdivided);
            if !shared {
                self.free_vertex(tri.midpoints[s]);
                removed_vertices.push(tri.midpoints[s]);
            }
        }

        for i in 0..CHILD_COUNT {
            self.triangles[(base + i) as usize] = None;
        }
        self.free_groups.push(base);
        self.live_triangles -= CHILD_COUNT;

        let parent = self.get_mut(t)?;
        parent.subdivided = false;
        parent.children = INVALID_TRI;
        parent.midpoints = [INVALID_VRTX; 3];

        log::trace!("Unsubdivided triangle {}", t);
        self.notify(HierarchyEvent::TrianglesRemoved((base..base + CHILD_COUNT).collect()));
        if !removed_vertices.is_empty() {
            self.notify(HierarchyEvent::VerticesRemoved(removed_vertices));
        }
        Ok(())
    }

    fn subscribe(&mut self) -> Receiver<HierarchyEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tree_roots() {
        let tree = IcoSphereTree::default();
        assert_eq!(tree.root_count(), 20);
        assert_eq!(tree.live_triangle_count(), 20);
        assert_eq!(tree.live_vertex_count(), 12);
        assert!(tree.debug_verify_state().is_ok());
        for t in 0..20 {
            let tri = tree.triangle(t).unwrap();
            assert_eq!(tri.depth, 0);
            assert!(!tri.subdivided);
            assert!(tri.neighbours.iter().all(|&n| n < 20));
        }
    }

    #[test]
    fn test_subdivide_creates_linked_children() {
        let mut tree = IcoSphereTree::default();
        let events = tree.subscribe();
        tree.subdivide_add(0).unwrap();

        let root = tree.triangle(0).unwrap();
        assert!(root.subdivided);
        assert_eq!(root.children, 20);
        assert_eq!(tree.live_triangle_count(), 24);
        assert_eq!(tree.live_vertex_count(), 15);
        assert_eq!(
            events.try_recv().unwrap(),
            HierarchyEvent::TrianglesAdded(vec![20, 21, 22, 23])
        );

        let centre = tree.triangle(23).unwrap();
        assert_eq!(centre.neighbours, [20, 21, 22]);
        // Exterior sides have no same-depth neighbour yet
        assert_eq!(tree.triangle(21).unwrap().neighbours[0], INVALID_TRI);
        assert!(tree.debug_verify_state().is_ok());
    }

    #[test]
    fn test_neighbours_share_midpoints_and_links() {
        let mut tree = IcoSphereTree::default();
        let n = tree.triangle(0).unwrap().neighbours[0];
        tree.subdivide_add(0).unwrap();
        let before = tree.live_vertex_count();
        tree.subdivide_add(n).unwrap();
        // Shared edge midpoint is reused, so only two new vertices
        assert_eq!(tree.live_vertex_count(), before + 2);

        let r = tree.triangle(n).unwrap().side_facing(0).unwrap() as usize;
        assert_eq!(
            tree.triangle(0).unwrap().midpoints[0],
            tree.triangle(n).unwrap().midpoints[r]
        );

        // Children along the shared edge now see each other
        let ours = tree.triangle(0).unwrap().child(EDGE_CHILDREN[0][0]);
        let linked = tree.triangle(ours).unwrap().neighbours[0];
        assert_ne!(linked, INVALID_TRI);
        assert_eq!(tree.triangle(linked).unwrap().parent, n);
        assert!(tree.debug_verify_state().is_ok());
    }

    #[test]
    fn test_subdivide_remove_recursive() {
        let mut tree = IcoSphereTree::default();
        tree.subdivide_add(0).unwrap();
        tree.subdivide_add(20).unwrap();
        let events = tree.subscribe();

        tree.subdivide_remove(0).unwrap();
        assert!(!tree.triangle(0).unwrap().subdivided);
        assert!(tree.triangle(20).is_none());
        assert!(tree.triangle(24).is_none());
        assert_eq!(tree.live_triangle_count(), 20);
        assert_eq!(tree.live_vertex_count(), 12);

        let received: Vec<_> = events.try_iter().collect();
        assert!(received.contains(&HierarchyEvent::TrianglesRemoved(vec![24, 25, 26, 27])));
        assert!(received.contains(&HierarchyEvent::TrianglesRemoved(vec![20, 21, 22, 23])));
        assert!(tree.debug_verify_state().is_ok());
    }

    #[test]
    fn test_remove_keeps_midpoint_used_by_neighbour() {
        let mut tree = IcoSphereTree::default();
        let n = tree.triangle(0).unwrap().neighbours[1];
        tree.subdivide_add(0).unwrap();
        tree.subdivide_add(n).unwrap();
        let mid = tree.triangle(0).unwrap().midpoints[1];

        tree.subdivide_remove(0).unwrap();
        assert!(tree.vertex_position(mid).is_some());
        // Neighbour's children no longer link into the removed group
        let theirs = tree.triangle(n).unwrap();
        for c in 0..4 {
            let child = tree.triangle(theirs.child(c)).unwrap();
            assert!(child.neighbours.iter().all(|&l| l == INVALID_TRI || tree.triangle(l).is_some()));
        }
        assert!(tree.debug_verify_state().is_ok());
    }

    #[test]
    fn test_freed_group_is_reused() {
        let mut tree = IcoSphereTree::default();
        tree.subdivide_add(3).unwrap();
        let first = tree.triangle(3).unwrap().children;
        tree.subdivide_remove(3).unwrap();
        tree.subdivide_add(7).unwrap();
        assert_eq!(tree.triangle(7).unwrap().children, first);
    }

    #[test]
    fn test_limits_refuse_subdivision() {
        let mut tree = IcoSphereTree::new(1, 1000);
        tree.subdivide_add(0).unwrap();
        assert!(tree.subdivide_add(20).is_err());
        assert!(tree.subdivide_add(0).is_err());
        assert!(tree.subdivide_remove(1).is_err());

        let mut small = IcoSphereTree::new(4, 22);
        assert!(small.subdivide_add(0).is_err());
        assert!(small.subdivide_add(99).is_err());
    }

    #[test]
    fn test_children_inside_parent() {
        let mut tree = IcoSphereTree::default();
        tree.subdivide_add(5).unwrap();
        let parent = tree.triangle(5).unwrap().clone();
        for c in 0..4 {
            let child = tree.triangle(parent.child(c)).unwrap();
            assert!(child.center.dot(parent.center) > 0.9);
            assert!((child.center.length() - 1.0).abs() < 1e-5);
        }
    }
}
