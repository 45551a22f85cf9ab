//! Invariant checks and statistics
//!
//! The verification walks every triangle and chunk; use it in tests and
//! debugging sessions, not per frame.

use super::geometry::PlanetGeometry;
use crate::core::{Error, Result, TriIndex, INVALID_SHARED, INVALID_TRI};
use crate::icosphere::{TriangleHierarchy, CHILD_COUNT};

impl<H: TriangleHierarchy> PlanetGeometry<H> {
    /// Count chunked triangles strictly below `t`
    pub fn debug_chunk_count_descendants(&self, t: TriIndex) -> Result<u32> {
        let tri = self.triangle(t)?;
        if !tri.subdivided {
            return Ok(0);
        }
        let mut count = 0;
        for child in tri.children..tri.children + CHILD_COUNT {
            if self.record(child).is_some_and(|r| r.is_chunked()) {
                count += 1;
            }
            count += self.debug_chunk_count_descendants(child)?;
        }
        Ok(count)
    }

    /// Full consistency scan of triangles, chunk slots and shared vertices
    pub fn debug_verify_state(&self) -> Result<()> {
        self.shared.verify()?;

        let mut refs = vec![0u32; self.shared.high_water() as usize];
        for c in self.chunks.live() {
            let t = self.chunks.triangle(c);
            if self.record(t).map(|r| r.chunk) != Some(c) {
                return Err(Error::InvariantViolation(format!(
                    "chunk {} owner {} does not point back",
                    c, t
                )));
            }
            for &s in self.chunks.ring(c) {
                if s == INVALID_SHARED || self.shared.users(s) == 0 {
                    return Err(Error::InvariantViolation(format!(
                        "chunk {} uses dead shared vertex {}",
                        c, s
                    )));
                }
                refs[s as usize] += 1;
            }
        }
        for (s, &n) in refs.iter().enumerate() {
            let users = self.shared.users(s as u32) as u32;
            if users != n {
                return Err(Error::InvariantViolation(format!(
                    "shared vertex {} has {} users but {} chunk references",
                    s, users, n
                )));
            }
        }

        for t in 0..self.hierarchy.triangle_capacity() {
            let record = self.record(t).copied().unwrap_or_default();
            let Some(tri) = self.hierarchy.triangle(t) else {
                if record.is_chunked() {
                    return Err(Error::InvariantViolation(format!("dead triangle {} is chunked", t)));
                }
                continue;
            };

            let descendants = self.debug_chunk_count_descendants(t)?;
            if record.descendant_chunked != descendants {
                return Err(Error::InvariantViolation(format!(
                    "triangle {} counts {} chunked descendants, found {}",
                    t, record.descendant_chunked, descendants
                )));
            }

            let mut ancestor = INVALID_TRI;
            let mut p = tri.parent;
            while p != INVALID_TRI {
                if self.record(p).is_some_and(|r| r.is_chunked()) {
                    ancestor = p;
                    break;
                }
                p = self.triangle(p)?.parent;
            }
            if record.ancestor_chunked != ancestor {
                return Err(Error::InvariantViolation(format!(
                    "triangle {} ancestor_chunked {} but nearest chunked ancestor is {}",
                    t, record.ancestor_chunked, ancestor
                )));
            }

            if record.is_chunked() {
                if descendants != 0 || ancestor != INVALID_TRI {
                    return Err(Error::InvariantViolation(format!(
                        "chunked triangle {} overlaps other chunks",
                        t
                    )));
                }
                if record.data_index != self.index_base(record.chunk)
                    || record.data_vertex != self.vertex_base(record.chunk)
                {
                    return Err(Error::InvariantViolation(format!(
                        "triangle {} buffer offsets do not match chunk {}",
                        t, record.chunk
                    )));
                }
            }
        }
        Ok(())
    }

    /// Log chunk, shared vertex and buffer utilisation
    pub fn log_stats(&self) {
        log::info!(
            "Chunks: {} live / {} capacity (high water {}, {} free)",
            self.chunks.count(),
            self.chunks.capacity(),
            self.chunks.high_water(),
            self.chunks.free_count()
        );
        log::info!(
            "Shared vertices: {} live / {} capacity (high water {})",
            self.shared.count(),
            self.shared.capacity(),
            self.shared.high_water()
        );
        log::info!(
            "Buffers: {} of {} indices drawable, {} vertex / {} index dirty ranges",
            self.calc_index_count(),
            self.index_buffer().len(),
            self.updates_vertex_changes().len(),
            self.updates_index_changes().len()
        );
    }

    /// Push every live shared vertex outward by `users * step` so sharing
    /// shows up as terracing
    pub fn debug_raise_by_share_count(&mut self, step: f32) {
        for s in 0..self.shared.high_water() {
            let users = self.shared.users(s);
            if users == 0 {
                continue;
            }
            self.buffer.modify_vertex(s, |v| {
                let raised = v.position() + v.normal() * (users as f32 * step);
                v.position = raised.to_array();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::Error;
    use crate::icosphere::TriangleHierarchy;
    use crate::planet::geometry::tests::{small_planet, subdivide};

    #[test]
    fn test_count_descendants() {
        let mut planet = small_planet();
        subdivide(&mut planet, 0);
        subdivide(&mut planet, 21);
        planet.chunk_add(20).unwrap();
        let grand = planet.hierarchy().triangle(21).unwrap().children;
        planet.chunk_add(grand).unwrap();
        planet.chunk_add(grand + 3).unwrap();

        assert_eq!(planet.debug_chunk_count_descendants(0).unwrap(), 3);
        assert_eq!(planet.debug_chunk_count_descendants(21).unwrap(), 2);
        assert_eq!(planet.debug_chunk_count_descendants(20).unwrap(), 0);
        planet.debug_verify_state().unwrap();
    }

    #[test]
    fn test_verify_catches_bad_counter() {
        let mut planet = small_planet();
        planet.chunk_add(4).unwrap();
        planet.debug_verify_state().unwrap();

        planet.records[4].descendant_chunked = 2;
        assert!(matches!(planet.debug_verify_state(), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_raise_by_share_count() {
        let mut planet = small_planet();
        planet.chunk_add(0).unwrap();
        let n = planet.hierarchy().triangle(0).unwrap().neighbours[0];
        planet.chunk_add(n).unwrap();
        planet.updates_clear();

        let before: Vec<f32> = planet.vertex_buffer()[..19]
            .iter()
            .map(|v| v.position().length())
            .collect();
        planet.debug_raise_by_share_count(0.5);

        for (s, old) in before.iter().enumerate() {
            let raised = planet.vertex_buffer()[s].position().length() - old;
            let users = planet.shared_users(s as u32) as f32;
            assert!((raised - users * 0.5).abs() < 1e-4);
        }
        assert!(!planet.updates_vertex_changes().is_empty());
    }
}
