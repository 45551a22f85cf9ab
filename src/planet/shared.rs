//! Reference-counted pool of shared border vertices
//!
//! Shared slot `s` is vertex `s` of the geometry buffer. The pool only keeps
//! the bookkeeping; writing and clearing vertex data is up to the caller.

use crate::core::{Error, Resource, Result, SharedIndex, VrtxIndex, INVALID_SHARED, INVALID_VRTX};

/// Most chunks that can meet at one vertex of a subdivided icosahedron
pub const MAX_SHARED_USERS: u8 = 6;

#[derive(Debug)]
pub struct SharedVertexPool {
    capacity: u32,
    /// User count per slot below the high-water mark
    users: Vec<u8>,
    /// Freed slots, reused last-in first-out
    free: Vec<SharedIndex>,
    /// Hierarchy vertex -> shared slot for chunk corners
    corner_to_shared: Vec<SharedIndex>,
    /// Shared slot -> hierarchy vertex it is bound to, if any
    shared_to_corner: Vec<VrtxIndex>,
}

impl SharedVertexPool {
    pub fn new(capacity: u32, vertex_capacity: u32) -> Self {
        Self {
            capacity,
            users: Vec::with_capacity(capacity as usize),
            free: Vec::new(),
            corner_to_shared: vec![INVALID_SHARED; vertex_capacity as usize],
            shared_to_corner: Vec::with_capacity(capacity as usize),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots ever handed out; live slots all lie below this
    pub fn high_water(&self) -> u32 {
        self.users.len() as u32
    }

    /// Slots currently in use
    pub fn count(&self) -> u32 {
        (self.users.len() - self.free.len()) as u32
    }

    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    pub fn users(&self, s: SharedIndex) -> u8 {
        self.users.get(s as usize).copied().unwrap_or(0)
    }

    /// Take a new slot with one user
    pub fn create(&mut self) -> Result<SharedIndex> {
        let s = if let Some(s) = self.free.pop() {
            s
        } else if self.high_water() < self.capacity {
            self.users.push(0);
            self.shared_to_corner.push(INVALID_VRTX);
            self.high_water() - 1
        } else {
            return Err(Error::CapacityExceeded {
                resource: Resource::SharedVertices,
                limit: self.capacity,
            });
        };
        self.users[s as usize] = 1;
        Ok(s)
    }

    /// Register another chunk using a live slot
    pub fn add_user(&mut self, s: SharedIndex) -> Result<()> {
        let users = self
            .users
            .get_mut(s as usize)
            .ok_or_else(|| Error::InvariantViolation(format!("shared vertex {} out of range", s)))?;
        if *users == 0 || *users >= MAX_SHARED_USERS {
            return Err(Error::InvariantViolation(format!(
                "shared vertex {} cannot take another user ({} users)",
                s, users
            )));
        }
        *users += 1;
        Ok(())
    }

    /// Drop one user; returns true when the slot went back to the free list
    pub fn release(&mut self, s: SharedIndex) -> Result<bool> {
        let users = self
            .users
            .get_mut(s as usize)
            .ok_or_else(|| Error::InvariantViolation(format!("shared vertex {} out of range", s)))?;
        if *users == 0 {
            return Err(Error::InvariantViolation(format!("shared vertex {} released twice", s)));
        }
        *users -= 1;
        if *users > 0 {
            return Ok(false);
        }

        self.free.push(s);
        let v = std::mem::replace(&mut self.shared_to_corner[s as usize], INVALID_VRTX);
        if let Some(slot) = self.corner_to_shared.get_mut(v as usize) {
            *slot = INVALID_SHARED;
        }
        Ok(true)
    }

    /// Shared slot bound to a hierarchy vertex
    pub fn corner(&self, v: VrtxIndex) -> Option<SharedIndex> {
        self.corner_to_shared
            .get(v as usize)
            .copied()
            .filter(|&s| s != INVALID_SHARED)
    }

    /// Bind a hierarchy vertex to a live slot
    pub fn bind_corner(&mut self, v: VrtxIndex, s: SharedIndex) {
        if v as usize >= self.corner_to_shared.len() {
            self.corner_to_shared.resize(v as usize + 1, INVALID_SHARED);
        }
        let previous = std::mem::replace(&mut self.shared_to_corner[s as usize], v);
        if previous != v {
            if let Some(slot) = self.corner_to_shared.get_mut(previous as usize) {
                *slot = INVALID_SHARED;
            }
        }
        self.corner_to_shared[v as usize] = s;
    }

    /// Grow the corner map to cover `vertex_capacity` hierarchy vertices
    pub fn reserve_corners(&mut self, vertex_capacity: u32) {
        if vertex_capacity as usize > self.corner_to_shared.len() {
            self.corner_to_shared.resize(vertex_capacity as usize, INVALID_SHARED);
        }
    }

    /// Forget a removed hierarchy vertex. Returns false if `v` was never
    /// known to the map.
    pub fn unbind_corner(&mut self, v: VrtxIndex) -> bool {
        let Some(slot) = self.corner_to_shared.get_mut(v as usize) else {
            return false;
        };
        let s = std::mem::replace(slot, INVALID_SHARED);
        if let Some(back) = self.shared_to_corner.get_mut(s as usize) {
            *back = INVALID_VRTX;
        }
        true
    }

    /// Check that exactly the slots with no users are on the free list
    pub fn verify(&self) -> Result<()> {
        let mut on_free = vec![false; self.users.len()];
        for &s in &self.free {
            let seen = on_free.get_mut(s as usize).ok_or_else(|| {
                Error::InvariantViolation(format!("free shared vertex {} beyond high water", s))
            })?;
            if *seen {
                return Err(Error::InvariantViolation(format!("shared vertex {} freed twice", s)));
            }
            *seen = true;
        }
        for (s, (&users, &free)) in self.users.iter().zip(&on_free).enumerate() {
            if (users == 0) != free {
                return Err(Error::InvariantViolation(format!(
                    "shared vertex {} has {} users but free={}",
                    s, users, free
                )));
            }
            if users > MAX_SHARED_USERS {
                return Err(Error::InvariantViolation(format!(
                    "shared vertex {} has {} users",
                    s, users
                )));
            }
        }
        for (v, &s) in self.corner_to_shared.iter().enumerate() {
            if s == INVALID_SHARED {
                continue;
            }
            if self.users(s) == 0 || self.shared_to_corner[s as usize] != v as VrtxIndex {
                return Err(Error::InvariantViolation(format!(
                    "corner {} maps to stale shared vertex {}",
                    v, s
                )));
            }
        }
        Ok(())
    }
}
