//! Generational entity handles and the dense arena that allocates them

use std::fmt;

/// Handle to a live entity: dense slot index plus a generation counter.
///
/// Packed into a `u32` on the wire (generation in the high half). A handle
/// whose slot has since been reused carries an older generation and no
/// longer resolves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u16,
    generation: u16,
}

impl Entity {
    pub const fn new(index: u16, generation: u16) -> Self {
        Self { index, generation }
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self {
            index: bits as u16,
            generation: (bits >> 16) as u16,
        }
    }

    pub const fn to_bits(self) -> u32 {
        ((self.generation as u32) << 16) | self.index as u32
    }

    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub const fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Highest usable slot count. Index `u16::MAX` is never handed out, so the
/// all-ones handle can stand for "no entity" on the wire.
pub const MAX_ENTITIES: usize = u16::MAX as usize;

/// Slot allocator with free-list reuse.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    generations: Vec<u16>,
    alive: Vec<bool>,
    free: Vec<u16>,
    len: usize,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handle, reusing the lowest freed slot first.
    ///
    /// Returns `None` once [`MAX_ENTITIES`] slots are live.
    pub fn allocate(&mut self) -> Option<Entity> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.generations.len() >= MAX_ENTITIES {
                    return None;
                }
                let index = self.generations.len() as u16;
                self.generations.push(0);
                self.alive.push(false);
                index
            }
        };
        let slot = index as usize;
        self.alive[slot] = true;
        self.len += 1;
        Some(Entity::new(index, self.generations[slot]))
    }

    /// Claim an exact handle chosen by another peer. Fails if the slot is
    /// live under any generation.
    pub fn claim(&mut self, entity: Entity) -> bool {
        let slot = entity.index();
        if slot >= MAX_ENTITIES {
            return false;
        }
        if slot >= self.generations.len() {
            let new_len = slot + 1;
            for index in self.generations.len()..slot {
                self.free.push(index as u16);
            }
            self.generations.resize(new_len, 0);
            self.alive.resize(new_len, false);
        } else if self.alive[slot] {
            return false;
        } else {
            self.free.retain(|&index| index as usize != slot);
        }
        self.generations[slot] = entity.generation();
        self.alive[slot] = true;
        self.len += 1;
        self.sort_free();
        true
    }

    /// Release a handle. Returns `false` for stale or unknown handles.
    pub fn release(&mut self, entity: Entity) -> bool {
        if !self.contains(entity) {
            return false;
        }
        let slot = entity.index();
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(entity.index);
        self.len -= 1;
        self.sort_free();
        true
    }

    pub fn contains(&self, entity: Entity) -> bool {
        let slot = entity.index();
        slot < self.alive.len() && self.alive[slot] && self.generations[slot] == entity.generation()
    }

    /// The live handle occupying `index`, if any.
    pub fn live_at(&self, index: usize) -> Option<Entity> {
        if *self.alive.get(index)? {
            Some(Entity::new(index as u16, self.generations[index]))
        } else {
            None
        }
    }

    /// Live handles in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.alive.len()).filter_map(|index| self.live_at(index))
    }

    pub fn capacity(&self) -> usize {
        self.alive.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Pop from the back yields the lowest free index.
    fn sort_free(&mut self) {
        self.free.sort_unstable_by(|a, b| b.cmp(a));
    }
}
