//! Generational slot registry with stable keys.
//!
//! Managers keep their controllers here. A key handed out by
//! [`Registry::insert`] stays valid until that entry is removed, no matter
//! how many other entries are inserted or removed in the meantime, and a
//! stale key never resolves to a newer entry that reused its slot.

use std::fmt;

/// Stable position of an entry in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey {
    index: u32,
    generation: u32,
}

impl EntryKey {
    /// Slot index of this key.
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this key was issued.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Free { next_free: Option<u32>, generation: u32 },
}

/// Slot map keyed by [`EntryKey`].
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty registry with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Registry {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `value`, returning its key.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots would be needed.
    pub fn insert(&mut self, value: T) -> EntryKey {
        let key = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let (next_free, generation) = match slot {
                    Slot::Free {
                        next_free,
                        generation,
                    } => (*next_free, *generation),
                    Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
                };
                self.free_head = next_free;
                *slot = Slot::Occupied { value, generation };
                EntryKey { index, generation }
            }
            None => {
                let index = match u32::try_from(self.slots.len()) {
                    Ok(index) => index,
                    Err(_) => panic!("registry cannot hold more than u32::MAX entries"),
                };
                self.slots.push(Slot::Occupied {
                    value,
                    generation: 0,
                });
                EntryKey {
                    index,
                    generation: 0,
                }
            }
        };

        self.len += 1;
        key
    }

    /// Whether `key` refers to a live entry.
    #[inline]
    pub fn contains_key(&self, key: EntryKey) -> bool {
        self.get(key).is_some()
    }

    /// The entry for `key`, if it is still live.
    pub fn get(&self, key: EntryKey) -> Option<&T> {
        match self.slots.get(key.index as usize)? {
            Slot::Occupied { value, generation } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Remove and return the entry for `key`, if it is still live.
    ///
    /// Other keys are unaffected.
    pub fn remove(&mut self, key: EntryKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {}
            _ => return None,
        }

        let freed = Slot::Free {
            next_free: self.free_head,
            generation: key.generation.wrapping_add(1),
        };
        let Slot::Occupied { value, .. } = std::mem::replace(slot, freed) else {
            return None;
        };
        self.free_head = Some(key.index);
        self.len -= 1;
        Some(value)
    }

    /// Iterate over live entries with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (EntryKey, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { value, generation } => Some((
                    EntryKey {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Slot::Free { .. } => None,
            })
    }

}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}
