//! Generation-checked handle arena
//!
//! Native code only ever sees a [`Handle`]: a pointer-sized integer packing
//! a slot index (low half) and the slot's generation (high half). Freeing a
//! slot bumps its generation, so a handle kept past unregistration no longer
//! resolves even after the slot is reused.

use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

const HALF: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << HALF) - 1;
const MAX_GENERATION: usize = INDEX_MASK;

/// Opaque callback handle as passed through native code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    fn new(index: usize, generation: usize) -> Self {
        Handle((generation << HALF) | index)
    }

    /// Rebuild a handle from the integer native code handed back
    pub fn from_raw(raw: usize) -> Self {
        Handle(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }

    /// Pointer form, for embedding as a `void *` user-data argument
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn index(self) -> usize {
        self.0 & INDEX_MASK
    }

    pub fn generation(self) -> usize {
        self.0 >> HALF
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

fn next_generation(generation: usize) -> usize {
    if generation >= MAX_GENERATION {
        1
    } else {
        generation + 1
    }
}

struct Slot<T> {
    generation: usize,
    value: Option<Arc<T>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

/// Slab of values addressed by [`Handle`]
pub struct HandleArena<T> {
    inner: RwLock<Slots<T>>,
}

impl<T> HandleArena<T> {
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Store `value`, returning `None` when every index is taken
    pub fn insert(&self, value: T) -> Option<Handle> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let value = Arc::new(value);

        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index];
            slot.value = Some(value);
            return Some(Handle::new(index, slot.generation));
        }

        let index = inner.slots.len();
        if index > INDEX_MASK {
            return None;
        }
        inner.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        Some(Handle::new(index, 1))
    }

    /// Resolve a handle; stale and foreign handles give `None`
    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let slot = inner.slots.get(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.clone()
    }

    /// Release a handle, returning its value the first time only
    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let index = handle.index();
        let slot = inner.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = next_generation(slot.generation);
        inner.free.push(index);
        Some(value)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let arena = HandleArena::new();
        let a = arena.insert("a").unwrap();
        let b = arena.insert("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(*arena.get(a).unwrap(), "a");
        assert_eq!(*arena.get(b).unwrap(), "b");
        assert_eq!(arena.len(), 2);

        assert_eq!(*arena.remove(a).unwrap(), "a");
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_reused_slot_rejects_old_handle() {
        let arena = HandleArena::new();
        let old = arena.insert(1).unwrap();
        arena.remove(old).unwrap();

        let new = arena.insert(2).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(arena.get(old).is_none());
        assert_eq!(*arena.get(new).unwrap(), 2);
    }

    #[test]
    fn test_handles_are_never_null() {
        let arena = HandleArena::new();
        let h = arena.insert(()).unwrap();
        assert_ne!(h.raw(), 0);
        assert!(!h.as_ptr().is_null());
        assert!(arena.get(Handle::from_raw(0)).is_none());
    }

    #[test]
    fn test_unknown_index() {
        let arena: HandleArena<u8> = HandleArena::new();
        assert!(arena.get(Handle::new(42, 1)).is_none());
        assert!(arena.remove(Handle::new(42, 1)).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_generation_wraps_to_one() {
        assert_eq!(next_generation(1), 2);
        assert_eq!(next_generation(MAX_GENERATION), 1);
    }
}
