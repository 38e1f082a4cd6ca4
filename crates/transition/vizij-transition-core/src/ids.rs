//! Identifiers and simple allocators for scheduler runs and diff revisions.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub u32);

/// Monotonic allocator for run handles and item revisions.
/// Handle ids are opaque externally; revisions only ever grow.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_handle: u32,
    next_revision: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_handle(&mut self) -> HandleId {
        let id = HandleId(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        id
    }

    /// Revisions start at 1 so that 0 can mean "never delivered".
    #[inline]
    pub fn next_revision(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_handle(), HandleId(0));
        assert_eq!(alloc.alloc_handle(), HandleId(1));
        assert_eq!(alloc.next_revision(), 1);
        assert_eq!(alloc.next_revision(), 2);
        alloc.reset();
        assert_eq!(alloc.alloc_handle(), HandleId(0));
    }
}
