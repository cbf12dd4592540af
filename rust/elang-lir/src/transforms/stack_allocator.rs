//! Spill-slot allocation.
//!
//! A byte-granular occupancy map. Allocation finds the lowest free run
//! of the requested size whose offset is size-aligned, expanding the
//! map when nothing fits; freeing returns the run for re-use within
//! the same function.

use crate::value::Value;

fn round_up(value: i32, alignment: i32) -> i32 {
    (value + alignment - 1) / alignment * alignment
}

pub struct StackAllocator {
    alignment: i32,
    uses: Vec<bool>,
}

impl StackAllocator {
    pub fn new(alignment: i32) -> Self {
        debug_assert!(alignment == 4 || alignment == 8 || alignment == 16);
        Self {
            alignment,
            uses: Vec::with_capacity(alignment as usize * 32),
        }
    }

    pub fn allocate_bytes(&mut self, size: i32) -> i32 {
        debug_assert!(size > 0);
        let size = size as usize;
        let mut offset = 0usize;
        while offset + size <= self.uses.len() {
            if offset % size != 0 {
                offset += 1;
                continue;
            }
            if self.uses[offset..offset + size].iter().any(|&used| used) {
                offset += 1;
                continue;
            }
            self.uses[offset..offset + size].fill(true);
            return offset as i32;
        }
        // No free run; expand the map.
        let offset = self.uses.len() as i32;
        let offset = round_up(offset, size as i32);
        let new_len = offset + round_up(size as i32, self.alignment);
        self.uses.resize(new_len as usize, false);
        self.uses[offset as usize..offset as usize + size].fill(true);
        offset
    }

    pub fn allocate(&mut self, type_tag: Value) -> Value {
        let offset = self.allocate_bytes(type_tag.size.bytes());
        Value::stack_slot(type_tag, offset)
    }

    /// Re-occupy a specific slot; callable after [`reset`](Self::reset).
    pub fn allocate_at(&mut self, slot: Value) {
        debug_assert!(slot.is_stack_slot());
        let offset = slot.data as usize;
        let size = slot.size.bytes() as usize;
        if offset + size > self.uses.len() {
            self.uses.resize(offset + size, false);
        }
        debug_assert!(!self.uses[offset..offset + size].iter().any(|&used| used));
        self.uses[offset..offset + size].fill(true);
    }

    pub fn free(&mut self, slot: Value) {
        debug_assert!(slot.is_stack_slot());
        let offset = slot.data as usize;
        let size = slot.size.bytes() as usize;
        self.uses[offset..offset + size].fill(false);
    }

    pub fn required_size(&self) -> i32 {
        self.uses.len() as i32
    }

    pub fn reset(&mut self) {
        self.uses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn reuses_freed_runs() {
        let mut allocator = StackAllocator::new(8);
        let a = allocator.allocate(Value::int64_type());
        let b = allocator.allocate(Value::int64_type());
        assert_eq!(a.data, 0);
        assert_eq!(b.data, 8);
        allocator.free(a);
        let c = allocator.allocate(Value::int32_type());
        assert_eq!(c.data, 0);
    }

    #[test]
    fn offsets_are_size_aligned() {
        let mut allocator = StackAllocator::new(8);
        let _ = allocator.allocate(Value::int32_type());
        let wide = allocator.allocate(Value::int64_type());
        assert_eq!(wide.data % 8, 0);
    }

    #[quickcheck]
    fn allocations_never_overlap(sizes: Vec<u8>) -> bool {
        let mut allocator = StackAllocator::new(8);
        let mut taken: Vec<(i32, i32)> = Vec::new();
        for raw in sizes.into_iter().take(32) {
            let size = match raw % 4 {
                0 => 1,
                1 => 2,
                2 => 4,
                _ => 8,
            };
            let offset = allocator.allocate_bytes(size);
            if offset % size != 0 {
                return false;
            }
            for &(start, len) in &taken {
                if offset < start + len && start < offset + size {
                    return false;
                }
            }
            taken.push((offset, size));
        }
        true
    }
}
