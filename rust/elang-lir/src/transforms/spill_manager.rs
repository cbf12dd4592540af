//! Spill and reload plumbing shared by the allocator and the φ
//! expander.
//!
//! A virtual register's spill slot, once written, stays valid for the
//! register's whole lifetime: SSA values are defined once, so a stored
//! slot never goes stale. The "already spilled" preference in victim
//! selection relies on this.

use super::register_assignments::RegisterAssignments;
use super::stack_allocator::StackAllocator;
use crate::function::NewInstruction;
use crate::value::Value;

pub struct SpillManager<'a> {
    assignments: &'a mut RegisterAssignments,
    stack_allocator: &'a mut StackAllocator,
}

impl<'a> SpillManager<'a> {
    pub fn new(
        assignments: &'a mut RegisterAssignments,
        stack_allocator: &'a mut StackAllocator,
    ) -> Self {
        Self {
            assignments,
            stack_allocator,
        }
    }

    pub fn spill_slot_of(&self, vreg: Value) -> Option<Value> {
        self.assignments.spill_slot_of(vreg)
    }

    /// The register's slot, allocating one on first spill.
    pub fn ensure_spill_slot(&mut self, vreg: Value) -> Value {
        debug_assert!(vreg.is_virtual());
        if let Some(slot) = self.assignments.spill_slot_of(vreg) {
            return slot;
        }
        let slot = self.stack_allocator.allocate(Value::type_of(vreg));
        self.assignments.set_spill_slot(vreg, slot);
        slot
    }

    /// `physical <- slot`.
    pub fn new_reload(&self, physical: Value, vreg: Value) -> NewInstruction {
        debug_assert!(physical.is_physical());
        debug_assert!(vreg.is_virtual());
        let slot = self
            .assignments
            .spill_slot_of(vreg)
            .unwrap_or_else(|| unreachable!("reload without spill slot"));
        NewInstruction::copy(physical, slot)
    }

    /// `slot <- physical`, allocating the slot if needed.
    pub fn new_spill(&mut self, vreg: Value, physical: Value) -> NewInstruction {
        debug_assert!(physical.is_physical());
        let slot = self.ensure_spill_slot(vreg);
        NewInstruction::copy(slot, physical)
    }
}
